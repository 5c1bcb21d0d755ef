//! One reconnect and one retry around a failed transfer operation.

use crate::config::JobStatus;
use crate::error::TransferError;
use crate::logging::{log, Level};
use crate::protocols::FileTransferClient;
use crate::session::Session;
use thiserror::Error;

/// Why an operation gave up after its retry
#[derive(Debug, Error)]
pub enum RetryFailure {
    /// Logged on again but the operation failed a second time
    #[error("{0}")]
    Operation(TransferError),
    /// Could not log on again
    #[error("{0}")]
    Reconnect(TransferError),
}

impl RetryFailure {
    /// The session is gone and nothing more can be done for this profile
    pub fn abandons_profile(&self) -> bool {
        matches!(self, RetryFailure::Reconnect(_))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectPolicy {
    site_down: bool,
}

impl ReconnectPolicy {
    pub fn for_status(status: JobStatus) -> Self {
        ReconnectPolicy {
            site_down: status == JobStatus::SiteDown,
        }
    }

    /// Level for connection and transfer failures: WARN for a site known to be down
    pub fn severity(&self) -> Level {
        if self.site_down {
            Level::Warn
        } else {
            Level::Fail
        }
    }

    /// Runs `op`; on failure reconnects once and runs it once more
    pub fn run<C, T, F>(&self, session: &mut Session<C>, mut op: F) -> Result<T, RetryFailure>
    where
        C: FileTransferClient,
        F: FnMut(&mut Session<C>) -> Result<T, TransferError>,
    {
        let first = match op(session) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let _ = log(&format!("{}; reconnecting to {}", first, session.endpoint().site));
        session.reconnect().map_err(RetryFailure::Reconnect)?;
        op(session).map_err(RetryFailure::Operation)
    }
}
