//! A live connection to one (protocol, site, user) account.
//!
//! `Session` wraps a transfer client with an explicit state and the last
//! error text, and remembers the directory it last moved into so that a
//! reconnect can put the caller back where it was.

use crate::error::TransferError;
use crate::logging::log;
use crate::protocols::{Endpoint, FileTransferClient};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// The last operation failed; the connection may or may not be usable
    Error,
}

pub struct Session<C: FileTransferClient> {
    client: C,
    endpoint: Endpoint,
    state: SessionState,
    last_error: Option<String>,
    directory: Option<String>,
}

impl<C: FileTransferClient> Session<C> {
    /// Wraps a client that has not logged on yet
    pub fn new(client: C, endpoint: Endpoint) -> Self {
        Session {
            client,
            endpoint,
            state: SessionState::Disconnected,
            last_error: None,
            directory: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether this session can serve a profile using `endpoint`
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        self.endpoint.same_account(endpoint)
    }

    pub fn logon(&mut self) -> Result<(), TransferError> {
        let _ = log(&format!(
            "Logging on to {}:{} as {} over {}",
            self.endpoint.site,
            self.endpoint.port(),
            self.endpoint.user,
            self.endpoint.protocol
        ));
        let result = self.client.logon(&self.endpoint);
        self.track(result)
    }

    /// Closes, logs on again and returns to the remembered directory
    pub fn reconnect(&mut self) -> Result<(), TransferError> {
        self.client.close();
        self.state = SessionState::Disconnected;
        self.logon()?;
        if let Some(dir) = self.directory.clone() {
            let result = self.client.change_directory(&dir);
            self.track(result)?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.client.close();
        self.state = SessionState::Disconnected;
        self.directory = None;
    }

    pub fn change_directory(&mut self, path: &str) -> Result<(), TransferError> {
        let result = self.client.change_directory(path);
        if result.is_ok() {
            self.directory = Some(path.to_string());
        }
        self.track(result)
    }

    pub fn current_directory(&mut self) -> Result<String, TransferError> {
        let result = self.client.current_directory();
        self.track(result)
    }

    pub fn list_entries(&mut self, path: Option<&str>) -> Result<Vec<String>, TransferError> {
        let result = self.client.list_entries(path);
        self.track(result)
    }

    pub fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let result = self.client.download(remote, local);
        self.track(result)
    }

    pub fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let result = self.client.upload(local, remote);
        self.track(result)
    }

    /// Records the outcome of one client call in `state`/`last_error`
    fn track<T>(&mut self, result: Result<T, TransferError>) -> Result<T, TransferError> {
        match &result {
            Ok(_) => {
                self.state = SessionState::Connected;
                self.last_error = None;
            }
            Err(e) => {
                self.state = SessionState::Error;
                self.last_error = Some(e.to_string());
            }
        }
        result
    }
}

impl<C: FileTransferClient> Drop for Session<C> {
    fn drop(&mut self) {
        self.client.close();
    }
}
