//! SCP client implementation
//!
//! There is no persistent connection: every transfer runs the system `scp`
//! command once, in batch mode. Listing and changing directory are not
//! available over SCP.

use std::path::Path;
use std::process::Command;

use crate::error::TransferError;
use crate::protocols::{download_via_tmp, local_tmp_path, open_local, Endpoint, FileTransferClient, Timeouts};

const SCP_COMMAND: &str = "scp";

/// SCP client driving the external `scp` binary
pub struct ScpClient {
    endpoint: Option<Endpoint>,
    timeouts: Timeouts,
}

impl ScpClient {
    pub fn new(timeouts: Timeouts) -> Self {
        ScpClient {
            endpoint: None,
            timeouts,
        }
    }

    fn endpoint(&self) -> Result<&Endpoint, TransferError> {
        self.endpoint.as_ref().ok_or(TransferError::NotConnected)
    }

    /// `user@site:path`
    fn remote_target(endpoint: &Endpoint, path: &str) -> String {
        format!("{}@{}:{}", endpoint.user, endpoint.site, path)
    }

    /// Common arguments: quiet, batch mode, connect timeout, port and key
    fn base_args(&self, endpoint: &Endpoint) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-B".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeouts.connect.as_secs().max(1)),
        ];
        if let Some(port) = endpoint.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }
        if let Some(key) = &endpoint.private_key {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args
    }

    fn run(&self, args: Vec<String>) -> Result<(), TransferError> {
        let command = format!("{} {}", SCP_COMMAND, args.join(" "));
        let output = Command::new(SCP_COMMAND)
            .args(&args)
            .output()
            .map_err(|e| TransferError::Command {
                command: command.clone(),
                stderr: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(TransferError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl FileTransferClient for ScpClient {
    fn logon(&mut self, endpoint: &Endpoint) -> Result<(), TransferError> {
        // Each transfer authenticates on its own
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn change_directory(&mut self, _path: &str) -> Result<(), TransferError> {
        Err(TransferError::Unsupported("Changing directory"))
    }

    fn current_directory(&mut self) -> Result<String, TransferError> {
        Ok(String::from("."))
    }

    fn list_entries(&mut self, _path: Option<&str>) -> Result<Vec<String>, TransferError> {
        Err(TransferError::Unsupported("Listing a directory"))
    }

    fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let endpoint = self.endpoint()?;
        let tmp = local_tmp_path(local);
        let mut args = self.base_args(endpoint);
        args.push(Self::remote_target(endpoint, remote));
        args.push(tmp.to_string_lossy().into_owned());

        // scp writes the temporary itself; the handle only reserves the name
        download_via_tmp(local, |_| {
            self.run(args)?;
            tmp.metadata()
                .map(|m| m.len())
                .map_err(|source| TransferError::Local {
                    path: tmp.clone(),
                    source,
                })
        })
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let size = open_local(local)?
            .metadata()
            .map(|m| m.len())
            .map_err(|source| TransferError::Local {
                path: local.to_path_buf(),
                source,
            })?;
        let endpoint = self.endpoint()?;
        let mut args = self.base_args(endpoint);
        args.push(local.to_string_lossy().into_owned());
        args.push(Self::remote_target(endpoint, remote));
        self.run(args)?;
        Ok(size)
    }

    fn close(&mut self) {
        self.endpoint = None;
    }
}
