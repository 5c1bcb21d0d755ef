//! Plain FTP client implementation
//!
//! This module provides the `FtpClient` which implements the
//! `FileTransferClient` trait for standard (unencrypted) FTP connections.

use std::io;
use std::path::Path;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use crate::error::TransferError;
use crate::protocols::{
    connect_error, download_via_tmp, open_local, remote_tmp_path, resolve, Endpoint, FileTransferClient, Timeouts,
};
use secrecy::ExposeSecret;

/// FTP client for plain (unencrypted) FTP connections
pub struct FtpClient {
    stream: Option<FtpStream>,
    timeouts: Timeouts,
}

impl FtpClient {
    pub fn new(timeouts: Timeouts) -> Self {
        FtpClient {
            stream: None,
            timeouts,
        }
    }

    fn stream(&mut self) -> Result<&mut FtpStream, TransferError> {
        self.stream.as_mut().ok_or(TransferError::NotConnected)
    }
}

fn remote_error(context: &str, e: FtpError) -> TransferError {
    TransferError::Remote(format!("{}. Error was: {}", context, e.to_string().replace('\n', " ")))
}

impl FileTransferClient for FtpClient {
    fn logon(&mut self, endpoint: &Endpoint) -> Result<(), TransferError> {
        self.close();
        let port = endpoint.port();
        let addrs = resolve(&endpoint.site, port)?;

        // Try each address until one succeeds
        let mut last_error = None;
        let mut connected = None;
        for addr in addrs {
            match FtpStream::connect_timeout(addr, self.timeouts.connect) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let mut stream = match connected {
            Some(stream) => stream,
            None => {
                let reason = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "No addresses available".to_string());
                return Err(connect_error(&endpoint.site, port, reason));
            }
        };

        let socket = stream.get_ref();
        socket
            .set_read_timeout(Some(self.timeouts.read))
            .and_then(|_| socket.set_write_timeout(Some(self.timeouts.read)))
            .map_err(|e| connect_error(&endpoint.site, port, e))?;

        let password = endpoint
            .password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
            .unwrap_or("");
        stream.login(endpoint.user.as_str(), password).map_err(|e| TransferError::Login {
            user: endpoint.user.clone(),
            site: endpoint.site.clone(),
            reason: e.to_string().replace('\n', " "),
        })?;

        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| remote_error("Failed to set binary mode", e))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> Result<(), TransferError> {
        self.stream()?
            .cwd(path)
            .map_err(|e| remote_error(&format!("Failed to move to {} directory", path), e))
    }

    fn current_directory(&mut self) -> Result<String, TransferError> {
        self.stream()?
            .pwd()
            .map_err(|e| remote_error("Failed to get current directory", e))
    }

    fn list_entries(&mut self, path: Option<&str>) -> Result<Vec<String>, TransferError> {
        let names = self
            .stream()?
            .nlst(path)
            .map_err(|e| remote_error("Failed to list directory", e))?;
        // some servers answer NLST with paths
        Ok(names
            .into_iter()
            .map(|n| n.rsplit('/').next().unwrap_or(&n).to_string())
            .filter(|n| !n.is_empty() && n != "." && n != "..")
            .collect())
    }

    fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let stream = self.stream()?;
        download_via_tmp(local, |file| {
            stream
                .retr(remote, |reader| io::copy(reader, &mut *file).map_err(FtpError::ConnectionError))
                .map_err(|e| remote_error(&format!("FTP get of {} failed", remote), e))
        })
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let mut file = open_local(local)?;
        let tmp = remote_tmp_path(remote);
        let stream = self.stream()?;

        let bytes = match stream.put_file(tmp.as_str(), &mut file) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = stream.rm(tmp.as_str());
                return Err(remote_error(&format!("FTP put of {} failed", local.display()), e));
            }
        };

        // Rename fails on some servers when the target exists
        if stream.rename(tmp.as_str(), remote).is_err() {
            let _ = stream.rm(remote);
            if let Err(e) = stream.rename(tmp.as_str(), remote) {
                let _ = stream.rm(tmp.as_str());
                return Err(remote_error(&format!("Failed to rename {} to {}", tmp, remote), e));
            }
        }
        Ok(bytes)
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.quit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ftp_client_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FtpClient>();
    }

    #[test]
    fn test_operations_before_logon_fail_cleanly() {
        let mut client = FtpClient::new(Timeouts::default());
        assert!(matches!(client.change_directory("/"), Err(TransferError::NotConnected)));
        assert!(matches!(client.list_entries(None), Err(TransferError::NotConnected)));
        client.close();
        client.close();
    }

    #[test]
    fn test_transfers_before_logon_fail_cleanly() {
        let mut client = FtpClient::new(Timeouts::default());
        let err = client.upload(Path::new("Cargo.toml"), "outgoing/Cargo.toml").unwrap_err();
        assert!(matches!(err, TransferError::NotConnected));
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.xml");
        assert!(matches!(client.download("a.xml", &local), Err(TransferError::NotConnected)));
        assert!(!local.exists());
    }
}
