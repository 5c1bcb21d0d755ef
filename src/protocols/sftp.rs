//! SFTP (SSH File Transfer Protocol) client implementation
//!
//! This module provides the `SftpClient` which implements the
//! `FileTransferClient` trait for SFTP connections using the ssh2 crate.

use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use ssh2::{Session, Sftp};
use secrecy::ExposeSecret;

use crate::error::TransferError;
use crate::protocols::{
    connect_error, download_via_tmp, open_local, remote_tmp_path, resolve, Endpoint, FileTransferClient, Timeouts,
};

/// Live SSH session and the SFTP channel opened on it
struct Connection {
    _session: Session,
    sftp: Sftp,
}

/// SFTP client for SSH File Transfer Protocol connections
pub struct SftpClient {
    connection: Option<Connection>,
    current_dir: String,
    timeouts: Timeouts,
}

impl SftpClient {
    pub fn new(timeouts: Timeouts) -> Self {
        SftpClient {
            connection: None,
            current_dir: String::from("."),
            timeouts,
        }
    }

    fn sftp(&self) -> Result<&Sftp, TransferError> {
        self.connection
            .as_ref()
            .map(|c| &c.sftp)
            .ok_or(TransferError::NotConnected)
    }

    /// Helper function to build full path from current directory and filename
    fn full_path(&self, name: &str) -> PathBuf {
        if name.starts_with('/') {
            PathBuf::from(name)
        } else {
            Path::new(&self.current_dir).join(name)
        }
    }

    fn connect(&self, endpoint: &Endpoint) -> Result<Session, TransferError> {
        let port = endpoint.port();
        let addrs = resolve(&endpoint.site, port)?;

        // Try each address until one succeeds
        let mut last_error = None;
        for addr in addrs {
            let stream = match TcpStream::connect_timeout(&addr, self.timeouts.connect) {
                Ok(s) => s,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            stream
                .set_read_timeout(Some(self.timeouts.read))
                .and_then(|_| stream.set_write_timeout(Some(self.timeouts.read)))
                .map_err(|e| connect_error(&endpoint.site, port, e))?;

            let mut session = Session::new()
                .map_err(|e| connect_error(&endpoint.site, port, format!("Failed to create SSH session: {}", e)))?;
            session.set_tcp_stream(stream);
            session
                .handshake()
                .map_err(|e| connect_error(&endpoint.site, port, format!("SSH handshake failed: {}", e)))?;
            session.set_timeout(self.timeouts.read.as_millis() as u32);
            return Ok(session);
        }

        Err(connect_error(
            &endpoint.site,
            port,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "No addresses available".to_string()),
        ))
    }
}

fn sftp_error(context: String, e: ssh2::Error) -> TransferError {
    TransferError::Remote(format!("{}. Error was: {}", context, e))
}

impl FileTransferClient for SftpClient {
    fn logon(&mut self, endpoint: &Endpoint) -> Result<(), TransferError> {
        self.close();
        let session = self.connect(endpoint)?;

        // A password wins over a key when both are configured
        let auth_result = match (&endpoint.password, &endpoint.private_key) {
            (Some(password), _) => session.userauth_password(&endpoint.user, password.expose_secret()),
            (None, Some(key)) => session.userauth_pubkey_file(&endpoint.user, None, key, None),
            (None, None) => {
                return Err(TransferError::Login {
                    user: endpoint.user.clone(),
                    site: endpoint.site.clone(),
                    reason: "A password or private key must be specified".to_string(),
                })
            }
        };
        auth_result.map_err(|e| TransferError::Login {
            user: endpoint.user.clone(),
            site: endpoint.site.clone(),
            reason: e.to_string(),
        })?;

        let sftp = session
            .sftp()
            .map_err(|e| connect_error(&endpoint.site, endpoint.port(), format!("Failed to create SFTP channel: {}", e)))?;
        let home = sftp
            .realpath(Path::new("."))
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| String::from("/"));

        self.current_dir = home;
        self.connection = Some(Connection {
            _session: session,
            sftp,
        });
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> Result<(), TransferError> {
        // SFTP has no server-side working directory; resolve and remember it
        let target = self.full_path(path);
        let sftp = self.sftp()?;
        let resolved = sftp
            .realpath(&target)
            .map_err(|e| sftp_error(format!("Failed to move to {} directory", path), e))?;
        let stat = sftp
            .stat(&resolved)
            .map_err(|e| sftp_error(format!("Failed to move to {} directory", path), e))?;
        if !stat.is_dir() {
            return Err(TransferError::Remote(format!(
                "Failed to move to {} directory. Error was: not a directory",
                path
            )));
        }
        self.current_dir = resolved.to_string_lossy().into_owned();
        Ok(())
    }

    fn current_directory(&mut self) -> Result<String, TransferError> {
        self.sftp()?;
        Ok(self.current_dir.clone())
    }

    fn list_entries(&mut self, path: Option<&str>) -> Result<Vec<String>, TransferError> {
        let dir = match path {
            Some(p) => self.full_path(p),
            None => PathBuf::from(&self.current_dir),
        };
        let entries = self
            .sftp()?
            .readdir(&dir)
            .map_err(|e| sftp_error(format!("Failed to list directory {}", dir.display()), e))?;

        // Filter only regular files (not directories, not . and ..)
        Ok(entries
            .into_iter()
            .filter(|(_, stat)| !stat.is_dir())
            .filter_map(|(path, _)| path.file_name().and_then(|n| n.to_str()).map(|s| s.to_string()))
            .filter(|name| name != "." && name != "..")
            .collect())
    }

    fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let full_path = self.full_path(remote);
        let mut remote_file = self
            .sftp()?
            .open(&full_path)
            .map_err(|e| sftp_error(format!("Failed to download {}", full_path.display()), e))?;

        download_via_tmp(local, |file| {
            io::copy(&mut remote_file, file).map_err(|e| {
                TransferError::Remote(format!(
                    "Failed to download {} to {}. Error was: {}",
                    full_path.display(),
                    local.display(),
                    e
                ))
            })
        })
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let mut file = open_local(local)?;
        let final_path = self.full_path(remote);
        let tmp_path = self.full_path(&remote_tmp_path(remote));
        let sftp = self.sftp()?;

        let written = sftp
            .create(&tmp_path)
            .map_err(|e| sftp_error(format!("Failed to send {} to {}", local.display(), final_path.display()), e))
            .and_then(|mut remote_file| {
                io::copy(&mut file, &mut remote_file).map_err(|e| {
                    TransferError::Remote(format!(
                        "Failed to send {} to {}. Error was: {}",
                        local.display(),
                        final_path.display(),
                        e
                    ))
                })
            });
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = sftp.unlink(&tmp_path);
                return Err(e);
            }
        };

        if sftp.rename(&tmp_path, &final_path, None).is_err() {
            let _ = sftp.unlink(&final_path);
            if let Err(e) = sftp.rename(&tmp_path, &final_path, None) {
                let _ = sftp.unlink(&tmp_path);
                return Err(sftp_error(
                    format!("Failed to rename {} to {}", tmp_path.display(), final_path.display()),
                    e,
                ));
            }
        }
        Ok(bytes)
    }

    fn close(&mut self) {
        // Session and SFTP channel are dropped here
        self.connection = None;
        self.current_dir = String::from(".");
    }
}
