//! Protocol implementations for file transfer clients
//!
//! Each transport implements the `FileTransferClient` trait. `Client` wraps
//! the three production clients in one concrete type, and a `Connector`
//! hands out fresh clients so the engine never names a transport directly.

pub mod ftp;
pub mod scp;
pub mod sftp;

#[cfg(test)]
pub(crate) mod mock;

pub use ftp::FtpClient;
pub use scp::ScpClient;
pub use sftp::SftpClient;

use crate::config::Protocol;
use crate::error::TransferError;
use secrecy::SecretString;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-call time limits for network operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect limit
    pub connect: Duration,
    /// Read/write limit once connected
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: Duration::from_secs(15),
            read: Duration::from_secs(120),
        }
    }
}

/// Where and as whom to log on
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub site: String,
    pub user: String,
    pub password: Option<SecretString>,
    pub private_key: Option<PathBuf>,
    /// Explicit port; the protocol default applies when absent
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// Same (protocol, site, user) triple, i.e. a session can be shared
    pub fn same_account(&self, other: &Endpoint) -> bool {
        self.protocol == other.protocol && self.site == other.site && self.user == other.user
    }
}

/// Uniform capability set over SFTP, FTP and SCP
///
/// Every method is a single attempt; retrying is up to the caller.
pub trait FileTransferClient {
    /// Connect and authenticate
    fn logon(&mut self, endpoint: &Endpoint) -> Result<(), TransferError>;

    fn change_directory(&mut self, path: &str) -> Result<(), TransferError>;

    fn current_directory(&mut self) -> Result<String, TransferError>;

    /// Plain file names in `path` (or the current directory)
    fn list_entries(&mut self, path: Option<&str>) -> Result<Vec<String>, TransferError>;

    /// Fetch `remote` into `local`; nothing is left at `local` on failure
    fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError>;

    /// Send `local` to `remote`; nothing is left under `remote` on failure
    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError>;

    /// Disconnect. Safe to call on a closed or never-opened client.
    fn close(&mut self);
}

/// Concrete client for any of the three transports
pub enum Client {
    Ftp(FtpClient),
    Sftp(SftpClient),
    Scp(ScpClient),
}

impl Client {
    pub fn new(protocol: Protocol, timeouts: Timeouts) -> Self {
        match protocol {
            Protocol::Ftp => Client::Ftp(FtpClient::new(timeouts)),
            Protocol::Sftp => Client::Sftp(SftpClient::new(timeouts)),
            Protocol::Scp => Client::Scp(ScpClient::new(timeouts)),
        }
    }
}

impl FileTransferClient for Client {
    fn logon(&mut self, endpoint: &Endpoint) -> Result<(), TransferError> {
        match self {
            Client::Ftp(client) => client.logon(endpoint),
            Client::Sftp(client) => client.logon(endpoint),
            Client::Scp(client) => client.logon(endpoint),
        }
    }

    fn change_directory(&mut self, path: &str) -> Result<(), TransferError> {
        match self {
            Client::Ftp(client) => client.change_directory(path),
            Client::Sftp(client) => client.change_directory(path),
            Client::Scp(client) => client.change_directory(path),
        }
    }

    fn current_directory(&mut self) -> Result<String, TransferError> {
        match self {
            Client::Ftp(client) => client.current_directory(),
            Client::Sftp(client) => client.current_directory(),
            Client::Scp(client) => client.current_directory(),
        }
    }

    fn list_entries(&mut self, path: Option<&str>) -> Result<Vec<String>, TransferError> {
        match self {
            Client::Ftp(client) => client.list_entries(path),
            Client::Sftp(client) => client.list_entries(path),
            Client::Scp(client) => client.list_entries(path),
        }
    }

    fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        match self {
            Client::Ftp(client) => client.download(remote, local),
            Client::Sftp(client) => client.download(remote, local),
            Client::Scp(client) => client.download(remote, local),
        }
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        match self {
            Client::Ftp(client) => client.upload(local, remote),
            Client::Sftp(client) => client.upload(local, remote),
            Client::Scp(client) => client.upload(local, remote),
        }
    }

    fn close(&mut self) {
        match self {
            Client::Ftp(client) => client.close(),
            Client::Sftp(client) => client.close(),
            Client::Scp(client) => client.close(),
        }
    }
}

/// Source of fresh, not yet logged on clients
pub trait Connector {
    type Client: FileTransferClient;

    fn client_for(&self, protocol: Protocol) -> Self::Client;
}

/// Connector for real network transports
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector {
    pub timeouts: Timeouts,
}

impl Connector for NetworkConnector {
    type Client = Client;

    fn client_for(&self, protocol: Protocol) -> Client {
        Client::new(protocol, self.timeouts)
    }
}

/// Resolve host to all possible addresses
pub(crate) fn resolve(site: &str, port: u16) -> Result<Vec<SocketAddr>, TransferError> {
    let addrs: Vec<SocketAddr> = (site, port)
        .to_socket_addrs()
        .map_err(|e| connect_error(site, port, e))?
        .collect();

    if addrs.is_empty() {
        return Err(connect_error(site, port, "No addresses found"));
    }
    Ok(addrs)
}

pub(crate) fn connect_error(site: &str, port: u16, reason: impl ToString) -> TransferError {
    TransferError::Connect {
        site: site.to_string(),
        port,
        reason: reason.to_string(),
    }
}

/// Hidden temporary sibling used while a file is in flight: `.name.tmp~`
pub(crate) fn tmp_name(name: &str) -> String {
    format!(".{}.tmp~", name)
}

/// `tmp_name` applied to the last component of a local path
pub(crate) fn local_tmp_path(local: &Path) -> PathBuf {
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    local.with_file_name(tmp_name(&name))
}

/// `tmp_name` applied to the last component of a remote path
pub(crate) fn remote_tmp_path(remote: &str) -> String {
    match remote.rsplit_once('/') {
        Some((dir, name)) => format!("{}/{}", dir, tmp_name(name)),
        None => tmp_name(remote),
    }
}

/// Runs `fetch` against a temporary file next to `local`, then renames it
///
/// The temporary is removed when anything fails, so a partial download is
/// never visible under its final name.
pub(crate) fn download_via_tmp<F>(local: &Path, fetch: F) -> Result<u64, TransferError>
where
    F: FnOnce(&mut fs::File) -> Result<u64, TransferError>,
{
    let tmp = local_tmp_path(local);
    let result = fs::File::create(&tmp)
        .map_err(|source| TransferError::Local {
            path: tmp.clone(),
            source,
        })
        .and_then(|mut file| fetch(&mut file))
        .and_then(|bytes| {
            fs::rename(&tmp, local)
                .map(|_| bytes)
                .map_err(|source| TransferError::Local {
                    path: local.to_path_buf(),
                    source,
                })
        });

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

pub(crate) fn open_local(local: &Path) -> Result<fs::File, TransferError> {
    fs::File::open(local).map_err(|source| TransferError::Local {
        path: local.to_path_buf(),
        source,
    })
}
