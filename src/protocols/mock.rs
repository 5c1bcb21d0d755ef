//! In-memory transport for engine tests
//!
//! `MockRemote` is a shared remote filesystem. Every `MockClient` handed out
//! by a `MockConnector` talks to the same remote, so tests can inspect what
//! arrived, count logons and closes, and inject failures.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::config::Protocol;
use crate::error::TransferError;
use crate::protocols::{download_via_tmp, open_local, Connector, Endpoint, FileTransferClient};
use std::io::{Read, Write};

#[derive(Debug, Default)]
pub(crate) struct RemoteState {
    /// Keyed by `dir/name`, or bare `name` for the home directory
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    /// `(site, user)` of every successful logon
    pub logons: Vec<(String, String)>,
    pub closes: usize,
    /// Logon attempts beyond this many are refused
    pub logon_limit: Option<usize>,
    logon_attempts: usize,
    /// Remote names whose upload always fails
    pub failing_uploads: HashSet<String>,
    /// The next this-many uploads fail, whatever the name
    pub flaky_uploads: usize,
    /// Remote names whose download always fails
    pub failing_downloads: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockRemote(Rc<RefCell<RemoteState>>);

impl MockRemote {
    pub fn new() -> Self {
        let remote = MockRemote::default();
        remote.add_dir(".");
        remote
    }

    pub fn add_dir(&self, dir: &str) {
        self.0.borrow_mut().dirs.insert(dir.to_string());
    }

    pub fn put(&self, dir: &str, name: &str, data: &[u8]) {
        self.add_dir(dir);
        self.0.borrow_mut().files.insert(join(dir, name), data.to_vec());
    }

    pub fn file(&self, dir: &str, name: &str) -> Option<Vec<u8>> {
        self.0.borrow().files.get(&join(dir, name)).cloned()
    }

    /// Names in `dir`, sorted
    pub fn names_in(&self, dir: &str) -> Vec<String> {
        let state = self.0.borrow();
        state
            .files
            .keys()
            .filter_map(|key| {
                let (d, n) = key.rsplit_once('/').unwrap_or((".", key));
                (d == normalize(dir)).then(|| n.to_string())
            })
            .collect()
    }

    pub fn logons(&self) -> Vec<(String, String)> {
        self.0.borrow().logons.clone()
    }

    pub fn closes(&self) -> usize {
        self.0.borrow().closes
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut RemoteState) -> T) -> T {
        f(&mut self.0.borrow_mut())
    }
}

fn normalize(dir: &str) -> &str {
    match dir.trim_end_matches('/') {
        "" => ".",
        trimmed => trimmed,
    }
}

fn join(dir: &str, name: &str) -> String {
    match normalize(dir) {
        "." => name.to_string(),
        dir => format!("{}/{}", dir, name),
    }
}

pub(crate) struct MockClient {
    remote: MockRemote,
    cwd: String,
    connected: bool,
}

impl MockClient {
    fn check(&self) -> Result<(), TransferError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransferError::NotConnected)
        }
    }

    /// Remote path relative to the current directory
    fn resolve(&self, path: &str) -> (String, String) {
        match path.rsplit_once('/') {
            Some((dir, name)) => (normalize(dir).to_string(), name.to_string()),
            None => (self.cwd.clone(), path.to_string()),
        }
    }
}

impl FileTransferClient for MockClient {
    fn logon(&mut self, endpoint: &Endpoint) -> Result<(), TransferError> {
        let mut state = self.remote.0.borrow_mut();
        state.logon_attempts += 1;
        if state.logon_limit.is_some_and(|limit| state.logon_attempts > limit) {
            return Err(TransferError::Login {
                user: endpoint.user.clone(),
                site: endpoint.site.clone(),
                reason: "connection refused".to_string(),
            });
        }
        state.logons.push((endpoint.site.clone(), endpoint.user.clone()));
        self.connected = true;
        self.cwd = ".".to_string();
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> Result<(), TransferError> {
        self.check()?;
        let dir = normalize(path).to_string();
        if !self.remote.0.borrow().dirs.contains(&dir) {
            return Err(TransferError::Remote(format!("Failed to move to {} directory", path)));
        }
        self.cwd = dir;
        Ok(())
    }

    fn current_directory(&mut self) -> Result<String, TransferError> {
        self.check()?;
        Ok(self.cwd.clone())
    }

    fn list_entries(&mut self, path: Option<&str>) -> Result<Vec<String>, TransferError> {
        self.check()?;
        let dir = path.map(|p| normalize(p).to_string()).unwrap_or_else(|| self.cwd.clone());
        Ok(self.remote.names_in(&dir))
    }

    fn download(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        self.check()?;
        let (dir, name) = self.resolve(remote);
        let data = {
            let state = self.remote.0.borrow();
            if state.failing_downloads.contains(&name) {
                None
            } else {
                state.files.get(&join(&dir, &name)).cloned()
            }
        };
        let data = data.ok_or_else(|| TransferError::Remote(format!("FTP get of {} failed", remote)))?;
        download_via_tmp(local, |file| {
            file.write_all(&data).map_err(|source| TransferError::Local {
                path: local.to_path_buf(),
                source,
            })?;
            Ok(data.len() as u64)
        })
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        self.check()?;
        let mut data = Vec::new();
        open_local(local)?
            .read_to_end(&mut data)
            .map_err(|source| TransferError::Local {
                path: local.to_path_buf(),
                source,
            })?;
        let (dir, name) = self.resolve(remote);

        let mut state = self.remote.0.borrow_mut();
        if state.flaky_uploads > 0 {
            state.flaky_uploads -= 1;
            return Err(TransferError::Remote(format!("FTP put of {} failed", local.display())));
        }
        if state.failing_uploads.contains(&name) || !state.dirs.contains(&dir) {
            return Err(TransferError::Remote(format!("FTP put of {} failed", local.display())));
        }
        let len = data.len() as u64;
        state.files.insert(join(&dir, &name), data);
        Ok(len)
    }

    fn close(&mut self) {
        if self.connected {
            self.remote.0.borrow_mut().closes += 1;
        }
        self.connected = false;
    }
}

/// Connector whose clients all share one `MockRemote`
pub(crate) struct MockConnector {
    pub remote: MockRemote,
}

impl MockConnector {
    pub fn new(remote: &MockRemote) -> Self {
        MockConnector { remote: remote.clone() }
    }
}

impl Connector for MockConnector {
    type Client = MockClient;

    fn client_for(&self, _protocol: Protocol) -> MockClient {
        MockClient {
            remote: self.remote.clone(),
            cwd: ".".to_string(),
            connected: false,
        }
    }
}

/// Writes `data` to `dir/name` on the local side
pub(crate) fn write_local(dir: &Path, name: &str, data: &[u8]) {
    fs::write(dir.join(name), data).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn endpoint() -> Endpoint {
        Endpoint {
            protocol: Protocol::Sftp,
            site: "site".to_string(),
            user: "alma".to_string(),
            password: None,
            private_key: None,
            port: None,
        }
    }

    #[test]
    fn test_mock_roundtrip_and_counters() {
        let remote = MockRemote::new();
        remote.put("outgoing", "a.xml", b"<a/>");
        let connector = MockConnector::new(&remote);
        let mut client = connector.client_for(Protocol::Sftp);
        client.logon(&endpoint()).unwrap();

        client.change_directory("outgoing").unwrap();
        assert_eq!(client.list_entries(None).unwrap(), vec!["a.xml"]);

        let dir = tempdir().unwrap();
        client.download("a.xml", &dir.path().join("a.xml")).unwrap();
        assert_eq!(fs::read(dir.path().join("a.xml")).unwrap(), b"<a/>");

        client.upload(&dir.path().join("a.xml"), "./b.xml").unwrap();
        assert_eq!(remote.file(".", "b.xml").unwrap(), b"<a/>");

        client.close();
        client.close();
        assert_eq!(remote.logons().len(), 1);
        assert_eq!(remote.closes(), 1);
    }
}
