//! Profile-by-profile driver.
//!
//! `ProfileEngine` walks the profiles of one configuration file, validates
//! each one, keeps at most one remote session open (reusing it while the
//! account stays the same) and runs the send, receive or archive flow. Every
//! outcome ends up in the returned [`RunReport`].

mod receive;
mod relocate;
mod send;

use crate::config::{load_config, Direction, GlobalSettings, JobStatus, Profile, RawProfile, GLOBAL_PROFILE};
use crate::error::{ConfigError, DirectoryError, LocalIoError, QueueError};
use crate::logging::{log, Level};
use crate::protocols::{Connector, NetworkConnector, Timeouts};
use crate::queue::QueueStore;
use crate::reconnect::{ReconnectPolicy, RetryFailure};
use crate::report::RunReport;
use crate::session::Session;
use crate::shutdown::{is_shutdown_requested, signal_name};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Suffix of the marker written for downstream jobs
pub const STATUS_FLAG_SUFFIX: &str = "SUBMITTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Execute,
    /// Validate profiles only; nothing is transferred or moved
    ValidateOnly,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Run only this profile
    pub profile: Option<String>,
    pub queue: QueueStore,
}

/// Result of one flow over one profile
#[derive(Debug, Default)]
struct FlowOutcome {
    /// Matching files that were tried, whatever became of them
    found: usize,
    /// Names (as recorded in the queue) of the files handled successfully, in order
    handled: Vec<String>,
    /// The session was lost and the rest of the profile skipped
    abandoned: bool,
}

pub struct ProfileEngine<C: Connector> {
    connector: C,
    options: RunOptions,
    session: Option<Session<C::Client>>,
    global: GlobalSettings,
    report: RunReport,
    shutdown_reported: bool,
}

/// Runs a configuration file over the real network transports
///
/// # Errors
/// Only the fatal configuration errors (missing, unreadable, malformed file)
pub fn run_config(conf: &Path, options: RunOptions, timeouts: Timeouts) -> Result<RunReport, ConfigError> {
    ProfileEngine::new(NetworkConnector { timeouts }, options).run(conf)
}

impl<C: Connector> ProfileEngine<C> {
    pub fn new(connector: C, options: RunOptions) -> Self {
        ProfileEngine {
            connector,
            options,
            session: None,
            global: GlobalSettings::default(),
            report: RunReport::new(),
            shutdown_reported: false,
        }
    }

    /// Loads `conf` and runs every selected profile
    ///
    /// # Errors
    /// Fatal configuration errors, reported before any profile runs
    pub fn run(mut self, conf: &Path) -> Result<RunReport, ConfigError> {
        let profiles = load_config(conf)?;
        let _ = log(&format!("Loaded {} profiles from {}", profiles.len(), conf.display()));
        self.run_profiles(conf, &profiles);

        if let Some(mut session) = self.session.take() {
            session.close();
        }
        Ok(self.report)
    }

    fn run_profiles(&mut self, conf: &Path, profiles: &[RawProfile]) {
        let mut requested_found = false;
        let mut processed = 0;
        let mut seen_names = HashSet::new();

        for (index, raw) in profiles.iter().enumerate() {
            if self.stop_requested(None) {
                break;
            }

            if raw.is_global() {
                match &raw.field_error {
                    Some(reason) => self.report.record(
                        Level::Fail,
                        ConfigError::BadField {
                            profile: GLOBAL_PROFILE.to_string(),
                            reason: reason.clone(),
                        }
                        .to_string(),
                        Some(GLOBAL_PROFILE),
                    ),
                    None => self.global.absorb(raw),
                }
                continue;
            }

            if let Some(wanted) = &self.options.profile {
                if raw.profile_name.as_deref() != Some(wanted.as_str()) {
                    continue;
                }
                requested_found = true;
            }

            if let Some(name) = &raw.profile_name {
                if !seen_names.insert(name.as_str()) {
                    let error = ConfigError::DuplicateName { profile: name.clone() };
                    self.report.record(Level::Fail, error.to_string(), Some(name.as_str()));
                    continue;
                }
            }

            if raw.status() == JobStatus::Disabled {
                let _ = log(&format!("Skipping disabled profile {}", raw.label(index)));
                continue;
            }

            let profile = match raw.validate(index, &self.global) {
                Ok(profile) => profile,
                Err(errors) => {
                    let label = raw.label(index);
                    for error in errors {
                        self.report.record(Level::Fail, error.to_string(), Some(&label));
                    }
                    continue;
                }
            };
            processed += 1;

            if self.options.mode == RunMode::ValidateOnly {
                self.report
                    .record(Level::Pass, format!("{} looks good", profile.name), Some(&profile.name));
                continue;
            }

            self.run_profile(&profile);
        }

        match &self.options.profile {
            _ if self.shutdown_reported => {}
            Some(wanted) if !requested_found => {
                self.report.record(
                    Level::Fail,
                    format!("Profile {} not found in {}", wanted, conf.display()),
                    None,
                );
            }
            _ if self.options.mode == RunMode::ValidateOnly => {
                if !self.report.has_failures() {
                    self.report
                        .record(Level::Pass, format!("{} is formatted properly", conf.display()), None);
                }
            }
            _ if processed == 0 => {
                self.report.record(
                    Level::Warn,
                    format!("No matching config profiles were found in {}", conf.display()),
                    None,
                );
            }
            _ => {}
        }
    }

    fn run_profile(&mut self, profile: &Profile) {
        let _ = log(&format!("Running profile {} ({:?})", profile.name, profile.direction));
        if let Err(e) = check_directories(profile) {
            self.record(Level::Fail, e.to_string(), profile);
            return;
        }

        let Some(queued) = self.queued_names(profile) else {
            return;
        };
        let policy = ReconnectPolicy::for_status(profile.status);

        let outcome = match profile.direction {
            Direction::Archive => self.archive_files(profile, &queued),
            Direction::Deliver => self.deliver_files(profile, &queued),
            Direction::Send | Direction::Receive => {
                let Some(mut session) = self.ensure_session(profile, &policy) else {
                    return;
                };
                let outcome = match profile.direction {
                    Direction::Receive => self.receive_files(profile, &mut session, &policy, &queued),
                    _ => self.send_files(profile, &mut session, &policy, &queued),
                };
                if outcome.abandoned {
                    self.record(
                        policy.severity(),
                        format!("Lost connection to {}, skipping the rest of {}", session.endpoint().site, profile.name),
                        profile,
                    );
                } else {
                    self.session = Some(session);
                }
                outcome
            }
        };

        self.record_queue(profile, &outcome.handled);
        self.summarize(profile, &outcome);
    }

    /// Hands out the open session when it serves the same account,
    /// otherwise closes it and logs on afresh
    fn ensure_session(&mut self, profile: &Profile, policy: &ReconnectPolicy) -> Option<Session<C::Client>> {
        let endpoint = profile.endpoint.as_ref()?;

        if let Some(mut session) = self.session.take() {
            if session.matches(endpoint) {
                let _ = log(&format!("Reusing session to {} as {}", endpoint.site, endpoint.user));
                return Some(session);
            }
            session.close();
        }

        let mut session = Session::new(self.connector.client_for(endpoint.protocol), endpoint.clone());
        match session.logon() {
            Ok(()) => Some(session),
            Err(e) => {
                self.record(policy.severity(), e.to_string(), profile);
                None
            }
        }
    }

    /// Names already in the queue when the profile only takes new files
    ///
    /// `None` means the queue could not be read and the profile is skipped.
    fn queued_names(&mut self, profile: &Profile) -> Option<HashSet<String>> {
        let queue = match (&profile.queue_file, profile.only_new) {
            (Some(queue), true) => queue,
            _ => return Some(HashSet::new()),
        };
        match self.options.queue.read(queue) {
            Ok(names) => Some(names.into_iter().collect()),
            Err(QueueError::Missing(_)) => Some(HashSet::new()),
            Err(e) => {
                self.record(Level::Fail, e.to_string(), profile);
                None
            }
        }
    }

    fn record_queue(&mut self, profile: &Profile, handled: &[String]) {
        let Some(queue) = &profile.queue_file else {
            return;
        };
        if handled.is_empty() {
            return;
        }
        if let Err(e) = self.options.queue.append(queue, handled) {
            self.record(Level::Fail, e.to_string(), profile);
        }
    }

    fn summarize(&mut self, profile: &Profile, outcome: &FlowOutcome) {
        let count = outcome.handled.len();
        if count == 0 {
            if !outcome.abandoned {
                let message = if outcome.found == 0 {
                    format!("No files found for {}", profile.name)
                } else {
                    format!("No files {} for {}", profile.direction.verb(), profile.name)
                };
                self.record(profile.no_files.level(), message, profile);
            }
            return;
        }

        self.record(
            Level::Pass,
            format!("{} files {} for {}", count, profile.direction.verb(), profile.name),
            profile,
        );
        if let Err(e) = self.write_status_flag(profile) {
            self.record(Level::Fail, e.to_string(), profile);
        }
    }

    /// Drops the empty `<name>_<flag>.SUBMITTED` marker, when configured
    fn write_status_flag(&self, profile: &Profile) -> Result<(), LocalIoError> {
        let (Some(flag), Some(dir)) = (&profile.status_flag, &self.global.status_file_directory) else {
            return Ok(());
        };
        let path = dir.join(status_flag_name(&profile.name, flag));
        fs::write(&path, b"").map_err(|source| LocalIoError::Flag { path, source })
    }

    /// Handles a transfer that failed even after the retry
    ///
    /// Returns true when the profile has to be abandoned.
    fn transfer_failed(&mut self, profile: &Profile, policy: &ReconnectPolicy, failure: RetryFailure) -> bool {
        let abandon = failure.abandons_profile();
        self.record(policy.severity(), failure.to_string(), profile);
        abandon
    }

    /// Reports (once) and returns true when a shutdown signal has arrived
    fn stop_requested(&mut self, profile: Option<&Profile>) -> bool {
        if !is_shutdown_requested() {
            return false;
        }
        if !self.shutdown_reported {
            self.shutdown_reported = true;
            let signal = signal_name().unwrap_or("shutdown request");
            self.report.record(
                Level::Warn,
                format!("Received {}, skipping remaining files and profiles", signal),
                profile.map(|p| p.name.as_str()),
            );
        }
        true
    }

    /// Logs a skipped file at the profile's unmatched-file severity
    fn unmatched(&mut self, profile: &Profile, name: &str, location: &str) {
        let level = profile.unmatched_files.level();
        let message = format!("{} in {} does not match {}", name, location, profile.name);
        if level == Level::Pass {
            let _ = log(&message);
        } else {
            self.record(level, message, profile);
        }
    }

    fn record(&mut self, level: Level, message: impl Into<String>, profile: &Profile) {
        self.report.record(level, message, Some(&profile.name));
    }
}

/// Marker file name for a profile: spaces in the name become `_`
pub fn status_flag_name(profile_name: &str, flag: &str) -> String {
    format!("{}_{}.{}", profile_name.replace(' ', "_"), flag, STATUS_FLAG_SUFFIX)
}

/// Every directory a profile names must already exist
fn check_directories(profile: &Profile) -> Result<(), DirectoryError> {
    let dirs = [
        ("local", Some(&profile.local_directory)),
        ("archive", profile.archive_directory.as_ref()),
        ("target", profile.target_directory.as_ref()),
    ];
    for (label, dir) in dirs {
        if let Some(path) = dir {
            if !path.is_dir() {
                return Err(DirectoryError {
                    label,
                    path: path.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Regular, non-hidden files in `dir`, sorted by name
fn list_local(dir: &Path) -> Result<Vec<String>, LocalIoError> {
    let list_error = |source| LocalIoError::List {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_error)? {
        let entry = entry.map_err(list_error)?;
        if !entry.file_type().map_err(list_error)?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        // skips our own in-flight temporaries too
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// `dir/name` on the remote side
fn remote_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}
