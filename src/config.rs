//! Profile configuration: YAML loading, defaults and validation.
//!
//! A configuration file is a YAML sequence of mappings. Every field is read
//! into an optional slot of [`RawProfile`] and then validated once into a
//! [`Profile`] with explicit defaults; a bad profile never stops the others.

use crate::error::ConfigError;
use crate::protocols::Endpoint;
use crate::selector::{FileSelector, RenameRule};
use chrono::{Datelike, Local, NaiveDate};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Reserved profile name carrying run-wide settings
pub const GLOBAL_PROFILE: &str = "GLOBAL";

/// File pattern used by archive profiles that do not set one
pub const DEFAULT_ARCHIVE_PATTERN: &str = ".*";
/// Suffix a file needs to be archived when GLOBAL `archive_only_handled` is on
pub const HANDLED_SUFFIX: &str = ".handled";

pub const YEAR_KEYWORD: &str = "_YEAR_";
pub const MONTH_KEYWORD: &str = "_MONTH_";
pub const DAY_KEYWORD: &str = "_DAY_";

/// Transport used by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Sftp,
    Ftp,
    Scp,
}

impl Protocol {
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Sftp | Protocol::Scp => 22,
            Protocol::Ftp => 21,
        }
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SFTP" => Ok(Protocol::Sftp),
            "FTP" => Ok(Protocol::Ftp),
            "SCP" => Ok(Protocol::Scp),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Sftp => "SFTP",
            Protocol::Ftp => "FTP",
            Protocol::Scp => "SCP",
        })
    }
}

/// `job_status` of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Enabled,
    Disabled,
    /// Remote site known to be down: connection failures become warnings
    SiteDown,
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENABLED" => Ok(JobStatus::Enabled),
            "DISABLED" => Ok(JobStatus::Disabled),
            "SITEDOWN" => Ok(JobStatus::SiteDown),
            _ => Err(()),
        }
    }
}

/// What a profile does with its files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Send,
    Receive,
    /// Local only: move handled files into the archive
    Archive,
    /// Local only: put files dropped into the incoming directory in place
    Deliver,
}

impl Direction {
    /// Past tense used in per-profile summaries
    pub fn verb(&self) -> &'static str {
        match self {
            Direction::Send => "sent",
            Direction::Receive => "received",
            Direction::Archive => "archived",
            Direction::Deliver => "delivered",
        }
    }

    /// True for the directions that never touch a remote site
    pub fn is_local(&self) -> bool {
        matches!(self, Direction::Archive | Direction::Deliver)
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "send" => Ok(Direction::Send),
            "receive" => Ok(Direction::Receive),
            "archive" => Ok(Direction::Archive),
            "deliver" => Ok(Direction::Deliver),
            _ => Err(()),
        }
    }
}

/// Severity chosen for unmatched files and for "nothing found"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    Pass,
    Warn,
    Fail,
}

impl Policy {
    pub fn level(&self) -> crate::logging::Level {
        use crate::logging::Level;
        match self {
            Policy::Pass => Level::Pass,
            Policy::Warn => Level::Warn,
            Policy::Fail => Level::Fail,
        }
    }
}

impl FromStr for Policy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Ok(Policy::Pass),
            "WARN" => Ok(Policy::Warn),
            "FAIL" => Ok(Policy::Fail),
            _ => Err(()),
        }
    }
}

/// A YAML boolean or a `yes`/`no` string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "true" | "y" | "1"),
        }
    }
}

/// `remote_directories` as a YAML list or a comma-separated string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RemoteDirs {
    List(Vec<String>),
    Joined(String),
}

impl RemoteDirs {
    pub fn to_vec(&self) -> Vec<String> {
        let dirs: Vec<String> = match self {
            RemoteDirs::List(list) => list.iter().map(|d| d.trim().to_string()).collect(),
            RemoteDirs::Joined(joined) => joined.split(',').map(|d| d.trim().to_string()).collect(),
        };
        dirs.into_iter().filter(|d| !d.is_empty()).collect()
    }
}

/// One profile exactly as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProfile {
    /// Set when a field had the wrong YAML type; only the name and status survive
    #[serde(skip)]
    pub field_error: Option<String>,
    pub profile_name: Option<String>,
    pub job_status: Option<String>,
    pub direction: Option<String>,
    pub protocol: Option<String>,
    pub remote_site: Option<String>,
    pub remote_user: Option<String>,
    pub password: Option<SecretString>,
    pub private_key: Option<PathBuf>,
    pub port: Option<u16>,
    pub local_directory: Option<String>,
    pub remote_directories: Option<RemoteDirs>,
    pub file_pattern: Option<String>,
    pub rename_template: Option<String>,
    pub archive_directory: Option<PathBuf>,
    pub target_directory: Option<PathBuf>,
    pub unpack: Option<Flag>,
    pub handle_unmatched_files: Option<String>,
    pub handle_no_files: Option<String>,
    pub queue_file: Option<PathBuf>,
    pub only_new: Option<Flag>,
    pub status_flag: Option<String>,
    // GLOBAL only
    pub status_file_directory: Option<PathBuf>,
    pub archive_only_handled: Option<Flag>,
}

impl RawProfile {
    /// Reads one entry of the profile sequence
    ///
    /// A wrongly typed field does not fail the file: the profile keeps its
    /// name and job status and fails validation later with the reason.
    pub fn from_value(value: serde_yaml_ng::Value) -> Self {
        let text = |key: &str| value.get(key).and_then(serde_yaml_ng::Value::as_str).map(str::to_string);
        let profile_name = text("profile_name");
        let job_status = text("job_status");

        RawProfile::deserialize(value).unwrap_or_else(|e| RawProfile {
            profile_name,
            job_status,
            field_error: Some(e.to_string()),
            ..RawProfile::default()
        })
    }
}

/// Settings taken from the GLOBAL profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalSettings {
    pub status_file_directory: Option<PathBuf>,
    pub archive_only_handled: bool,
}

impl GlobalSettings {
    /// Folds a GLOBAL profile in; later values override earlier ones
    pub fn absorb(&mut self, raw: &RawProfile) {
        if let Some(dir) = &raw.status_file_directory {
            self.status_file_directory = Some(dir.clone());
        }
        if let Some(flag) = &raw.archive_only_handled {
            self.archive_only_handled = flag.is_set();
        }
    }
}

/// A validated profile with every default applied
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub status: JobStatus,
    pub direction: Direction,
    /// Remote account; `None` for archive profiles
    pub endpoint: Option<Endpoint>,
    pub local_directory: PathBuf,
    pub remote_directories: Vec<String>,
    pub selector: FileSelector,
    pub archive_directory: Option<PathBuf>,
    pub target_directory: Option<PathBuf>,
    pub unpack: bool,
    pub unmatched_files: Policy,
    pub no_files: Policy,
    pub queue_file: Option<PathBuf>,
    pub only_new: bool,
    pub status_flag: Option<String>,
    /// Archive only `*.handled` files, whatever the pattern says
    pub only_handled: bool,
}

impl RawProfile {
    pub fn is_global(&self) -> bool {
        self.profile_name.as_deref() == Some(GLOBAL_PROFILE)
    }

    /// Name used in messages, even for a profile without `profile_name`
    pub fn label(&self, index: usize) -> String {
        match &self.profile_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("profile #{}", index + 1),
        }
    }

    /// `job_status`, treating an unknown value as enabled (validation reports it)
    pub fn status(&self) -> JobStatus {
        self.job_status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Validates against today's local date
    pub fn validate(&self, index: usize, global: &GlobalSettings) -> Result<Profile, Vec<ConfigError>> {
        self.validate_on(index, global, Local::now().date_naive())
    }

    /// Checks every field, collecting all problems rather than stopping at the first
    pub fn validate_on(&self, index: usize, global: &GlobalSettings, date: NaiveDate) -> Result<Profile, Vec<ConfigError>> {
        let label = self.label(index);
        if let Some(reason) = &self.field_error {
            return Err(vec![ConfigError::BadField {
                profile: label,
                reason: reason.clone(),
            }]);
        }
        let mut errors = Vec::new();

        let missing = |field: &'static str| ConfigError::MissingField {
            profile: label.clone(),
            field,
        };
        let invalid = |field: &'static str, value: &str| ConfigError::InvalidValue {
            profile: label.clone(),
            field,
            value: value.to_string(),
        };

        if self.profile_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            errors.push(missing("profile_name"));
        }

        let status = parse_or(&self.job_status, "job_status", &invalid, &mut errors);
        let direction: Direction = parse_or(&self.direction, "direction", &invalid, &mut errors);
        let unmatched_files = parse_or(&self.handle_unmatched_files, "handle_unmatched_files", &invalid, &mut errors);
        let no_files = parse_or(&self.handle_no_files, "handle_no_files", &invalid, &mut errors);

        let local_directory = match &self.local_directory {
            Some(dir) if !dir.trim().is_empty() => Some(PathBuf::from(expand_date_keywords(dir, date))),
            _ => {
                errors.push(missing("local_directory"));
                None
            }
        };

        let endpoint = match direction {
            Direction::Archive | Direction::Deliver => None,
            Direction::Send | Direction::Receive => self.endpoint(direction, &label, &missing, &invalid, &mut errors),
        };

        if direction != Direction::Send && self.archive_directory.is_none() {
            errors.push(missing("archive_directory"));
        }
        if direction == Direction::Deliver && self.target_directory.is_none() {
            errors.push(missing("target_directory"));
        }
        if self.target_directory.is_some() {
            if !matches!(direction, Direction::Receive | Direction::Deliver) {
                errors.push(ConfigError::Conflict {
                    profile: label.clone(),
                    reason: "target_directory is only used when receiving or delivering".to_string(),
                });
            } else if self.archive_directory.is_none() {
                errors.push(ConfigError::Conflict {
                    profile: label.clone(),
                    reason: "target_directory requires archive_directory".to_string(),
                });
            }
        }

        let only_new = self.only_new.as_ref().is_some_and(Flag::is_set);
        if only_new && self.queue_file.is_none() {
            errors.push(ConfigError::Conflict {
                profile: label.clone(),
                reason: "only_new requires queue_file".to_string(),
            });
        }

        let pattern = match (&self.file_pattern, direction) {
            (Some(p), _) if !p.is_empty() => Some(expand_date_keywords(p, date)),
            (_, Direction::Archive) => Some(DEFAULT_ARCHIVE_PATTERN.to_string()),
            _ => {
                errors.push(missing("file_pattern"));
                None
            }
        };
        let selector = pattern.and_then(|p| match FileSelector::new(&p, self.rename_template.as_deref()) {
            Ok(selector) => {
                if matches!(selector.rule(), RenameRule::Year(_)) && selector.capture_groups() == 0 {
                    errors.push(ConfigError::YearWithoutGroup { profile: label.clone() });
                    None
                } else {
                    Some(selector)
                }
            }
            Err(source) => {
                errors.push(ConfigError::InvalidPattern {
                    profile: label.clone(),
                    source,
                });
                None
            }
        });

        match (errors.is_empty(), local_directory, selector) {
            (true, Some(local_directory), Some(selector)) => Ok(Profile {
                name: label,
                status,
                direction,
                endpoint,
                local_directory,
                remote_directories: self
                    .remote_directories
                    .as_ref()
                    .map(RemoteDirs::to_vec)
                    .filter(|dirs| !dirs.is_empty())
                    .unwrap_or_else(|| vec![".".to_string()]),
                selector,
                archive_directory: self.archive_directory.clone(),
                target_directory: self.target_directory.clone(),
                unpack: self.unpack.as_ref().is_some_and(Flag::is_set),
                unmatched_files,
                no_files,
                queue_file: self.queue_file.clone(),
                only_new,
                status_flag: self.status_flag.clone().filter(|f| !f.trim().is_empty()),
                only_handled: direction == Direction::Archive && global.archive_only_handled,
            }),
            _ => Err(errors),
        }
    }

    fn endpoint(
        &self,
        direction: Direction,
        label: &str,
        missing: &dyn Fn(&'static str) -> ConfigError,
        invalid: &dyn Fn(&'static str, &str) -> ConfigError,
        errors: &mut Vec<ConfigError>,
    ) -> Option<Endpoint> {
        let protocol = match self.protocol.as_deref() {
            None => {
                errors.push(missing("protocol"));
                None
            }
            Some(value) => match value.parse::<Protocol>() {
                Ok(p) => Some(p),
                Err(()) => {
                    errors.push(invalid("protocol", value));
                    None
                }
            },
        };
        let site = required(&self.remote_site, "remote_site", missing, errors);
        let user = required(&self.remote_user, "remote_user", missing, errors);

        match protocol {
            Some(Protocol::Ftp) if self.password.is_none() => errors.push(missing("password")),
            Some(Protocol::Sftp) if self.password.is_none() && self.private_key.is_none() => {
                errors.push(missing("password or private_key"))
            }
            Some(Protocol::Scp) if direction != Direction::Send => errors.push(ConfigError::Conflict {
                profile: label.to_string(),
                reason: "SCP can only send files".to_string(),
            }),
            _ => {}
        }

        Some(Endpoint {
            protocol: protocol?,
            site: site?,
            user: user?,
            password: self.password.clone(),
            private_key: self.private_key.clone(),
            port: self.port,
        })
    }
}

fn required(
    value: &Option<String>,
    field: &'static str,
    missing: &dyn Fn(&'static str) -> ConfigError,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            errors.push(missing(field));
            None
        }
    }
}

/// Parses an optional enum field, falling back to its default when absent
fn parse_or<T: FromStr + Default>(
    value: &Option<String>,
    field: &'static str,
    invalid: &dyn Fn(&'static str, &str) -> ConfigError,
    errors: &mut Vec<ConfigError>,
) -> T {
    match value {
        None => T::default(),
        Some(v) => v.parse().unwrap_or_else(|_| {
            errors.push(invalid(field, v));
            T::default()
        }),
    }
}

/// Replaces `_YEAR_`, `_MONTH_` and `_DAY_` with the parts of `date`
pub fn expand_date_keywords(text: &str, date: NaiveDate) -> String {
    text.replace(YEAR_KEYWORD, &format!("{:04}", date.year()))
        .replace(MONTH_KEYWORD, &format!("{:02}", date.month()))
        .replace(DAY_KEYWORD, &format!("{:02}", date.day()))
}

/// True for `<something>.handled`
pub fn is_handled(name: &str) -> bool {
    name.strip_suffix(HANDLED_SUFFIX).is_some_and(|stem| !stem.is_empty())
}

/// Reads a configuration file into raw profiles
///
/// Each entry is read on its own, so a bad field only spoils its profile.
///
/// # Errors
/// `NotFound`, `Unreadable` or `Malformed`, all of which stop the run
pub fn load_config(path: &Path) -> Result<Vec<RawProfile>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    // An empty file is an empty list of profiles
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<serde_yaml_ng::Value> = serde_yaml_ng::from_str(&text).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(entries.into_iter().map(RawProfile::from_value).collect())
}
