//! Profile-driven file mover
//!
//! This library contains the core logic for the ltsmover utility: YAML
//! profile loading and validation, the SFTP/FTP/SCP transfer clients, file
//! selection and renaming, unpacking, archiving, lock-guarded queue files,
//! reconnect handling, logging and shutdown signaling.

// Module declarations
pub mod archive;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod protocols;
pub mod queue;
pub mod reconnect;
pub mod report;
pub mod selector;
pub mod session;
pub mod shutdown;
pub mod unpack;

// Re-export key items for easy use by the binary (main.rs)
pub use cli::parse_args;
pub use config::{load_config, Profile, RawProfile};
pub use engine::{run_config, ProfileEngine, RunMode, RunOptions};
pub use error::ConfigError;
pub use logging::{log, log_with_profile, set_log_file, set_verbose};
pub use report::RunReport;
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};

/// Name of the program, used in usage output and log lines
pub const PROGRAM_NAME: &str = "ltsmover";

/// Current version of the program (from Cargo.toml)
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
