//! Pass/warn/fail message groups collected over one run.

use crate::logging::{log_with_profile, logs_to_stdout, Level};
use std::fmt;

/// Outcome messages grouped by severity
///
/// This is what a run hands back to its caller (and what `main` prints).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub pass: Vec<String>,
    pub warn: Vec<String>,
    pub fail: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files the message under its group and logs it
    ///
    /// Grouped messages reach stdout once, when the report is printed, so
    /// they are only logged as they happen when a log file is set.
    pub fn record(&mut self, level: Level, message: impl Into<String>, profile: Option<&str>) {
        let message = message.into();
        if level == Level::Info || !logs_to_stdout() {
            let _ = log_with_profile(level, &message, profile);
        }
        match level {
            Level::Info => {}
            Level::Pass => self.pass.push(message),
            Level::Warn => self.warn.push(message),
            Level::Fail => self.fail.push(message),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.fail.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.pass.is_empty() && self.warn.is_empty() && self.fail.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups = [
            ("Failures", &self.fail),
            ("Warnings", &self.warn),
            ("Successful", &self.pass),
        ];
        for (title, messages) in groups {
            if messages.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{}", title)?;
            for message in messages {
                writeln!(f, "{}", message)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{set_log_file, LOG_FILE};
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_record_groups_by_level() {
        let mut report = RunReport::new();
        report.record(Level::Info, "connecting", None);
        report.record(Level::Pass, "sent a.xml", Some("p1"));
        report.record(Level::Warn, "nothing found", Some("p2"));
        report.record(Level::Fail, "login failed", Some("p3"));

        assert_eq!(report.pass, vec!["sent a.xml"]);
        assert_eq!(report.warn, vec!["nothing found"]);
        assert_eq!(report.fail, vec!["login failed"]);
        assert!(report.has_failures());
    }

    #[test]
    #[serial]
    fn test_grouped_messages_logged_only_to_a_file() {
        *LOG_FILE.lock().unwrap() = None;
        assert!(logs_to_stdout());

        let dir = tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let mut report = RunReport::new();
        report.record(Level::Fail, "before the log file", Some("p1"));
        set_log_file(&log_path);
        assert!(!logs_to_stdout());
        report.record(Level::Fail, "after the log file", Some("p1"));
        *LOG_FILE.lock().unwrap() = None;

        let logged = fs::read_to_string(&log_path).unwrap();
        assert!(!logged.contains("before the log file"));
        assert!(logged.contains("FAIL [p1] after the log file"));
        // printed once, in the grouped output
        let printed = report.to_string();
        assert_eq!(printed.matches("before the log file").count(), 1);
        assert_eq!(report.fail.len(), 2);
    }

    #[test]
    fn test_display_orders_failures_first() {
        let mut report = RunReport::new();
        report.record(Level::Pass, "ok", None);
        report.record(Level::Fail, "bad", None);

        let text = report.to_string();
        let fail_at = text.find("Failures").unwrap();
        let pass_at = text.find("Successful").unwrap();
        assert!(fail_at < pass_at);
        assert!(!text.contains("Warnings"));
    }
}
