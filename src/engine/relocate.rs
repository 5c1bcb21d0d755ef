//! Local archive flow: no remote side at all.

use super::{list_local, FlowOutcome, ProfileEngine};
use crate::archive::archive_file;
use crate::config::{is_handled, Profile};
use crate::logging::{log, Level};
use crate::protocols::Connector;
use std::collections::HashSet;

impl<C: Connector> ProfileEngine<C> {
    /// Moves matching local files into the archive under their derived names
    pub(super) fn archive_files(&mut self, profile: &Profile, queued: &HashSet<String>) -> FlowOutcome {
        let mut outcome = FlowOutcome::default();
        let local_dir = &profile.local_directory;
        // validation guarantees an archive directory for this direction
        let Some(archive_dir) = &profile.archive_directory else {
            return outcome;
        };

        let names = match list_local(local_dir) {
            Ok(names) => names,
            Err(e) => {
                self.record(Level::Fail, e.to_string(), profile);
                return outcome;
            }
        };

        for name in names {
            if self.stop_requested(Some(profile)) {
                break;
            }

            // GLOBAL archive_only_handled narrows every archive profile
            if profile.only_handled && !is_handled(&name) {
                continue;
            }
            let selected = profile.selector.select(&name);
            if !selected.matched {
                self.unmatched(profile, &name, &local_dir.display().to_string());
                continue;
            }
            if queued.contains(&name) {
                continue;
            }
            outcome.found += 1;

            match archive_file(&local_dir.join(&name), archive_dir, &selected.target_name) {
                Ok(archived) => {
                    let _ = log(&format!("Moved {} to {}", local_dir.join(&name).display(), archived.display()));
                    outcome.handled.push(name);
                }
                Err(e) => self.record(Level::Fail, e.to_string(), profile),
            }
        }

        outcome
    }
}
