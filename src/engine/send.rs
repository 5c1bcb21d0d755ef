//! Local directory to remote site.

use super::{list_local, remote_path, FlowOutcome, ProfileEngine};
use crate::archive::archive_file;
use crate::config::Profile;
use crate::logging::{log, Level};
use crate::protocols::Connector;
use crate::reconnect::ReconnectPolicy;
use crate::session::Session;
use crate::unpack::{unpack, Unpacked};
use std::collections::HashSet;

impl<C: Connector> ProfileEngine<C> {
    /// Uploads matching local files to every remote directory, then archives them
    ///
    /// A file is archived (and so removed locally) only once every upload of
    /// it has succeeded. A packed original is removed only after that too.
    pub(super) fn send_files(
        &mut self,
        profile: &Profile,
        session: &mut Session<C::Client>,
        policy: &ReconnectPolicy,
        queued: &HashSet<String>,
    ) -> FlowOutcome {
        let mut outcome = FlowOutcome::default();
        let local_dir = &profile.local_directory;
        let names = match list_local(local_dir) {
            Ok(names) => names,
            Err(e) => {
                self.record(Level::Fail, e.to_string(), profile);
                return outcome;
            }
        };

        'files: for name in names {
            if self.stop_requested(Some(profile)) {
                break;
            }

            let selected = profile.selector.select(&name);
            if !selected.matched {
                self.unmatched(profile, &name, &local_dir.display().to_string());
                continue;
            }
            if queued.contains(&name) {
                let _ = log(&format!("{} already sent, skipping", name));
                continue;
            }
            outcome.found += 1;

            let unpacked = if profile.unpack {
                match unpack(local_dir, &name) {
                    Ok(unpacked) => unpacked,
                    Err(e) => {
                        self.record(Level::Fail, e.to_string(), profile);
                        continue;
                    }
                }
            } else {
                Unpacked::unchanged(&name)
            };
            let (target, _) = profile.selector.target_name(&selected.groups, &unpacked.name);
            let local_path = local_dir.join(&unpacked.name);

            for dir in &profile.remote_directories {
                let remote = remote_path(dir, &target);
                match policy.run(session, |s| s.upload(&local_path, &remote)) {
                    Ok(bytes) => {
                        let _ = log(&format!(
                            "Sent {} to {}:{} ({} bytes)",
                            local_path.display(),
                            session.endpoint().site,
                            remote,
                            bytes
                        ));
                    }
                    Err(failure) => {
                        if self.transfer_failed(profile, policy, failure) {
                            outcome.abandoned = true;
                            break 'files;
                        }
                        continue 'files;
                    }
                }
            }

            if let Some(archive_dir) = &profile.archive_directory {
                if let Err(e) = archive_file(&local_path, archive_dir, &target) {
                    self.record(Level::Fail, e.to_string(), profile);
                    continue;
                }
            }
            if let Err(e) = unpacked.discard_packed() {
                self.record(Level::Fail, e.to_string(), profile);
            }
            outcome.handled.push(name);
        }

        outcome
    }
}
