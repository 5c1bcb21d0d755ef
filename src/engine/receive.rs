//! Inbound flows: remote site to local directory, and files dropped into the
//! incoming directory put in place, both with duplicate parking and delivery.

use super::{list_local, FlowOutcome, ProfileEngine};
use crate::archive::{date_stamp, deliver, divert_duplicate, dupe_dir_for, is_duplicate, DuplicateOutcome};
use crate::config::Profile;
use crate::error::LocalIoError;
use crate::logging::{log, Level};
use crate::protocols::Connector;
use crate::reconnect::ReconnectPolicy;
use crate::session::Session;
use crate::unpack::{unpack, Unpacked};
use std::collections::HashSet;
use std::path::Path;

/// What became of one incoming file
enum Placement {
    /// Left in the local directory for a later job
    Kept,
    Delivered,
    /// Already archived; not counted as received
    Duplicate,
}

impl<C: Connector> ProfileEngine<C> {
    /// Downloads matching files from every remote directory
    ///
    /// Files are stored, compared against the queue and recorded under their
    /// derived local names.
    pub(super) fn receive_files(
        &mut self,
        profile: &Profile,
        session: &mut Session<C::Client>,
        policy: &ReconnectPolicy,
        queued: &HashSet<String>,
    ) -> FlowOutcome {
        let mut outcome = FlowOutcome::default();

        let home = match policy.run(session, |s| s.current_directory()) {
            Ok(home) => home,
            Err(failure) => {
                outcome.abandoned = self.transfer_failed(profile, policy, failure);
                return outcome;
            }
        };

        'dirs: for dir in &profile.remote_directories {
            if self.stop_requested(Some(profile)) {
                break;
            }

            // every remote directory is relative to the login directory
            if let Err(failure) = policy.run(session, |s| s.change_directory(&home)) {
                outcome.abandoned = self.transfer_failed(profile, policy, failure);
                break;
            }
            if dir != "." {
                if let Err(failure) = policy.run(session, |s| s.change_directory(dir)) {
                    if self.transfer_failed(profile, policy, failure) {
                        outcome.abandoned = true;
                        break;
                    }
                    continue;
                }
            }

            let mut names = match policy.run(session, |s| s.list_entries(None)) {
                Ok(names) => names,
                Err(failure) => {
                    if self.transfer_failed(profile, policy, failure) {
                        outcome.abandoned = true;
                        break;
                    }
                    continue;
                }
            };
            names.sort();
            let location = format!("{}:{}", session.endpoint().site, dir);

            for name in names {
                if self.stop_requested(Some(profile)) {
                    break 'dirs;
                }

                let selected = profile.selector.select(&name);
                if !selected.matched {
                    self.unmatched(profile, &name, &location);
                    continue;
                }
                let local_name = selected.target_name;
                if queued.contains(&local_name) {
                    let _ = log(&format!("{} already received, skipping", local_name));
                    continue;
                }
                outcome.found += 1;

                let local_path = profile.local_directory.join(&local_name);
                match policy.run(session, |s| s.download(&name, &local_path)) {
                    Ok(bytes) => {
                        let _ = log(&format!(
                            "Received {}/{} as {} ({} bytes)",
                            location,
                            name,
                            local_path.display(),
                            bytes
                        ));
                    }
                    Err(failure) => {
                        if self.transfer_failed(profile, policy, failure) {
                            outcome.abandoned = true;
                            break 'dirs;
                        }
                        continue;
                    }
                }

                match self.place(profile, &local_name, None) {
                    Ok(Placement::Kept) | Ok(Placement::Delivered) => outcome.handled.push(local_name),
                    Ok(Placement::Duplicate) => {}
                    Err(e) => self.record(Level::Fail, e.to_string(), profile),
                }
            }
        }

        if !outcome.abandoned {
            if let Err(failure) = policy.run(session, |s| s.change_directory(&home)) {
                outcome.abandoned = self.transfer_failed(profile, policy, failure);
            }
        }
        outcome
    }

    /// Puts matching files already sitting in the incoming directory in place
    ///
    /// Covers files pushed there by a vendor and files an earlier run could
    /// not deliver. Names are derived at delivery time.
    pub(super) fn deliver_files(&mut self, profile: &Profile, queued: &HashSet<String>) -> FlowOutcome {
        let mut outcome = FlowOutcome::default();
        let local_dir = &profile.local_directory;

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

            let selected = profile.selector.select(&name);
            if !selected.matched {
                self.unmatched(profile, &name, &local_dir.display().to_string());
                continue;
            }
            if queued.contains(&name) {
                continue;
            }
            outcome.found += 1;

            match self.place(profile, &name, Some(selected.groups.as_slice())) {
                Ok(Placement::Delivered) | Ok(Placement::Kept) => outcome.handled.push(name),
                Ok(Placement::Duplicate) => {}
                Err(e) => self.record(Level::Fail, e.to_string(), profile),
            }
        }

        outcome
    }

    /// Unpacks an incoming file, then parks it as a duplicate or delivers it
    ///
    /// With `groups`, the delivered name is derived from the unpacked name;
    /// otherwise the file already carries its final name.
    fn place(
        &mut self,
        profile: &Profile,
        incoming_name: &str,
        groups: Option<&[Option<String>]>,
    ) -> Result<Placement, LocalIoError> {
        let local_dir = &profile.local_directory;
        let unpacked = if profile.unpack {
            unpack(local_dir, incoming_name)?
        } else {
            Unpacked::unchanged(incoming_name)
        };
        let name = unpacked.name.as_str();
        let incoming = local_dir.join(name);

        let placement = match (&profile.archive_directory, &profile.target_directory) {
            (None, _) => Placement::Kept,
            (Some(archive_dir), _) if is_duplicate(archive_dir, name) => {
                self.park_duplicate(profile, &incoming, name)?;
                Placement::Duplicate
            }
            (Some(archive_dir), Some(target_dir)) => {
                let target_name = match groups {
                    Some(groups) => profile.selector.target_name(groups, name).0,
                    None => name.to_string(),
                };
                let placed = deliver(&incoming, target_dir, &target_name, archive_dir)?;
                let _ = log(&format!("Put {} in place as {}", incoming.display(), placed.display()));
                Placement::Delivered
            }
            (Some(_), None) => Placement::Kept,
        };

        unpacked.discard_packed()?;
        Ok(placement)
    }

    fn park_duplicate(&mut self, profile: &Profile, incoming: &Path, name: &str) -> Result<(), LocalIoError> {
        let dupe_dir = dupe_dir_for(&profile.local_directory);
        match divert_duplicate(incoming, &dupe_dir, &date_stamp())? {
            DuplicateOutcome::Parked(parked) => self.record(
                Level::Fail,
                format!("{} was already archived, moved to {}", name, parked.display()),
                profile,
            ),
            DuplicateOutcome::NoDupeDir(left) => self.record(
                Level::Fail,
                format!(
                    "{} was already archived and {} does not exist, left {}",
                    name,
                    dupe_dir.display(),
                    left.display()
                ),
                profile,
            ),
        }
        Ok(())
    }
}
