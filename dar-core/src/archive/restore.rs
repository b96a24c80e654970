// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `restore` (§4.7): catalogue-driven write-out. For each entry read
//! off the archive, the overwriting policy is consulted against
//! whatever the [`RestoreTarget`] reports already exists at that path;
//! inode, data, EA, and FSA are then applied in that order.

use crate::cancel::CancelToken;
use crate::catalogue::{Entry, InodeAttrs};
use crate::crypto::Cipher;
use crate::error::Result;
use crate::policy::{Action, Policy};
use crate::stream::ArchiveStream;
use crate::summary::OperationSummary;
use crate::ui::UserInteraction;

use super::format::{read_body, BodySink};
use super::open::read_header;
use super::options::RestoreOptions;

/// The filesystem-facing half of a restore: told what to do, not how.
/// A concrete implementation (the `dar` binary's real one, or a test
/// double) owns actual path joining and syscalls.
pub trait RestoreTarget {
    /// The entry already on disk at `path`, if any, for policy
    /// evaluation; `None` means the path is free.
    fn existing(&self, path: &[String]) -> Option<Entry>;

    /// Creates (or updates the attrs of) the directory at `path`, ahead
    /// of any children being written into it.
    fn make_directory(&mut self, path: &[String], attrs: &InodeAttrs) -> Result<()>;

    /// Writes a non-directory inode's metadata/content at `path`.
    /// Called once per entry, after the policy's data verdict resolved
    /// to an overwrite; EA/FSA application is a separate call below so
    /// a `preserve-data, overwrite-ea` verdict pair can be honoured.
    fn write_entry(&mut self, path: &[String], entry: &Entry, raw: Option<&[u8]>) -> Result<()>;

    fn apply_ea(&mut self, path: &[String], attrs: &InodeAttrs) -> Result<()>;

    fn apply_fsa(&mut self, path: &[String], attrs: &InodeAttrs) -> Result<()>;

    fn remove(&mut self, path: &[String]) -> Result<()>;
}

struct RestoreSink<'a> {
    target: &'a mut dyn RestoreTarget,
    policy: &'a Policy,
    ui: &'a dyn UserInteraction,
    opts: RestoreOptions,
    errors: Vec<String>,
    /// `on_file_data` fires from inside `read_file`, before the
    /// `Entry::File` it belongs to is built one frame up; buffer the
    /// bytes here keyed by path and consume them once `on_entry` gives
    /// us the real entry (and so the real policy verdict) to act on.
    pending_data: std::collections::HashMap<String, Vec<u8>>,
}

impl<'a> BodySink for RestoreSink<'a> {
    fn wants_data(&self) -> bool {
        true
    }

    fn on_enter_directory(&mut self, path: &[String], attrs: &InodeAttrs) {
        if let Err(e) = self.target.make_directory(path, attrs) {
            self.errors.push(format!("{}: {e}", display(path)));
        }
    }

    fn on_entry(&mut self, path: &[String], entry: &Entry) {
        if matches!(entry, Entry::Directory { .. }) {
            if let Some(attrs) = entry.attrs() {
                if let Err(e) = self.target.apply_ea(path, attrs) {
                    self.errors.push(format!("{}: {e}", display(path)));
                }
            }
            return;
        }
        if let Entry::Tombstone { .. } = entry {
            if !self.opts.ignore_deleted {
                if let Err(e) = self.target.remove(path) {
                    self.errors.push(format!("{}: {e}", display(path)));
                }
            }
            return;
        }

        let existing = self.target.existing(path);
        let verdict = match &existing {
            Some(in_place) => self.policy.resolve(in_place, entry, self.ui, &format!("overwrite {}?", display(path))),
            None => crate::policy::Verdict { data: Action::Overwrite, ea: Action::Overwrite },
        };

        let raw = self.pending_data.remove(&display(path));
        if data_wins(verdict.data) {
            if let Err(e) = self.target.write_entry(path, entry, raw.as_deref()) {
                self.errors.push(format!("{}: {e}", display(path)));
            }
        }
        if ea_wins(verdict.ea) {
            if let Some(attrs) = entry.attrs() {
                if let Err(e) = self.target.apply_ea(path, attrs) {
                    self.errors.push(format!("{}: {e}", display(path)));
                }
                if let Err(e) = self.target.apply_fsa(path, attrs) {
                    self.errors.push(format!("{}: {e}", display(path)));
                }
            }
        }
    }

    fn on_file_data(&mut self, path: &[String], raw: &[u8]) -> Result<()> {
        self.pending_data.insert(display(path), raw.to_vec());
        Ok(())
    }
}

fn data_wins(action: Action) -> bool {
    matches!(action, Action::Overwrite | Action::OverwriteMarkAbsent | Action::MergeOverwrite)
}

fn ea_wins(action: Action) -> bool {
    matches!(action, Action::Overwrite | Action::OverwriteMarkAbsent | Action::MergeOverwrite | Action::MergePreserve)
}

fn display(path: &[String]) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.join("/")
    }
}

/// Runs `restore`: reads the archive via `read_body`, consulting
/// `policy` for every collision with what `target` already has.
pub fn restore(
    stream: &mut dyn ArchiveStream,
    cipher: &dyn Cipher,
    target: &mut dyn RestoreTarget,
    policy: &Policy,
    ui: &dyn UserInteraction,
    opts: RestoreOptions,
    cancel: &CancelToken,
) -> Result<(OperationSummary, Vec<String>)> {
    let _ = read_header(stream, cipher)?;
    let mut sink = RestoreSink { target, policy, ui, opts, errors: Vec::new(), pending_data: std::collections::HashMap::new() };
    let (_, summary) = read_body(stream, &mut sink, cipher, cancel)?;
    Ok((summary, sink.errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create::create;
    use crate::archive::format::FileDataSource;
    use crate::archive::options::CreateOptions;
    use crate::catalogue::{FileEntry, SavedState};
    use crate::crypto::NoCipher;
    use crate::date::Date;
    use crate::error::DarError;
    use crate::integers::Infinint;
    use crate::stream::test_support::MemStream;
    use crate::ui::Silent;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MapSource(HashMap<String, Vec<u8>>);
    impl FileDataSource for MapSource {
        fn read_all(&self, path: &[String]) -> Result<Vec<u8>> {
            self.0.get(&path.join("/")).cloned().ok_or_else(|| DarError::Data("missing".into()))
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        written: RefCell<Vec<(String, Vec<u8>)>>,
        directories: RefCell<Vec<String>>,
    }

    impl RestoreTarget for RecordingTarget {
        fn existing(&self, _path: &[String]) -> Option<Entry> {
            None
        }
        fn make_directory(&mut self, path: &[String], _attrs: &InodeAttrs) -> Result<()> {
            self.directories.borrow_mut().push(display(path));
            Ok(())
        }
        fn write_entry(&mut self, path: &[String], _entry: &Entry, raw: Option<&[u8]>) -> Result<()> {
            if let Some(raw) = raw {
                self.written.borrow_mut().push((display(path), raw.to_vec()));
            }
            Ok(())
        }
        fn apply_ea(&mut self, _path: &[String], _attrs: &InodeAttrs) -> Result<()> {
            Ok(())
        }
        fn apply_fsa(&mut self, _path: &[String], _attrs: &InodeAttrs) -> Result<()> {
            Ok(())
        }
        fn remove(&mut self, _path: &[String]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn restore_writes_directories_before_the_files_inside_them() {
        let mut file = FileEntry::not_saved(InodeAttrs::new("f", 0o644, Date::from_unix_seconds(10)), Infinint::from(2u64));
        file.saved = SavedState::Saved;
        let mut root = Entry::Directory {
            attrs: InodeAttrs::new("", 0o755, Date::EPOCH),
            children: vec![Entry::Directory { attrs: InodeAttrs::new("a", 0o755, Date::EPOCH), children: vec![Entry::File(file)] }],
        };
        let mut data = HashMap::new();
        data.insert("a/f".to_string(), b"hi".to_vec());
        let source = MapSource(data);
        let mut stream = MemStream::new();
        create(&mut root, &source, &NoCipher, &CreateOptions::default(), "dar -c t -R .", &CancelToken::new(), &mut stream).unwrap();
        stream.skip(0).unwrap();

        let mut target = RecordingTarget::default();
        let policy = Policy::constant(Action::Overwrite, Action::Overwrite);
        let ui = Silent;
        let (summary, errors) = restore(&mut stream, &NoCipher, &mut target, &policy, &ui, RestoreOptions::default(), &CancelToken::new()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(summary.treated, 3);
        assert_eq!(target.directories.borrow().as_slice(), ["a"]);
        assert_eq!(target.written.borrow()[0].1, b"hi");
    }
}
