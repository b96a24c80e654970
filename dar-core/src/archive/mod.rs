// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Archive orchestration (§4.7): the seven top-level operations, each a
//! linear pipeline over the shared sequential-read body format.

pub mod create;
pub mod diff;
pub mod format;
pub mod isolate;
pub mod list;
pub mod merge;
pub mod open;
pub mod options;
pub mod restore;
pub mod test;
pub mod version;

pub use create::create;
pub use diff::{diff, DiffKind, DiffRecord};
pub use format::{BodySink, FileDataSource, NullSink};
pub use isolate::isolate;
pub use list::list;
pub use merge::{merge, MergeSource};
pub use options::{ComparisonFields, CreateOptions, DiffOptions, DirtyBehaviour, ListFormat, MergeOptions, RestoreOptions, TestOptions};
pub use restore::{restore, RestoreTarget};
pub use test::{test, Corruption};
pub use version::{ArchiveVersion, ARCHIVE_MAGIC, FORMAT_VERSION};
