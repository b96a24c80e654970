// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The catalogue: the in-archive directory+metadata index (§3, §4.4-§4.5).

pub mod ea;
pub mod entry;
pub mod fsa;
pub mod io;
pub mod iterator;

pub use entry::{CompressionState, DeviceEntry, Entry, EntryTag, FileEntry, InodeAttrs, SavedState, SparseHole};
pub use io::Catalogue;
pub use iterator::{CatalogueIter, DepthDelta};
