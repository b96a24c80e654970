// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The sliced archive transport (SAR): §4.2 of the specification.

pub mod hash;
pub mod header;
pub mod hook;
pub mod sar;

pub use hash::HashAlgo;
pub use header::{SliceFlag, SliceHeader, FIXED_HEADER_LEN, MAGIC};
pub use sar::{OpenPolicy, SarReader, SarWriter, SliceLayout};
