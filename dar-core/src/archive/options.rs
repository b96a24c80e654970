// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-operation option bags (§4.7), populated by the CLI front-end
//! from its flags and passed down to the orchestration state machines
//! unchanged.

use crate::compress::CompressionAlgo;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DirtyBehaviour {
    Ignore,
    Warn,
    Ok,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComparisonFields {
    All,
    IgnoreOwner,
    Mtime,
    InodeType,
}

#[derive(Clone, Debug)]
pub struct CreateOptions {
    pub compression: CompressionAlgo,
    pub compression_level: u32,
    pub min_compr_size: u64,
    pub sparse_min_size: u64,
    pub retry_count: u32,
    pub retry_byte: u64,
    pub dirty_behaviour: DirtyBehaviour,
}

impl Default for CreateOptions {
    fn default() -> CreateOptions {
        CreateOptions {
            compression: CompressionAlgo::None,
            compression_level: 6,
            min_compr_size: 100,
            sparse_min_size: 4096,
            retry_count: 3,
            retry_byte: 0,
            dirty_behaviour: DirtyBehaviour::Warn,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TestOptions {
    pub lax: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListFormat {
    Tar,
    Tree,
    Xml,
    SlicingLocation,
}

#[derive(Clone, Debug)]
pub struct DiffOptions {
    pub fields: ComparisonFields,
}

impl Default for DiffOptions {
    fn default() -> DiffOptions {
        DiffOptions { fields: ComparisonFields::All }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RestoreOptions {
    pub ignore_deleted: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MergeOptions {
    pub keep_compressed: bool,
}
