// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The error taxonomy shared by every layer of the archive engine.
//!
//! Each variant corresponds to one of the error *kinds* a component may
//! raise; it is not a per-component type. Leaf components never retry a
//! `DarError` invisibly (EINTR and ENOSPC are handled below them); every
//! other error unwinds to the orchestration layer, which alone decides
//! whether to continue or abort.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DarError>;

/// Error kinds, matching the taxonomy that the orchestration layer
/// classifies on a one-line banner before printing the message itself.
#[derive(Debug, thiserror::Error)]
pub enum DarError {
    #[error("counter limit exceeded: {0}")]
    LimitOverflow(String),

    #[error("argument out of range: {0}")]
    Range(String),

    #[error("allocation failed: {0}")]
    Memory(String),

    #[error("device fault on {path}: {source}")]
    Hardware {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("aborted by user")]
    UserAbort,

    #[error("data error: {0}")]
    Data(String),

    #[error("script '{command}' exited with status {status}")]
    Script { command: String, status: i32 },

    #[error("invalid use of the library: {0}")]
    LibraryCall(String),

    #[error("feature not enabled in this build: {0}")]
    Feature(&'static str),

    #[error("operation cancelled")]
    ThreadCancel,

    #[error("internal invariant violated: {0}")]
    Bug(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("missing slice #{0}")]
    SliceMissing(u64),

    #[error("slice label mismatch: expected {expected:?}, found {found:?}")]
    LabelMismatch { expected: crate::label::Label, found: crate::label::Label },

    #[error("bad slice header: {0}")]
    BadHeader(String),

    #[error("unresolved hard-link id {0}")]
    UnresolvedHardLink(u64),

    #[error("unknown record signature {0:#x}")]
    UnknownRecordSignature(u8),
}

impl DarError {
    /// The one-line classification the orchestration layer prints
    /// before the error message and per-component counters.
    pub fn classification(&self) -> &'static str {
        use DarError::*;
        match self {
            LimitOverflow(_) => "limit-int",
            Range(_) | LibraryCall(_) => "library-call",
            Memory(_) => "memory",
            Hardware { .. } | Io { .. } => "hardware",
            UserAbort => "user-abort",
            Data(_)
            | SliceMissing(_)
            | LabelMismatch { .. }
            | BadHeader(_)
            | UnresolvedHardLink(_)
            | UnknownRecordSignature(_) => "data-error",
            Script { .. } => "script-error",
            Feature(_) => "missing-feature",
            ThreadCancel => "user-abort",
            Bug(_) => "bug",
        }
    }

    /// Maps to the CLI exit codes defined in the specification.
    pub fn exit_code(&self) -> u8 {
        use DarError::*;
        match self {
            Range(_) | LibraryCall(_) => 7,
            Memory(_) => 2,
            Hardware { .. } | Io { .. } => 2,
            UserAbort | ThreadCancel => 4,
            Data(_)
            | SliceMissing(_)
            | LabelMismatch { .. }
            | BadHeader(_)
            | UnresolvedHardLink(_)
            | UnknownRecordSignature(_) => 5,
            Script { .. } => 6,
            Feature(_) => 10,
            LimitOverflow(_) => 8,
            Bug(_) => 3,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: io::Error) -> DarError {
    DarError::Io { path: path.into(), source }
}
