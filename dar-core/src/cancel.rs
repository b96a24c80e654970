// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A cooperative cancellation channel, replacing the process-wide signal
//! handlers the original implementation relied on (§9 "Global state").
//! The orchestration layer owns one [`CancelToken`] per operation and
//! polls it at every slice boundary, every catalogue entry, and every
//! compressor block boundary, as §5 requires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DarError, Result};

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(ThreadCancel)` if cancellation was requested since
    /// the token was created or last checked; call at every checkpoint
    /// §5 names.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DarError::ThreadCancel)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_fails_only_after_cancel() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.check().is_err());
    }
}
