// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The user-interaction callback surface (§6).
//!
//! This is an external collaborator per the specification's scope: the
//! library only ever calls through this trait, never touches a terminal
//! directly. The `dar` binary supplies a real terminal implementation;
//! tests and `--batch` mode use [`Silent`].

/// A three-way answer to an overwriting-policy `ask` escalation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AskVerdict {
    Keep,
    Overwrite,
    Abort,
}

pub trait UserInteraction: Send + Sync {
    fn warning(&self, text: &str);

    /// Asks a yes/no question (e.g. "free up space and retry?",
    /// "continue past this corruption?"). Returns `false` on a "no"
    /// answer or when interaction is unavailable, which callers must
    /// treat as [`crate::error::DarError::UserAbort`].
    fn pause(&self, text: &str) -> bool;

    fn get_string(&self, prompt: &str, echo: bool) -> Option<String>;

    fn get_secure_string(&self, prompt: &str) -> Option<String> {
        self.get_string(prompt, false)
    }

    fn ask_overwrite(&self, text: &str) -> AskVerdict;
}

/// A non-interactive implementation: warnings are dropped, pauses are
/// auto-denied (so a script run unattended aborts rather than hangs),
/// used under `--batch` and throughout this crate's test suite.
#[derive(Default)]
pub struct Silent;

impl UserInteraction for Silent {
    fn warning(&self, _text: &str) {}

    fn pause(&self, _text: &str) -> bool {
        false
    }

    fn get_string(&self, _prompt: &str, _echo: bool) -> Option<String> {
        None
    }

    fn ask_overwrite(&self, _text: &str) -> AskVerdict {
        AskVerdict::Abort
    }
}

/// Auto-confirms every pause, used by tests that exercise the "operator
/// agreed to continue" path without a real terminal.
#[derive(Default)]
pub struct AutoConfirm;

impl UserInteraction for AutoConfirm {
    fn warning(&self, _text: &str) {}

    fn pause(&self, _text: &str) -> bool {
        true
    }

    fn get_string(&self, _prompt: &str, _echo: bool) -> Option<String> {
        None
    }

    fn ask_overwrite(&self, _text: &str) -> AskVerdict {
        AskVerdict::Overwrite
    }
}
