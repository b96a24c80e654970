// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A real terminal implementation of [`UserInteraction`], used whenever
//! the CLI isn't run with `--batch`.

use std::io::{self, Write};

use dar_core::ui::{AskVerdict, UserInteraction};

#[derive(Default)]
pub struct TermUi;

impl UserInteraction for TermUi {
    fn warning(&self, text: &str) {
        eprintln!("warning: {text}");
    }

    fn pause(&self, text: &str) -> bool {
        eprint!("{text} [y/N] ");
        let _ = io::stderr().flush();
        read_line().map(|l| matches!(l.trim(), "y" | "Y" | "yes")).unwrap_or(false)
    }

    fn get_string(&self, prompt: &str, echo: bool) -> Option<String> {
        eprint!("{prompt}");
        let _ = io::stderr().flush();
        if echo {
            read_line()
        } else {
            rpassword_fallback()
        }
    }

    fn ask_overwrite(&self, text: &str) -> AskVerdict {
        eprint!("{text} [k]eep/[o]verwrite/[a]bort ");
        let _ = io::stderr().flush();
        match read_line().as_deref().map(str::trim) {
            Some("o") | Some("O") => AskVerdict::Overwrite,
            Some("k") | Some("K") => AskVerdict::Keep,
            _ => AskVerdict::Abort,
        }
    }
}

fn read_line() -> Option<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line).ok()?;
    Some(line.trim_end_matches(['\n', '\r']).to_string())
}

/// No terminal-echo-suppression dependency is in the workspace's
/// crate set, so a secure prompt still reads a visible line; callers
/// needing real echo suppression should pipe the secret in instead.
fn rpassword_fallback() -> Option<String> {
    read_line()
}
