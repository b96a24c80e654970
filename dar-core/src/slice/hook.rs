// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inter-slice hook command expansion and execution (§4.2).
//!
//! `%p`/`%b`/`%n`/`%N`/`%e`/`%c`/`%%` are expanded in the hook's command
//! text before it is handed to a shell. A non-zero exit is reported as a
//! recoverable [`crate::error::DarError::Script`], which the caller
//! surfaces to the user-interaction layer for a retry/abort decision.

use std::path::Path;
use std::process::Command;

use crate::error::{DarError, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookContext {
    Init,
    Operation,
    LastSlice,
}

impl HookContext {
    fn as_str(self) -> &'static str {
        match self {
            HookContext::Init => "init",
            HookContext::Operation => "operation",
            HookContext::LastSlice => "last_slice",
        }
    }
}

pub struct HookVars<'a> {
    pub slice_dir: &'a Path,
    pub basename: &'a str,
    pub slice_number: u64,
    pub extension: &'a str,
    pub min_digits: usize,
    pub context: HookContext,
}

/// Expands the macros defined in §4.2 into a shell-ready command string.
pub fn expand(template: &str, vars: &HookVars<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('p') => out.push_str(&vars.slice_dir.display().to_string()),
            Some('b') => out.push_str(vars.basename),
            Some('n') => {
                out.push_str(&format!("{:0width$}", vars.slice_number, width = vars.min_digits))
            }
            Some('N') => out.push_str(&vars.slice_number.to_string()),
            Some('e') => out.push_str(vars.extension),
            Some('c') => out.push_str(vars.context.as_str()),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Runs the expanded hook command through the platform shell.
pub fn run(command: &str) -> Result<()> {
    if command.is_empty() {
        return Ok(());
    }
    let status = Command::new("/bin/sh").arg("-c").arg(command).status().map_err(|e| {
        DarError::Script { command: command.to_string(), status: e.raw_os_error().unwrap_or(-1) }
    })?;
    if !status.success() {
        return Err(DarError::Script {
            command: command.to_string(),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn expands_all_macros() {
        let dir = PathBuf::from("/backups");
        let vars = HookVars {
            slice_dir: &dir,
            basename: "arc",
            slice_number: 7,
            extension: "dar",
            min_digits: 3,
            context: HookContext::Operation,
        };
        let expanded = expand("%p/%b.%n.%e [%c] %%done slice %N", &vars);
        assert_eq!(expanded, "/backups/arc.007.dar [operation] %done slice 7");
    }

    #[test]
    fn unknown_macro_is_left_intact() {
        let dir = PathBuf::from(".");
        let vars = HookVars {
            slice_dir: &dir,
            basename: "a",
            slice_number: 1,
            extension: "dar",
            min_digits: 1,
            context: HookContext::Init,
        };
        assert_eq!(expand("%q", &vars), "%q");
    }
}
