// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A Unix-style path value: an ordered sequence of non-empty components
//! plus an absolute/relative flag. Distinct from `std::path::Path`
//! because the archive format always uses `/`-separated components
//! regardless of host OS, and because some strings (an "undisclosed"
//! mask pattern, for instance) must never be split on `/` at all.

use crate::error::{DarError, Result};
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DarPath {
    components: Vec<String>,
    absolute: bool,
    undisclosed: bool,
}

impl DarPath {
    pub fn root() -> DarPath {
        DarPath { components: Vec::new(), absolute: true, undisclosed: false }
    }

    pub fn relative() -> DarPath {
        DarPath { components: Vec::new(), absolute: false, undisclosed: false }
    }

    /// Parses a `/`-separated string into a path value. An
    /// "undisclosed" string (for instance a mask pattern containing
    /// literal slashes as data, not separators) is carried as a single
    /// opaque component instead.
    pub fn parse(s: &str, undisclosed: bool) -> DarPath {
        if undisclosed {
            return DarPath {
                components: vec![s.to_string()],
                absolute: s.starts_with('/'),
                undisclosed: true,
            };
        }
        let absolute = s.starts_with('/');
        let components =
            s.split('/').filter(|c| !c.is_empty()).map(String::from).collect();
        DarPath { components, absolute, undisclosed: false }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn push(&mut self, component: impl Into<String>) {
        let component = component.into();
        debug_assert!(!component.is_empty());
        self.components.push(component);
    }

    /// Removes and returns the first component. Popping the only
    /// component of an absolute single-component path is an error, not
    /// an empty path: the implicit root has no name to pop further.
    pub fn pop_front(&mut self) -> Result<Option<String>> {
        if self.components.is_empty() {
            if self.absolute {
                return Err(DarError::Range(
                    "cannot pop past the root of an absolute path".into(),
                ));
            }
            return Ok(None);
        }
        if self.components.len() == 1 && self.absolute {
            return Err(DarError::Range(
                "pop_front on an absolute single-component path".into(),
            ));
        }
        Ok(Some(self.components.remove(0)))
    }

    pub fn pop(&mut self) -> Option<String> {
        self.components.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True if `self` is `other` or a descendant of `other`.
    pub fn is_subdir_of(&self, other: &DarPath) -> bool {
        if other.components.len() > self.components.len() {
            return false;
        }
        self.components[..other.components.len()] == other.components[..]
    }

    pub fn join(&self, component: &str) -> DarPath {
        let mut out = self.clone();
        out.push(component);
        out
    }

    pub fn parent(&self) -> Option<DarPath> {
        if self.components.is_empty() {
            return None;
        }
        let mut out = self.clone();
        out.components.pop();
        Some(out)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }
}

impl fmt::Display for DarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.undisclosed {
            return write!(f, "{}", self.components[0]);
        }
        if self.absolute {
            write!(f, "/")?;
        }
        write!(f, "{}", self.components.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_and_relative() {
        let abs = DarPath::parse("/a/b/c", false);
        assert!(abs.is_absolute());
        assert_eq!(abs.components(), &["a", "b", "c"]);

        let rel = DarPath::parse("a/b", false);
        assert!(!rel.is_absolute());
        assert_eq!(rel.components(), &["a", "b"]);
    }

    #[test]
    fn collapses_empty_components() {
        let p = DarPath::parse("/a//b///c/", false);
        assert_eq!(p.components(), &["a", "b", "c"]);
    }

    #[test]
    fn pop_front_on_root_single_component_errors() {
        let mut p = DarPath::parse("/a", false);
        assert!(p.pop_front().is_err());
    }

    #[test]
    fn pop_front_on_relative_empty_is_none() {
        let mut p = DarPath::relative();
        assert_eq!(p.pop_front().unwrap(), None);
    }

    #[test]
    fn subdir_test() {
        let parent = DarPath::parse("/a/b", false);
        let child = DarPath::parse("/a/b/c", false);
        assert!(child.is_subdir_of(&parent));
        assert!(!parent.is_subdir_of(&child));
    }

    #[test]
    fn undisclosed_string_never_splits() {
        let p = DarPath::parse("not/a/path but/data", true);
        assert_eq!(p.components(), &["not/a/path but/data"]);
    }
}
