// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dates with sub-second precision, and the "loose difference" compare
//! used across archives written with different clock resolutions.

use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The unit a [`Date`]'s fractional part is expressed in.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum SubSecondUnit {
    Second,
    Microsecond,
    Nanosecond,
}

impl SubSecondUnit {
    fn scale(self) -> u64 {
        match self {
            SubSecondUnit::Second => 1,
            SubSecondUnit::Microsecond => 1_000_000,
            SubSecondUnit::Nanosecond => 1_000_000_000,
        }
    }
}

/// A point in time: whole seconds since the epoch plus a fraction
/// expressed in one of `{second, microsecond, nanosecond}`.
#[derive(Clone, Copy, Eq, Debug)]
pub struct Date {
    seconds: i64,
    subsec: u32,
    unit: SubSecondUnit,
}

impl Date {
    pub const EPOCH: Date = Date { seconds: 0, subsec: 0, unit: SubSecondUnit::Second };

    pub fn new(seconds: i64, subsec: u32, unit: SubSecondUnit) -> Date {
        debug_assert!((subsec as u64) < unit.scale());
        Date { seconds, subsec, unit }
    }

    pub fn from_unix_seconds(seconds: i64) -> Date {
        Date::new(seconds, 0, SubSecondUnit::Second)
    }

    pub fn now() -> Date {
        let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Date::new(d.as_secs() as i64, d.subsec_nanos(), SubSecondUnit::Nanosecond)
    }

    pub fn unix_seconds(&self) -> i64 {
        self.seconds
    }

    /// Nanosecond-normalized fractional part, used internally for
    /// exact comparisons between dates recorded at different precisions.
    fn subsec_nanos(&self) -> u64 {
        self.subsec as u64 * (1_000_000_000 / self.unit.scale())
    }

    /// Exact difference in whole seconds, ignoring sub-second
    /// components (mirrors the common case of comparing mtimes).
    pub fn diff_seconds(&self, other: &Date) -> i64 {
        self.seconds - other.seconds
    }

    /// Compares at the coarser of the two operands' sub-second units,
    /// so that a date recorded to nanosecond precision and one recorded
    /// only to the second do not spuriously disagree.
    pub fn loose_cmp(&self, other: &Date) -> Ordering {
        let coarsest = self.unit.min(other.unit);
        let a = self.seconds as i128 * 1_000_000_000
            + (self.subsec_nanos() / (1_000_000_000 / coarsest.scale())) as i128
                * (1_000_000_000 / coarsest.scale()) as i128;
        let b = other.seconds as i128 * 1_000_000_000
            + (other.subsec_nanos() / (1_000_000_000 / coarsest.scale())) as i128
                * (1_000_000_000 / coarsest.scale()) as i128;
        a.cmp(&b)
    }

    /// Returns a date `seconds` further in the future (or past, if
    /// negative), preserving the unit of `self`.
    pub fn plus_seconds(&self, seconds: i64) -> Date {
        Date::new(self.seconds + seconds, self.subsec, self.unit)
    }

    pub fn unit(&self) -> SubSecondUnit {
        self.unit
    }
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        self.seconds == other.seconds && self.subsec_nanos() == other.subsec_nanos()
    }
}

impl Ord for Date {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then_with(|| self.subsec_nanos().cmp(&other.subsec_nanos()))
    }
}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_not_mistaken_for_unset() {
        // B3: a file whose mtime is 1970-01-01T00:00:00Z must not be
        // mistaken for "unknown".
        let d = Date::from_unix_seconds(0);
        assert_eq!(d, Date::EPOCH);
        assert_eq!(d.unix_seconds(), 0);
    }

    #[test]
    fn loose_diff_ignores_finer_precision() {
        let coarse = Date::new(100, 0, SubSecondUnit::Second);
        let fine = Date::new(100, 500_000, SubSecondUnit::Microsecond);
        assert_eq!(coarse.loose_cmp(&fine), Ordering::Equal);
    }

    #[test]
    fn ordering_by_seconds() {
        let a = Date::from_unix_seconds(100);
        let b = Date::from_unix_seconds(200);
        assert!(a < b);
        assert_eq!(a.diff_seconds(&b), -100);
    }
}
