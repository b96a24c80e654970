// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cross-archive database (§4.8, "dar_manager"): a persistent index
//! tracking, per path, which archives hold the most recent data and EA.

pub mod io;
pub mod manager;
pub mod node;
pub mod planner;

pub use io::{ArchiveRecord, Database, TreeRepr};
pub use manager::Manager;
pub use node::{ArchiveNumber, Lookup, Node, Record, VersionState};
pub use planner::{plan_restore, PlanStep};
