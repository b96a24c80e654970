// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `manager` subcommand group: a thin CLI shell over
//! [`dar_core::database::Manager`], reading and re-dumping one database
//! file per invocation (no long-lived daemon, matching the one-shot
//! shape of every other subcommand).

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use dar_core::database::Manager;
use dar_core::date::Date;

use crate::walk::build_catalogue;

#[derive(Args)]
pub struct ManagerArgs {
    #[clap(subcommand)]
    action: ManagerAction,
}

#[derive(Subcommand)]
enum ManagerAction {
    /// Creates an empty database file.
    Init {
        #[clap(long)]
        db: PathBuf,
        /// Path to the `dar` executable recorded for future restores.
        #[clap(long, default_value = "dar")]
        dar_executable: String,
    },
    /// Folds a filesystem subtree's catalogue in as the next archive.
    Add {
        #[clap(long)]
        db: PathBuf,
        /// Directory the archive was (or will be) taken from.
        #[clap(long)]
        root: PathBuf,
        /// Path recorded for where this archive's slices live.
        #[clap(long)]
        archive_path: String,
        #[clap(long)]
        basename: String,
    },
    /// Removes every archive numbered in `[min, max]`.
    Remove {
        #[clap(long)]
        db: PathBuf,
        #[clap(long)]
        min: u32,
        #[clap(long)]
        max: u32,
    },
    /// Moves archive `src` to position `dst`, renumbering in between.
    Permute {
        #[clap(long)]
        db: PathBuf,
        #[clap(long)]
        src: u32,
        #[clap(long)]
        dst: u32,
    },
    /// Lists every path recorded in one archive.
    GetFiles {
        #[clap(long)]
        db: PathBuf,
        #[clap(long)]
        archive: u32,
    },
    /// Lists every archive a path appears in, newest first.
    GetVersion {
        #[clap(long)]
        db: PathBuf,
        #[clap(long)]
        path: String,
    },
    /// Prints which archives to restore from to recover the given paths
    /// as of `--date` (unix seconds).
    RestorePlan {
        #[clap(long)]
        db: PathBuf,
        #[clap(long = "path")]
        paths: Vec<String>,
        #[clap(long)]
        date: i64,
    },
    /// Reports any archive whose root mtime is out of numeric order.
    CheckOrder {
        #[clap(long)]
        db: PathBuf,
    },
}

fn load_manager(db: &Path) -> Result<Manager> {
    let bytes = std::fs::read(db).with_context(|| format!("reading database {}", db.display()))?;
    let database = dar_core::database::Database::load(&bytes, false).context("parsing database")?;
    Ok(Manager { database })
}

fn save_manager(db: &Path, manager: &Manager) -> Result<()> {
    let bytes = manager.database.dump().context("serializing database")?;
    std::fs::write(db, bytes).with_context(|| format!("writing database {}", db.display()))
}

pub fn run(args: ManagerArgs) -> Result<()> {
    match args.action {
        ManagerAction::Init { db, dar_executable } => {
            let manager = Manager::new(dar_executable);
            save_manager(&db, &manager)?;
        }
        ManagerAction::Add { db, root, archive_path, basename } => {
            let mut manager = load_manager(&db)?;
            let catalogue = build_catalogue(&root).context("walking filesystem")?;
            let root_mtime = std::fs::metadata(&root)
                .map(|m| Date::from_unix_seconds(m.mtime()))
                .unwrap_or(Date::EPOCH);
            manager.add_archive(archive_path, basename, &catalogue, root_mtime).context("adding archive")?;
            save_manager(&db, &manager)?;
        }
        ManagerAction::Remove { db, min, max } => {
            let mut manager = load_manager(&db)?;
            manager.remove_archive(min, max).context("removing archive range")?;
            save_manager(&db, &manager)?;
        }
        ManagerAction::Permute { db, src, dst } => {
            let mut manager = load_manager(&db)?;
            manager.set_permutation(src, dst).context("permuting archives")?;
            save_manager(&db, &manager)?;
        }
        ManagerAction::GetFiles { db, archive } => {
            let manager = load_manager(&db)?;
            for path in manager.get_files(archive).context("listing archive files")? {
                println!("{path}");
            }
        }
        ManagerAction::GetVersion { db, path } => {
            let manager = load_manager(&db)?;
            for (archive, state, date) in manager.get_version(&path).context("listing path versions")? {
                println!("{archive}\t{state:?}\t{}", date.unix_seconds());
            }
        }
        ManagerAction::RestorePlan { db, paths, date } => {
            let manager = load_manager(&db)?;
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            for step in manager.restore_plan(&refs, Date::from_unix_seconds(date)).context("planning restore")? {
                println!("{step:?}");
            }
        }
        ManagerAction::CheckOrder { db } => {
            let manager = load_manager(&db)?;
            for problem in manager.check_order().context("checking archive order")? {
                println!("{problem}");
            }
        }
    }
    Ok(())
}
