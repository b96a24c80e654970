// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//!
//! Build driver for the dar workspace.
//!
use clap::Parser;
use duct::cmd;
use std::env;

#[derive(Parser)]
#[command(
    name = "dar-xtask",
    author = "Oxide Computer Company",
    version = "0.1.0",
    about = "xtask build tool for the dar archive engine"
)]
struct Xtask {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
enum Command {
    /// Builds the workspace
    Build {
        #[clap(flatten)]
        profile: BuildProfile,
        #[clap(flatten)]
        locked: Locked,
    },
    /// cargo clean
    Clean,
    /// Run cargo clippy linter
    Clippy {
        #[clap(flatten)]
        locked: Locked,
    },
    /// Run the workspace test suite
    Test {
        #[clap(flatten)]
        profile: BuildProfile,
        #[clap(flatten)]
        locked: Locked,
    },
}

/// Mutually exclusive debug/release flags, used by all commands
/// that run builds.
#[derive(Clone, Parser)]
struct BuildProfile {
    /// Build debug version (default)
    #[clap(long, conflicts_with_all = &["release"])]
    debug: bool,

    /// Build optimized version
    #[clap(long)]
    release: bool,
}

impl BuildProfile {
    fn to_str(&self) -> &'static str {
        self.release.then_some("--release").unwrap_or("")
    }
}

/// Cargo `--locked` setting; separate from BuildProfile because
/// `clippy` uses it but doesn't care about debug/release.
#[derive(Parser)]
struct Locked {
    /// Build locked to Cargo.lock
    #[clap(long)]
    locked: bool,
}

impl Locked {
    fn to_str(&self) -> &str {
        self.locked.then_some("--locked").unwrap_or("")
    }
}

fn main() {
    let xtask = Xtask::parse();
    match xtask.cmd {
        Command::Build { profile, locked } => build(profile, locked),
        Command::Test { profile, locked } => test(profile, locked),
        Command::Clippy { locked } => clippy(locked),
        Command::Clean => clean(),
    }
}

/// Runs a workspace build.
fn build(profile: BuildProfile, locked: Locked) {
    let args = format!("build --workspace {} {}", profile.to_str(), locked.to_str());
    cmd(cargo(), args.split_whitespace()).run().expect("build successful");
}

/// Runs the workspace test suite.
fn test(profile: BuildProfile, locked: Locked) {
    let args = format!("test --workspace {} {}", profile.to_str(), locked.to_str());
    cmd(cargo(), args.split_whitespace()).run().expect("test successful");
}

/// Runs the Clippy linter over the workspace.
fn clippy(locked: Locked) {
    let args = format!("clippy --workspace {}", locked.to_str());
    cmd(cargo(), args.split_whitespace()).run().expect("clippy successful");
}

/// Runs clean on the project.
fn clean() {
    cmd(cargo(), ["clean"]).run().expect("clean successful");
}

/// Returns the value of the given environment variable,
/// or the default if unspecified.
fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or(default.into())
}

/// Returns the name of the cargo binary.
fn cargo() -> String {
    env_or("CARGO", "cargo")
}
