// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line front-end for the dar archive engine.

mod fs_restore;
mod manager_cli;
mod term_ui;
mod walk;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use dar_core::archive::{self, ComparisonFields, CreateOptions, ListFormat, RestoreOptions, TestOptions};
use dar_core::cancel::CancelToken;
use dar_core::compress::CompressionAlgo;
use dar_core::crypto::NoCipher;
use dar_core::policy::{Action, Policy};
use dar_core::slice::sar::{OpenPolicy, SarReader, SarWriter, SliceLayout};

use fs_restore::FsRestoreTarget;
use term_ui::TermUi;
use walk::{build_catalogue, FsSource};

#[derive(Parser)]
#[command(name = "dar", version = "0.1.0", about = "Create, list, test, and restore sliced archives")]
struct Cli {
    #[clap(subcommand)]
    cmd: Command,

    /// Run without any interactive prompts; collisions that would ask
    /// are treated as "keep what's in place".
    #[clap(long, global = true)]
    batch: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build a new archive from a filesystem subtree.
    Create {
        /// Directory to archive.
        #[clap(long)]
        root: PathBuf,
        #[clap(flatten)]
        target: ArchiveTarget,
        #[clap(long, value_enum, default_value = "none")]
        compression: CompressionKind,
    },
    /// Print an archive's catalogue.
    List {
        #[clap(flatten)]
        target: ArchiveTarget,
        #[clap(long, value_enum, default_value = "tree")]
        format: ListFormatKind,
    },
    /// Decrypt, decompress, and CRC-verify every file in an archive.
    Test {
        #[clap(flatten)]
        target: ArchiveTarget,
        /// Keep going past the first corruption found.
        #[clap(long)]
        lax: bool,
    },
    /// Compare an archive's catalogue against a live filesystem subtree.
    Diff {
        #[clap(flatten)]
        target: ArchiveTarget,
        /// Filesystem subtree to compare the archive against.
        #[clap(long)]
        against: PathBuf,
        #[clap(long, value_enum, default_value = "all")]
        fields: ComparisonFieldsKind,
    },
    /// Restore an archive's contents onto the live filesystem.
    Restore {
        #[clap(flatten)]
        target: ArchiveTarget,
        /// Directory to restore into.
        #[clap(long)]
        to: PathBuf,
        /// Don't delete anything the archive records as removed.
        #[clap(long)]
        ignore_deleted: bool,
    },
    /// Write a data-free copy of an archive's catalogue, for use as a
    /// future incremental backup's reference.
    Isolate {
        #[clap(flatten)]
        target: ArchiveTarget,
        /// Basename of the isolated archive to write.
        #[clap(long)]
        output: String,
        /// Directory the isolated archive's slices are written into.
        #[clap(long)]
        output_dir: PathBuf,
    },
    /// Maintains a cross-archive version database.
    Manager(manager_cli::ManagerArgs),
}

/// The slice location flags shared by every subcommand that opens an
/// existing archive.
#[derive(Clone, Parser)]
struct ArchiveTarget {
    /// Archive basename (without the slice number or extension).
    #[clap(long)]
    archive: String,
    /// Directory the archive's slices live in.
    #[clap(long, default_value = ".")]
    dir: PathBuf,
    #[clap(long, default_value = "dar")]
    extension: String,
}

impl ArchiveTarget {
    fn layout(&self) -> SliceLayout {
        SliceLayout {
            dir: self.dir.clone(),
            basename: self.archive.clone(),
            extension: self.extension.clone(),
            first_size: 0,
            rest_size: 0,
            min_digits: 3,
            pause_every_n: None,
            hook: None,
            hash_algo: None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionKind {
    None,
    Gzip,
    Zstd,
}

impl From<CompressionKind> for CompressionAlgo {
    fn from(k: CompressionKind) -> CompressionAlgo {
        match k {
            CompressionKind::None => CompressionAlgo::None,
            CompressionKind::Gzip => CompressionAlgo::Gzip,
            CompressionKind::Zstd => CompressionAlgo::Zstd,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormatKind {
    Tar,
    Tree,
    Xml,
    Slicing,
}

impl From<ListFormatKind> for ListFormat {
    fn from(k: ListFormatKind) -> ListFormat {
        match k {
            ListFormatKind::Tar => ListFormat::Tar,
            ListFormatKind::Tree => ListFormat::Tree,
            ListFormatKind::Xml => ListFormat::Xml,
            ListFormatKind::Slicing => ListFormat::SlicingLocation,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ComparisonFieldsKind {
    All,
    IgnoreOwner,
    Mtime,
    InodeType,
}

impl From<ComparisonFieldsKind> for ComparisonFields {
    fn from(k: ComparisonFieldsKind) -> ComparisonFields {
        match k {
            ComparisonFieldsKind::All => ComparisonFields::All,
            ComparisonFieldsKind::IgnoreOwner => ComparisonFields::IgnoreOwner,
            ComparisonFieldsKind::Mtime => ComparisonFields::Mtime,
            ComparisonFieldsKind::InodeType => ComparisonFields::InodeType,
        }
    }
}

fn command_line_echo() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

/// `--batch` answers every collision with "keep what's in place";
/// interactive mode escalates through the terminal instead.
fn restore_policy(batch: bool) -> Policy {
    if batch {
        Policy::constant(Action::Preserve, Action::Preserve)
    } else {
        Policy::constant(Action::Ask, Action::Ask)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let ui = TermUi;
    let cancel = CancelToken::new();

    match cli.cmd {
        Command::Create { root, target, compression } => {
            let mut catalogue = build_catalogue(&root).context("walking filesystem")?;
            let source = FsSource::new(&root);
            let opts = CreateOptions { compression: compression.into(), ..CreateOptions::default() };
            let mut writer = SarWriter::create(target.layout(), OpenPolicy::Refuse, &ui).context("opening archive for writing")?;
            let summary = archive::create(&mut catalogue.root, &source, &NoCipher, &opts, &command_line_echo(), &cancel, &mut writer)
                .context("writing archive")?;
            writer.finish().context("finalizing archive")?;
            println!("{summary}");
        }
        Command::List { target, format } => {
            let mut reader = SarReader::open(target.layout(), &ui, false).context("opening archive for reading")?;
            let rendered = archive::list(&mut reader, &NoCipher, format.into(), &cancel).context("listing archive")?;
            print!("{rendered}");
        }
        Command::Test { target, lax } => {
            let mut reader = SarReader::open(target.layout(), &ui, lax).context("opening archive for reading")?;
            let opts = TestOptions { lax };
            let (summary, corruptions) = archive::test(&mut reader, &NoCipher, &opts, &cancel).context("testing archive")?;
            println!("{summary}");
            for c in &corruptions {
                println!("corruption at {}: {}", c.path, c.message);
            }
        }
        Command::Diff { target, against, fields } => {
            let mut reader = SarReader::open(target.layout(), &ui, false).context("opening archive for reading")?;
            let mut sink = dar_core::archive::format::NullSink;
            let (reference, _) = dar_core::archive::format::read_body(&mut reader, &mut sink, &NoCipher, &cancel).context("reading archive catalogue")?;
            let live = build_catalogue(&against).context("walking comparison filesystem")?;
            for record in archive::diff(&reference, &live.root, fields.into()) {
                println!("{:?} {}", record.kind, record.path);
            }
        }
        Command::Restore { target, to, ignore_deleted } => {
            let mut reader = SarReader::open(target.layout(), &ui, false).context("opening archive for reading")?;
            let mut fs_target = FsRestoreTarget::new(&to);
            let policy = restore_policy(cli.batch);
            let opts = RestoreOptions { ignore_deleted };
            let (summary, errors) =
                archive::restore(&mut reader, &NoCipher, &mut fs_target, &policy, &ui, opts, &cancel).context("restoring archive")?;
            println!("{summary}");
            for err in &errors {
                eprintln!("{err}");
            }
        }
        Command::Isolate { target, output, output_dir } => {
            let mut reader = SarReader::open(target.layout(), &ui, false).context("opening archive for reading")?;
            let output_layout = SliceLayout { dir: output_dir, basename: output, ..target.layout() };
            let mut writer = SarWriter::create(output_layout, OpenPolicy::Refuse, &ui).context("opening isolated archive for writing")?;
            let summary = archive::isolate(&mut reader, &NoCipher, &mut writer, &NoCipher, &command_line_echo(), &cancel)
                .context("isolating archive")?;
            writer.finish().context("finalizing isolated archive")?;
            println!("{summary}");
        }
        Command::Manager(args) => manager_cli::run(args)?,
    }

    Ok(())
}
