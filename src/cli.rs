//! Command line wrapper around the sync engine.

use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};

use crate::report::TracingReporter;
use crate::sync::{
    MissingKeyAction,
    SyncEngine,
    SyncError,
};
use crate::types::Charset;

/// Exit code for a completed sync, warnings included.
pub const EXIT_OK: i32 = 0;
/// Exit code for a runtime failure (unreadable store, failed files).
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a configuration error; nothing was attempted.
pub const EXIT_CONFIG: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "bundle-sync", version, about = "Synchronize .properties resource bundles with a tabular translation store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect bundle files under the root and merge them into the store.
    Export {
        /// Root directory of the bundle tree.
        #[arg(long)]
        root: PathBuf,

        /// Path of the tabular store (.csv or .json).
        #[arg(long)]
        store: PathBuf,

        /// Include glob pattern, repeatable.
        #[arg(long = "include", default_value = crate::matcher::DEFAULT_INCLUDE)]
        includes: Vec<String>,

        /// Exclude glob pattern, repeatable.
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        /// Property file encoding.
        #[arg(long, default_value = "utf-8")]
        charset: Charset,
    },

    /// Read the store back and reconcile the bundle files under the root.
    Import {
        /// Root directory of the bundle tree.
        #[arg(long)]
        root: PathBuf,

        /// Path of the tabular store (.csv or .json).
        #[arg(long)]
        store: PathBuf,

        /// What to do with on-disk keys that are absent from the store.
        #[arg(long, value_enum, default_value_t)]
        missing_key_action: MissingKeyAction,

        /// Property file encoding.
        #[arg(long, default_value = "utf-8")]
        charset: Charset,
    },
}

/// Runs one command and maps the outcome to an exit code.
#[must_use]
pub fn run(cli: Cli) -> i32 {
    let engine = SyncEngine::new(TracingReporter);

    match cli.command {
        Command::Export { root, store, includes, excludes, charset } => {
            match engine.export(&root, &includes, &excludes, charset, &store) {
                Ok(summary) => {
                    tracing::info!(
                        bundles = summary.bundles,
                        keys = summary.keys,
                        cells = summary.cells,
                        languages = summary.languages,
                        "Export complete"
                    );
                    EXIT_OK
                },
                Err(error) => report_failure(&error),
            }
        },
        Command::Import { root, store, missing_key_action, charset } => {
            match engine.import(&root, &store, charset, missing_key_action) {
                Ok(summary) if summary.failed_files.is_empty() => {
                    tracing::info!(
                        written = summary.files_written,
                        unchanged = summary.files_unchanged,
                        keys = summary.keys_applied,
                        "Import complete"
                    );
                    EXIT_OK
                },
                Ok(summary) => {
                    tracing::error!(
                        written = summary.files_written,
                        failed = summary.failed_files.len(),
                        "Import completed with failures"
                    );
                    EXIT_FAILURE
                },
                Err(error) => report_failure(&error),
            }
        },
    }
}

fn report_failure(error: &SyncError) -> i32 {
    tracing::error!("{error}");
    if error.is_configuration() { EXIT_CONFIG } else { EXIT_FAILURE }
}
