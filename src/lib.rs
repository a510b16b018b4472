//! bundle-sync
//!
//! Synchronizes localized text stored as `.properties` resource bundles
//! (one file per base name and language) with a flat tabular store edited
//! by translators. Export merges all bundle files into the grid; import
//! reads the grid back and reconciles the on-disk files, with a
//! configurable policy for keys missing from the grid.

pub mod bundle;
pub mod cli;
pub mod matcher;
pub mod properties;
pub mod report;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod types;

pub use report::{
    NullReporter,
    SyncReporter,
    TracingReporter,
};
pub use sync::{
    MissingKeyAction,
    SyncEngine,
    SyncError,
};
pub use types::{
    BundleKey,
    Charset,
    Language,
    Translation,
};
