//! Application layer - use cases that coordinate the engine components.
//!
//! Commands build one of these actions from a runtime, the source list and
//! a package index, run it, and render the result.

mod batch;
mod install;
mod list;
mod refresh;
mod remove;
mod update;

pub use batch::{BatchOutcome, ItemResult, Summary};
pub use install::{InstallOptions, InstallOutcome, InstallReport, Installer};
pub use list::ListAction;
pub use refresh::{LoadedIndex, RefreshAction};
pub use remove::RemoveAction;
pub use update::{UpdateOutcome, UpdateTarget, Updater, UpgradeCandidate, UpgradeReport};
