//! Package management module
//!
//! This module provides the package catalog (descriptors merged into an
//! index), version handling, and the per-environment record of what is
//! installed.

mod descriptor;
mod environment;
mod index;
mod installed;
mod version;

#[cfg(test)]
pub(crate) use descriptor::descriptor;
pub use descriptor::{METADATA_FILE, PackageDescriptor, SCRIPT_FILE, install_file_name};
pub use environment::Environment;
pub use index::{
    IndexStats, PackageIndex, RefreshReport, SearchQuery, SourceOutcome, SourceReport,
    UNCATEGORIZED,
};
#[cfg(test)]
pub(crate) use installed::record;
pub use installed::{InstalledManifest, InstalledRecord};
pub use version::{is_newer, parse_version};
