//! Error taxonomy shared by every engine component.
//!
//! Components return `anyhow::Result` and attach context freely; callers that
//! need to branch on the failure class recover the typed error with
//! [`PkgError::find`] (a `downcast_ref` over the error chain).

use std::fmt;

use thiserror::Error;

use crate::validator::ValidationReport;

/// Failure classes the engine reports to its callers.
#[derive(Debug, Error)]
pub enum PkgError {
    /// Local state is malformed or a configuration value is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// No network and no usable cache for a source.
    #[error("source '{source_name}' is unreachable: {reason}")]
    SourceUnreachable { source_name: String, reason: String },

    /// A fetched manifest violates the registry schema.
    #[error("manifest from source '{source_name}' is corrupt: {reason}")]
    ManifestCorrupt { source_name: String, reason: String },

    /// A named package, source or record does not exist.
    #[error("{what} '{name}' not found")]
    NotFound { what: &'static str, name: String },

    /// The interface validator rejected a script.
    #[error("validation failed for '{package}': {} error(s)", .report.errors.len())]
    ValidationFailed {
        package: String,
        report: ValidationReport,
    },

    #[error("source '{0}' already exists")]
    DuplicateSource(String),

    /// Disk failure. The operation is abandoned; persisted state stays at
    /// its last atomically written version.
    #[error("I/O failure: {0}")]
    Io(String),
}

/// Stable, machine-readable tag for each [`PkgError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    SourceUnreachable,
    ManifestCorrupt,
    NotFound,
    ValidationFailed,
    DuplicateSource,
    Io,
    /// Anything that is not a [`PkgError`].
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::SourceUnreachable => "SourceUnreachableError",
            ErrorKind::ManifestCorrupt => "ManifestCorruptError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::ValidationFailed => "ValidationFailedError",
            ErrorKind::DuplicateSource => "DuplicateSourceError",
            ErrorKind::Io => "IOError",
            ErrorKind::Other => "Error",
        };
        f.write_str(name)
    }
}

impl PkgError {
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        PkgError::NotFound {
            what,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PkgError::Config(_) => ErrorKind::Config,
            PkgError::SourceUnreachable { .. } => ErrorKind::SourceUnreachable,
            PkgError::ManifestCorrupt { .. } => ErrorKind::ManifestCorrupt,
            PkgError::NotFound { .. } => ErrorKind::NotFound,
            PkgError::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            PkgError::DuplicateSource(_) => ErrorKind::DuplicateSource,
            PkgError::Io(_) => ErrorKind::Io,
        }
    }

    /// Find the first `PkgError` in an anyhow error chain.
    pub fn find(err: &anyhow::Error) -> Option<&PkgError> {
        err.chain().find_map(|cause| cause.downcast_ref::<PkgError>())
    }

    /// Classify an arbitrary error. Plain I/O failures map to [`ErrorKind::Io`].
    pub fn kind_of(err: &anyhow::Error) -> ErrorKind {
        if let Some(pkg) = Self::find(err) {
            return pkg.kind();
        }
        if err
            .chain()
            .any(|cause| cause.downcast_ref::<std::io::Error>().is_some())
        {
            return ErrorKind::Io;
        }
        ErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_kind_survives_context() {
        let err = Err::<(), _>(PkgError::not_found("package", "p"))
            .context("installing p")
            .unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_io_errors_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = anyhow::Error::from(io).context("writing manifest");
        assert_eq!(PkgError::kind_of(&err), ErrorKind::Io);
    }

    #[test]
    fn test_other_errors() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(PkgError::kind_of(&err), ErrorKind::Other);
        assert!(PkgError::find(&err).is_none());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            PkgError::DuplicateSource("main".into()).to_string(),
            "source 'main' already exists"
        );
        assert_eq!(
            PkgError::not_found("package", "whois").to_string(),
            "package 'whois' not found"
        );
        assert_eq!(ErrorKind::NotFound.to_string(), "NotFoundError");
    }
}
