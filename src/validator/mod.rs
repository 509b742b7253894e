//! Static interface checks for invoker scripts.
//!
//! Scripts are never executed. The source is tokenized, a structural model
//! (functions, decorators, imports, calls) is rebuilt from the tokens, and
//! a fixed rule set runs over that model.

mod lexer;
mod metadata;
mod model;
mod rules;

use std::fmt;

use serde::Serialize;

pub use metadata::{ParameterSpec, ScriptMetadata};

/// 1-based position in the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationReport {
    fn from_findings(mut findings: rules::Findings) -> Self {
        findings.errors.sort_by_key(|d| d.location);
        findings.warnings.sort_by_key(|d| d.location);
        ValidationReport {
            is_valid: findings.errors.is_empty(),
            errors: findings.errors,
            warnings: findings.warnings,
        }
    }
}

pub struct InterfaceValidator;

impl InterfaceValidator {
    pub fn validate(text: &str) -> ValidationReport {
        Self::validate_with_metadata(text, None)
    }

    pub fn validate_with_metadata(text: &str, metadata: Option<&ScriptMetadata>) -> ValidationReport {
        let mut findings = rules::Findings::default();
        match lexer::tokenize(text) {
            Ok(lines) => {
                let model = model::ScriptModel::build(&lines);
                rules::check(&model, metadata, &mut findings);
            }
            Err(diagnostic) => findings.errors.push(diagnostic),
        }
        let report = ValidationReport::from_findings(findings);
        log::debug!(
            "validated script: {} error(s), {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        );
        report
    }

    /// Validate a script together with its optional `metadata.json` text.
    pub fn validate_package(script: &str, metadata_json: Option<&str>) -> ValidationReport {
        let metadata = match metadata_json.map(ScriptMetadata::parse).transpose() {
            Ok(metadata) => metadata,
            Err(e) => {
                let mut report = Self::validate(script);
                report.errors.insert(
                    0,
                    Diagnostic {
                        location: Location { line: 1, column: 1 },
                        message: format!("{:#}", e),
                    },
                );
                report.is_valid = false;
                return report;
            }
        };
        Self::validate_with_metadata(script, metadata.as_ref())
    }
}
