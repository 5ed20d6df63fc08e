//! Diagnostics collected over one reconciliation cycle.

use crate::reconciler::fleet_error::FleetError;
use crds::DiagnosticRecord;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("Warning"),
            Severity::Error => f.write_str("Error"),
        }
    }
}

/// One diagnostic: which step said what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub step: String,
    pub message: String,
}

/// Ordered diagnostics of a cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, step: &str, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            step: step.to_string(),
            message: message.into(),
        });
    }

    /// Record `error` under the step that raised it
    pub fn error(&mut self, error: &FleetError) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            step: error.step().to_string(),
            message: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Steps that reported, in order
    pub fn steps(&self) -> Vec<&str> {
        self.items.iter().map(|d| d.step.as_str()).collect()
    }

    /// Status representation
    pub fn to_records(&self) -> Vec<DiagnosticRecord> {
        self.items
            .iter()
            .map(|d| DiagnosticRecord {
                severity: d.severity.to_string(),
                step: d.step.clone(),
                message: d.message.clone(),
            })
            .collect()
    }
}
