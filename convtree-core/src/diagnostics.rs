use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    DuplicateId { uuid: String },
    CycleDetected { uuid: String },
    RootMissing { count: usize },
    OrphansRecovered { count: usize },
    UnreachableSkipped { count: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { uuid } => {
                write!(f, "duplicate message id {uuid}; keeping the last occurrence")
            }
            Self::CycleDetected { uuid } => {
                write!(f, "cycle detected at message {uuid}; stopped descending")
            }
            Self::RootMissing { count } => {
                write!(f, "no root message; kept {count} messages in input order")
            }
            Self::OrphansRecovered { count } => {
                write!(f, "recovered {count} messages with broken parent links")
            }
            Self::UnreachableSkipped { count } => {
                write!(f, "{count} messages are not reachable from any root")
            }
        }
    }
}

pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&mut self, _diagnostic: Diagnostic) {}
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}
