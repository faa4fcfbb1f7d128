use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of the evaluation task of one complete graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TaskOutcome {
    Scored { value: f64 },
    Errored { reason: String },
    Rejected { reason: String },
}

impl TaskOutcome {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored { value } => Some(*value),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scored { .. } => "scored",
            Self::Errored { .. } => "errored",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scored { value } => write!(f, "scored ({value:.4})"),
            Self::Errored { reason } => write!(f, "errored ({reason})"),
            Self::Rejected { reason } => write!(f, "rejected ({reason})"),
        }
    }
}
