use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs; drives retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Role, membership and policy changes, approval decisions. Never trimmed.
    Critical,
    #[default]
    Important,
    /// Draft edits and context switches. Aggressively trimmed.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can be published on the event bus.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. "time_entry" in "time_entry.submitted"
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "revoked" | "removed" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
