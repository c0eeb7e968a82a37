// Error types for providers and the resolution pipeline

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::traits::ProviderKind;

/// Failure of a single upstream call
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The call did not finish within its per-call timeout
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Connection, TLS or body transfer failed
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Upstream throttled or bot-checked the request
    #[error("blocked by upstream: {0}")]
    Blocked(String),

    /// Body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Extraction binary failed to run or exited non-zero
    #[error("execution error: {0}")]
    Execution(String),

    /// Upstream was reachable but reports the item as gone/private
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Provider kind does not implement this lookup
    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),

    /// Pool entry is not a usable address
    #[error("invalid provider address: {0}")]
    InvalidAddress(String),
}

impl ProviderError {
    /// Soft failures are answers from a reachable provider that carry no
    /// usable data; everything else is a hard (network-level) failure.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Unsupported(_) | Self::Unavailable(_))
    }

    /// Classify extraction-tool stderr into an error kind; `budget` is the
    /// timeout the tool ran under
    pub fn from_stderr(stderr: &str, budget: Duration) -> Self {
        let lower = stderr.to_lowercase();

        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout(budget.as_millis() as u64);
        }

        if lower.contains("429")
            || lower.contains("not a bot")
            || lower.contains("too many requests")
        {
            return Self::Blocked(first_line(stderr));
        }

        if lower.contains("video unavailable")
            || lower.contains("private video")
            || lower.contains("has been removed")
            || lower.contains("does not exist")
        {
            return Self::Unavailable(first_line(stderr));
        }

        if lower.contains("no such file") || lower.contains("not found") {
            return Self::InvalidAddress(first_line(stderr));
        }

        Self::Execution(first_line(stderr))
    }
}

fn first_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}

/// Result of one candidate attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// Reachable, but the response lacked required data
    SoftFailure(String),
    /// Timeout, connection or protocol error
    NetworkFailure(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One entry of the per-request attempt log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub provider: String,
    pub kind: ProviderKind,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Success => write!(f, "{} ({}): ok", self.provider, self.kind),
            AttemptOutcome::SoftFailure(reason) => {
                write!(f, "{} ({}): incomplete response, {}", self.provider, self.kind, reason)
            }
            AttemptOutcome::NetworkFailure(reason) => {
                write!(f, "{} ({}): {}", self.provider, self.kind, reason)
            }
        }
    }
}

/// Errors surfaced by the resolution pipeline
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Malformed input; no provider was contacted
    #[error("invalid input: {0}")]
    Validation(String),

    /// Pool empty even after one refresh
    #[error("no providers available")]
    PoolUnavailable(Option<String>),

    /// Overall budget ran out before a candidate succeeded
    #[error("resolution timed out after {deadline_ms} ms")]
    DeadlineExceeded {
        deadline_ms: u64,
        attempts: Vec<AttemptRecord>,
    },

    /// Every candidate was tried and failed
    #[error("no provider could resolve this request")]
    Exhausted { attempts: Vec<AttemptRecord> },
}

impl ResolveError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Candidates tried before the error was raised
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::DeadlineExceeded { attempts, .. } | Self::Exhausted { attempts } => attempts,
            _ => &[],
        }
    }

    /// Machine-oriented diagnostics for the `details` field of error bodies
    pub fn details(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::PoolUnavailable(Some(cause)) => {
                format!("provider list could not be loaded: {}", cause)
            }
            Self::PoolUnavailable(None) => "provider list is empty".to_string(),
            Self::DeadlineExceeded { attempts, .. } | Self::Exhausted { attempts } => {
                if attempts.is_empty() {
                    return "no candidate was attempted".to_string();
                }
                attempts
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_millis(3000);

    #[test]
    fn test_stderr_classification() {
        assert!(matches!(
            ProviderError::from_stderr("ERROR: [youtube] abc: Sign in to confirm you're not a bot", BUDGET),
            ProviderError::Blocked(_)
        ));
        assert!(matches!(
            ProviderError::from_stderr("ERROR: [youtube] abc: Video unavailable", BUDGET),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from_stderr("ERROR: Read timed out.", BUDGET),
            ProviderError::Timeout(3000)
        ));
        assert!(matches!(
            ProviderError::from_stderr("something odd", BUDGET),
            ProviderError::Execution(_)
        ));
    }

    #[test]
    fn test_soft_vs_hard() {
        assert!(ProviderError::Unsupported("search").is_soft());
        assert!(ProviderError::Unavailable("gone".into()).is_soft());
        assert!(!ProviderError::Status(502).is_soft());
        assert!(!ProviderError::Timeout(3000).is_soft());
    }

    #[test]
    fn test_details_lists_every_attempt() {
        let err = ResolveError::Exhausted {
            attempts: vec![
                AttemptRecord {
                    provider: "https://a.example".into(),
                    kind: ProviderKind::Invidious,
                    outcome: AttemptOutcome::NetworkFailure("timed out after 3000 ms".into()),
                    elapsed_ms: 3000,
                },
                AttemptRecord {
                    provider: "https://b.example".into(),
                    kind: ProviderKind::Piped,
                    outcome: AttemptOutcome::SoftFailure("no playable stream".into()),
                    elapsed_ms: 120,
                },
            ],
        };

        let details = err.details();
        assert!(details.contains("https://a.example (invidious): timed out"));
        assert!(details.contains("https://b.example (piped): incomplete response"));
        assert_eq!(err.attempts().len(), 2);
    }
}
