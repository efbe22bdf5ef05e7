use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of a single pane capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionSignal {
    Running,
    Completed,
    Errored,
}

impl fmt::Display for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionSignal::Running => write!(f, "running"),
            CompletionSignal::Completed => write!(f, "completed"),
            CompletionSignal::Errored => write!(f, "errored"),
        }
    }
}

/// Status reported for a session by the list operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Errored,
    /// The session is listed but its pane could not be captured
    Unknown,
}

impl From<CompletionSignal> for SessionStatus {
    fn from(signal: CompletionSignal) -> Self {
        match signal {
            CompletionSignal::Running => SessionStatus::Running,
            CompletionSignal::Completed => SessionStatus::Completed,
            CompletionSignal::Errored => SessionStatus::Errored,
        }
    }
}

/// Output format flag passed to `opencode run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Default,
}

impl OutputFormat {
    /// Flag text appended to the run command, if any
    pub fn flag(self) -> Option<&'static str> {
        match self {
            OutputFormat::Json => Some("--format json"),
            OutputFormat::Default => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Default => write!(f, "default"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "default" => Ok(OutputFormat::Default),
            _ => Err(format!("Unknown output format: '{s}'. Expected: json, default")),
        }
    }
}

/// Security policy applied by the process executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityPolicy {
    #[default]
    Allowlist,
    Full,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityPolicy::Allowlist => write!(f, "allowlist"),
            SecurityPolicy::Full => write!(f, "full"),
        }
    }
}

impl FromStr for SecurityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allowlist" => Ok(SecurityPolicy::Allowlist),
            "full" => Ok(SecurityPolicy::Full),
            _ => Err(format!("Unknown security policy: '{s}'. Expected: allowlist, full")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_signal_serializes_lowercase() {
        let json = serde_json::to_string(&CompletionSignal::Errored).unwrap();
        assert_eq!(json, "\"errored\"");
        assert_eq!(CompletionSignal::Completed.to_string(), "completed");
    }

    #[test]
    fn test_session_status_from_signal() {
        assert_eq!(
            SessionStatus::from(CompletionSignal::Running),
            SessionStatus::Running
        );
        assert_eq!(
            SessionStatus::from(CompletionSignal::Errored),
            SessionStatus::Errored
        );
    }

    #[test]
    fn test_output_format_flag() {
        assert_eq!(OutputFormat::Json.flag(), Some("--format json"));
        assert_eq!(OutputFormat::Default.flag(), None);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_security_policy_parse() {
        assert_eq!(
            SecurityPolicy::from_str("allowlist").unwrap(),
            SecurityPolicy::Allowlist
        );
        assert_eq!(SecurityPolicy::from_str("Full").unwrap(), SecurityPolicy::Full);
        assert!(SecurityPolicy::from_str("none").is_err());
    }
}
