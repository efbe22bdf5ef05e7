//! Approximate completion classification of captured pane text.
//!
//! The agent exposes no structured status, so the signal is inferred from
//! what is rendered: a returned shell prompt means the task finished; the
//! error keyword without a benign token means it failed. Both rules can
//! misfire on unusual output.

use crate::types::{CompletionSignal, DetectionConfig};

pub trait CompletionDetector: Send + Sync {
    fn classify(&self, text: &str) -> CompletionSignal;

    /// Whether a prompt marker is currently rendered
    fn prompt_visible(&self, text: &str) -> bool;
}

/// Marker and keyword based detector configured from `DetectionConfig`
#[derive(Debug, Clone)]
pub struct HeuristicDetector {
    prompt_markers: Vec<String>,
    error_keyword: String,
    benign_tokens: Vec<String>,
}

impl HeuristicDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            prompt_markers: config
                .prompt_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            error_keyword: config.error_keyword.to_lowercase(),
            benign_tokens: config
                .benign_tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    fn has_error(&self, text: &str) -> bool {
        if self.error_keyword.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        lower.contains(&self.error_keyword)
            && !self.benign_tokens.iter().any(|token| lower.contains(token))
    }
}

impl Default for HeuristicDetector {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}

impl CompletionDetector for HeuristicDetector {
    fn classify(&self, text: &str) -> CompletionSignal {
        if self.prompt_visible(text) {
            CompletionSignal::Completed
        } else if self.has_error(text) {
            CompletionSignal::Errored
        } else {
            CompletionSignal::Running
        }
    }

    fn prompt_visible(&self, text: &str) -> bool {
        self.prompt_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
    }
}
