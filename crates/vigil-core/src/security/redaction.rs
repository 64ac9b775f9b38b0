//! Redaction engine: runs the five pattern layers, in order, over one piece of text.
//!
//! Layer 1 can only block. Layers 2–5 are cumulative rewrites that never fail. The engine holds
//! no mutable state, so one instance (or [`RedactionEngine::default`]) can be shared freely
//! across threads.

use super::patterns::{Layer, PatternLibrary};
use serde::Serialize;

/// Result of redacting one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedactionOutcome {
    /// Nothing fired; the text is safe as-is.
    Pass { content: String },
    /// At least one rewrite changed the text. `layer` is the lowest layer that fired.
    Rewritten {
        content: String,
        layer: Layer,
        labels: Vec<String>,
    },
    /// A hard blocker matched; the message must not be published. `reason` is the marker label.
    Blocked { reason: String, layer: Layer },
}

impl RedactionOutcome {
    /// Publishable content, or `None` when blocked.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Pass { content } | Self::Rewritten { content, .. } => Some(content),
            Self::Blocked { .. } => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten { .. })
    }
}

/// Outcome plus the audit metadata derived from the same pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionReport {
    pub outcome: RedactionOutcome,
    /// Union of labels that fired, in pipeline order, without duplicates.
    pub labels: Vec<String>,
    /// Lowest layer that made a decision; 0 when nothing fired.
    pub layer: u8,
}

/// The fixed five-layer pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RedactionEngine {
    library: &'static PatternLibrary,
}

impl Default for RedactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RedactionEngine {
    pub fn new() -> Self {
        Self {
            library: PatternLibrary::global(),
        }
    }

    /// Runs the pipeline once and returns outcome, labels and deciding layer together.
    /// `None` and empty input pass unchanged as `""`.
    pub fn evaluate(&self, text: Option<&str>) -> RedactionReport {
        let text = text.unwrap_or("");
        if text.is_empty() {
            return RedactionReport {
                outcome: RedactionOutcome::Pass {
                    content: String::new(),
                },
                labels: Vec::new(),
                layer: 0,
            };
        }

        let blockers: Vec<String> = self
            .library
            .layer(Layer::HardBlocker)
            .filter(|rule| rule.fires(text))
            .map(|rule| rule.label().to_string())
            .collect();
        if let Some(reason) = blockers.first() {
            tracing::debug!(
                target: "vigil::redaction",
                reason = %reason,
                "message blocked by hard blocker"
            );
            return RedactionReport {
                outcome: RedactionOutcome::Blocked {
                    reason: reason.clone(),
                    layer: Layer::HardBlocker,
                },
                labels: blockers,
                layer: Layer::HardBlocker.number(),
            };
        }

        let mut current = text.to_string();
        let mut labels: Vec<String> = Vec::new();
        let mut lowest: Option<Layer> = None;
        for rule in self
            .library
            .rules()
            .iter()
            .filter(|r| r.layer() != Layer::HardBlocker)
        {
            if !rule.fires(&current) {
                continue;
            }
            lowest.get_or_insert(rule.layer());
            if !labels.iter().any(|l| l == rule.label()) {
                labels.push(rule.label().to_string());
            }
            let rewritten = rule.apply(&current).into_owned();
            current = rewritten;
        }

        let layer = lowest.map(|l| l.number()).unwrap_or(0);
        let outcome = match lowest {
            Some(l) if current != text => RedactionOutcome::Rewritten {
                content: current,
                layer: l,
                labels: labels.clone(),
            },
            _ => RedactionOutcome::Pass { content: current },
        };
        if layer > 0 {
            tracing::debug!(
                target: "vigil::redaction",
                layer,
                labels = ?labels,
                "message rewritten"
            );
        }
        RedactionReport {
            outcome,
            labels,
            layer,
        }
    }

    /// Redacts `text`. Never fails; blocked text is a value, not an error.
    pub fn redact(&self, text: &str) -> RedactionOutcome {
        self.evaluate(Some(text)).outcome
    }

    /// Like [`RedactionEngine::redact`] for nullable content.
    pub fn redact_nullable(&self, text: Option<&str>) -> RedactionOutcome {
        self.evaluate(text).outcome
    }

    /// Labels that would fire for `text`, without producing the rewritten content for the caller.
    pub fn matched_labels(&self, text: &str) -> Vec<String> {
        self.evaluate(Some(text)).labels
    }

    /// Lowest layer that would make a decision for `text` (0 if none).
    pub fn decision_layer(&self, text: &str) -> u8 {
        self.evaluate(Some(text)).layer
    }
}
