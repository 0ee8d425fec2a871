use std::fmt;

use serde::{Deserialize, Serialize};

use crate::seo::extractor::SeoSignals;

/// How badly a deficiency hurts the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// How soon the deficiency should be addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recommended remediation for one structural deficiency.
///
/// `action_type` is the stable identifier; one action exists per distinct
/// deficiency, keyed by `(snapshot, page, action_type)` at the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Stable deficiency identifier
    pub action_type: String,

    /// Short human-readable title
    pub title: String,

    /// Explanation of why this matters
    pub description: String,

    /// Impact of the deficiency
    pub severity: Severity,

    /// Urgency of the fix
    pub priority: Priority,

    /// Concrete remediation steps
    pub steps: Vec<String>,
}

/// Map derived signals to remediation actions.
///
/// Pure mapping; absent deficiencies produce nothing and no input can make
/// it fail. Persistence of the result is the caller's concern.
pub fn generate_actions(signals: &SeoSignals) -> Vec<Action> {
    let mut actions = Vec::new();

    if !signals.has_title {
        actions.push(Action {
            action_type: "missing_title".to_string(),
            title: "Add a page title".to_string(),
            description: "The page has no title element. Search engines use the \
                          title as the primary headline in results, and browsers \
                          show it in tabs and bookmarks."
                .to_string(),
            severity: Severity::High,
            priority: Priority::High,
            steps: vec![
                "Add a <title> element inside <head>".to_string(),
                "Describe the page content in roughly 50-60 characters".to_string(),
                "Make the title unique across the site".to_string(),
            ],
        });
    }

    if !signals.has_meta_description {
        actions.push(Action {
            action_type: "missing_meta_description".to_string(),
            title: "Add a meta description".to_string(),
            description: "The page has no meta description. Search engines fall \
                          back to arbitrary page text for the result snippet, \
                          which usually reads worse than a written summary."
                .to_string(),
            severity: Severity::Medium,
            priority: Priority::Medium,
            steps: vec![
                "Add <meta name=\"description\" content=\"...\"> inside <head>".to_string(),
                "Summarize the page in roughly 150-160 characters".to_string(),
            ],
        });
    }

    if !signals.has_h1 {
        actions.push(Action {
            action_type: "missing_h1".to_string(),
            title: "Add a top-level heading".to_string(),
            description: "The page has no h1 element. A single top-level heading \
                          anchors the document outline for both readers and \
                          crawlers."
                .to_string(),
            severity: Severity::Medium,
            priority: Priority::Low,
            steps: vec![
                "Add one <h1> element near the top of the page body".to_string(),
                "Keep it consistent with the page title".to_string(),
            ],
        });
    }

    actions
}
