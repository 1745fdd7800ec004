use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Failure of a single step. Any variant ends the enclosing scenario.
#[derive(Debug, Clone, thiserror::Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    #[error("page {url} did not become ready within {}ms", timeout.as_millis())]
    NavigationTimeout { url: String, timeout: Duration },
    #[error("no element matches {selector}")]
    ElementNotFound { selector: String },
    #[error("{count} elements match {selector}, expected exactly one")]
    AmbiguousMatch { selector: String, count: usize },
    #[error("page did not settle within {}ms after {action}", timeout.as_millis())]
    InteractionTimeout { action: String, timeout: Duration },
    #[error("expected {expected:?} to be visible, not found after {}ms", elapsed.as_millis())]
    AssertionFailure { expected: String, elapsed: Duration },
    #[error("expected {text:?} to stay hidden, but it was visible after {}ms", elapsed.as_millis())]
    UnexpectedGlyph { text: String, elapsed: Duration },
    #[error("browser error: {0}")]
    Browser(String),
}

impl StepError {
    pub fn browser(err: impl std::fmt::Display) -> Self {
        StepError::Browser(err.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StepError::NavigationTimeout { .. } => "navigation_timeout",
            StepError::ElementNotFound { .. } => "element_not_found",
            StepError::AmbiguousMatch { .. } => "ambiguous_match",
            StepError::InteractionTimeout { .. } => "interaction_timeout",
            StepError::AssertionFailure { .. } => "assertion_failure",
            StepError::UnexpectedGlyph { .. } => "unexpected_glyph",
            StepError::Browser(_) => "browser",
        }
    }

    pub fn expected(&self) -> Option<&str> {
        match self {
            StepError::AssertionFailure { expected, .. } => Some(expected),
            StepError::UnexpectedGlyph { text, .. } => Some(text),
            StepError::ElementNotFound { selector }
            | StepError::AmbiguousMatch { selector, .. } => Some(selector),
            _ => None,
        }
    }

    pub fn actual(&self) -> String {
        match self {
            StepError::NavigationTimeout { timeout, .. }
            | StepError::InteractionTimeout { timeout, .. } => {
                format!("timed out after {}ms", timeout.as_millis())
            }
            StepError::ElementNotFound { .. } => "0 matches".to_string(),
            StepError::AmbiguousMatch { count, .. } => format!("{count} matches"),
            StepError::AssertionFailure { elapsed, .. } => {
                format!("not visible after {}ms", elapsed.as_millis())
            }
            StepError::UnexpectedGlyph { elapsed, .. } => {
                format!("visible after {}ms", elapsed.as_millis())
            }
            StepError::Browser(message) => message.clone(),
        }
    }
}

/// Screenshot failure. Recorded as a warning, never fails a scenario.
#[derive(Debug, Clone, thiserror::Error, Serialize, PartialEq, Eq)]
#[error("failed to capture {}: {reason}", path.display())]
pub struct CaptureError {
    pub path: PathBuf,
    pub reason: String,
}
