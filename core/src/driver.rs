//! Browser driver abstraction.
//!
//! A [`Driver`] is one isolated browser session. The executor owns the
//! session for the duration of a scenario and passes it into every step;
//! nothing about the page is cached between steps, so every selector is
//! resolved again right before it is used.

pub mod chromium;
pub mod fake;

use crate::error::{CaptureError, StepError};
use crate::scenario::Selector;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    selector: Selector,
    token: String,
}

impl ElementHandle {
    pub fn new(selector: Selector, token: impl Into<String>) -> Self {
        Self {
            selector,
            token: token.into(),
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[async_trait]
pub trait Driver: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), StepError>;

    /// Resolves exactly one visible element.
    async fn locate(&mut self, selector: &Selector) -> Result<ElementHandle, StepError>;

    async fn select_option(&mut self, handle: &ElementHandle, value: &str)
        -> Result<(), StepError>;

    async fn check(&mut self, handle: &ElementHandle) -> Result<(), StepError>;

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), StepError>;

    /// One immediate probe; never waits for the text to appear.
    async fn text_visible(&mut self, text: &str) -> Result<bool, StepError>;

    async fn screenshot(&mut self, path: &Path) -> Result<(), CaptureError>;

    async fn close(&mut self) -> Result<(), StepError> {
        Ok(())
    }
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Driver>, StepError>;
}

pub(crate) fn require_single(selector: &Selector, count: usize) -> Result<(), StepError> {
    match count {
        0 => Err(StepError::ElementNotFound {
            selector: selector.to_string(),
        }),
        1 => Ok(()),
        count => Err(StepError::AmbiguousMatch {
            selector: selector.to_string(),
            count,
        }),
    }
}
