// src/delivery/browser.rs
//! Browser capability traits.
//!
//! The delivery state machine only talks to these traits, so it can be
//! driven against a real WebDriver session or an in-memory fake.

use super::state::DeliveryState;
use crate::constants::{DEFAULT_ELEMENT_WAIT_SECS, SIGNAL_POLL_INTERVAL_MS};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// How an element on the page is located.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementTarget {
    /// The element's `name` attribute
    Name(String),
    /// A CSS selector
    Css(String),
}

impl ElementTarget {
    pub fn name(value: impl Into<String>) -> Self {
        Self::Name(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::Css(value.into())
    }
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "[name='{}']", name),
            Self::Css(selector) => f.write_str(selector),
        }
    }
}

/// Starts browser sessions.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError>;
}

/// One live browser session.
///
/// `quit` ends the session; callers must not use it afterwards.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AppError>;
    async fn current_url(&self) -> Result<String, AppError>;
    /// Text the page shows a reader. Markup, scripts and hidden elements
    /// are not part of it.
    async fn page_text(&self) -> Result<String, AppError>;
    async fn is_present(&self, target: &ElementTarget) -> Result<bool, AppError>;
    /// Clears the element and types `text` into it.
    async fn fill(&self, target: &ElementTarget, text: &str) -> Result<(), AppError>;
    /// Hands a local file to a file input.
    async fn attach(&self, target: &ElementTarget, path: &Path) -> Result<(), AppError>;
    async fn click(&self, target: &ElementTarget) -> Result<(), AppError>;
    async fn quit(&self) -> Result<(), AppError>;
}

/// How long to wait for an element or signal, and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_ELEMENT_WAIT_SECS),
            poll_interval: Duration::from_millis(SIGNAL_POLL_INTERVAL_MS),
        }
    }
}

impl WaitPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Polls until `target` is present or the wait window closes.
///
/// Timing out is a step failure recorded against `state`.
pub async fn wait_for_element(
    session: &dyn BrowserSession,
    target: &ElementTarget,
    policy: WaitPolicy,
    state: DeliveryState,
) -> Result<(), AppError> {
    let deadline = tokio::time::Instant::now() + policy.timeout;
    loop {
        if session.is_present(target).await? {
            log::debug!("Element {} is present", target);
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(AppError::step_failure(
                state,
                format!(
                    "element {} did not appear within {}s",
                    target,
                    policy.timeout.as_secs_f32()
                ),
            ));
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}
