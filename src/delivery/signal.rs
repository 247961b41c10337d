// src/delivery/signal.rs
//! Page-state interpretation.
//!
//! A [`SuccessSignal`] answers one question about the current page: did the
//! last action land where it should? The state machine asks, the signal
//! decides. An absent marker is always a no.

use super::browser::{BrowserSession, ElementTarget, WaitPolicy};
use super::state::DeliveryState;
use crate::error::AppError;
use regex::Regex;
use url::Url;

#[async_trait::async_trait]
pub trait SuccessSignal: Send + Sync {
    async fn did_this_action_succeed(&self, session: &dyn BrowserSession) -> Result<bool, AppError>;

    /// Short description for logs and failure messages.
    fn describe(&self) -> String;
}

fn meaningful(markers: Vec<String>) -> Vec<String> {
    markers
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Succeeds when the path of the current URL contains any of the markers.
///
/// Host, query and fragment are ignored, so neither `main.example.org` nor
/// `/login?next=/inbox` counts as a match for `main` or `inbox`. A URL that
/// does not parse never matches.
#[derive(Debug, Clone)]
pub struct PathContains {
    markers: Vec<String>,
    away_from: Option<String>,
}

impl PathContains {
    /// Blank markers are dropped; with none left the signal never succeeds.
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: meaningful(markers),
            away_from: None,
        }
    }

    /// Never succeeds while the browser is still on the page at `url`.
    pub fn away_from(mut self, url: &str) -> Self {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.to_string(),
        };
        self.away_from = Some(normalized(&path).to_string());
        self
    }

    fn matches(&self, url: &str) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let path = parsed.path();
        if self.away_from.as_deref() == Some(normalized(path)) {
            return false;
        }
        self.markers.iter().any(|m| path.contains(m.as_str()))
    }
}

fn normalized(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[async_trait::async_trait]
impl SuccessSignal for PathContains {
    async fn did_this_action_succeed(&self, session: &dyn BrowserSession) -> Result<bool, AppError> {
        let url = session.current_url().await?;
        Ok(self.matches(&url))
    }

    fn describe(&self) -> String {
        match &self.away_from {
            Some(path) => format!("URL path away from {} containing one of {:?}", path, self.markers),
            None => format!("URL path containing one of {:?}", self.markers),
        }
    }
}

/// Succeeds when the current URL matches a regular expression.
#[derive(Debug, Clone)]
pub struct UrlMatches {
    pattern: Regex,
}

impl UrlMatches {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

#[async_trait::async_trait]
impl SuccessSignal for UrlMatches {
    async fn did_this_action_succeed(&self, session: &dyn BrowserSession) -> Result<bool, AppError> {
        let url = session.current_url().await?;
        Ok(self.pattern.is_match(&url))
    }

    fn describe(&self) -> String {
        format!("URL matching /{}/", self.pattern.as_str())
    }
}

/// Succeeds when the visible page text contains any of the markers.
#[derive(Debug, Clone)]
pub struct PageContains {
    markers: Vec<String>,
}

impl PageContains {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: meaningful(markers),
        }
    }
}

#[async_trait::async_trait]
impl SuccessSignal for PageContains {
    async fn did_this_action_succeed(&self, session: &dyn BrowserSession) -> Result<bool, AppError> {
        if self.markers.is_empty() {
            return Ok(false);
        }
        let text = session.page_text().await?;
        Ok(self.markers.iter().any(|m| text.contains(m.as_str())))
    }

    fn describe(&self) -> String {
        format!("page text containing one of {:?}", self.markers)
    }
}

/// Succeeds when an element is on the page.
#[derive(Debug, Clone)]
pub struct ElementPresent {
    target: ElementTarget,
}

impl ElementPresent {
    pub fn new(target: ElementTarget) -> Self {
        Self { target }
    }
}

#[async_trait::async_trait]
impl SuccessSignal for ElementPresent {
    async fn did_this_action_succeed(&self, session: &dyn BrowserSession) -> Result<bool, AppError> {
        session.is_present(&self.target).await
    }

    fn describe(&self) -> String {
        format!("element {}", self.target)
    }
}

/// Succeeds when any inner signal does. Empty never succeeds.
pub struct AnyOf {
    signals: Vec<Box<dyn SuccessSignal>>,
}

impl AnyOf {
    pub fn new(signals: Vec<Box<dyn SuccessSignal>>) -> Self {
        Self { signals }
    }
}

#[async_trait::async_trait]
impl SuccessSignal for AnyOf {
    async fn did_this_action_succeed(&self, session: &dyn BrowserSession) -> Result<bool, AppError> {
        for signal in &self.signals {
            if signal.did_this_action_succeed(session).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.signals.iter().map(|s| s.describe()).collect();
        if parts.is_empty() {
            "nothing".to_string()
        } else {
            parts.join(" or ")
        }
    }
}

/// Polls `signal` until it succeeds or the wait window closes.
pub async fn await_signal(
    session: &dyn BrowserSession,
    signal: &dyn SuccessSignal,
    policy: WaitPolicy,
    state: DeliveryState,
) -> Result<(), AppError> {
    let deadline = tokio::time::Instant::now() + policy.timeout;
    loop {
        if signal.did_this_action_succeed(session).await? {
            log::debug!("Observed {}", signal.describe());
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(AppError::step_failure(
                state,
                format!(
                    "expected {} within {}s",
                    signal.describe(),
                    policy.timeout.as_secs_f32()
                ),
            ));
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}
