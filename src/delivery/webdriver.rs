// src/delivery/webdriver.rs
//! [`BrowserLauncher`] backed by a WebDriver endpoint (chromedriver or a
//! selenium standalone server).

use super::browser::{BrowserLauncher, BrowserSession, ElementTarget};
use crate::constants::BROWSER_WINDOW_SIZE;
use crate::error::AppError;
use serde_json::{json, Map, Value};
use std::path::Path;
use thirtyfour::{By, WebDriver, WebElement};

/// Launches Chrome sessions through a WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    server_url: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(server_url: impl Into<String>, headless: bool) -> Self {
        Self {
            server_url: server_url.into(),
            headless,
        }
    }
}

/// W3C capabilities for a Chrome session.
pub(crate) fn chrome_capabilities(headless: bool) -> Map<String, Value> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        format!("--window-size={}", BROWSER_WINDOW_SIZE),
    ];
    if headless {
        args.push("--headless".to_string());
    }

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}

#[async_trait::async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError> {
        log::info!(
            "Starting browser session via {} (headless: {})",
            self.server_url,
            self.headless
        );
        let driver = WebDriver::new(self.server_url.as_str(), chrome_capabilities(self.headless))
            .await
            .map_err(|e| AppError::automation(format!("cannot start browser at {}: {}", self.server_url, e)))?;
        Ok(Box::new(WebDriverSession { driver }))
    }
}

/// A live WebDriver session.
pub struct WebDriverSession {
    driver: WebDriver,
}

fn locator(target: &ElementTarget) -> By {
    match target {
        ElementTarget::Name(name) => By::Name(name.as_str()),
        ElementTarget::Css(selector) => By::Css(selector.as_str()),
    }
}

impl WebDriverSession {
    async fn element(&self, target: &ElementTarget) -> Result<WebElement, AppError> {
        self.driver
            .find(locator(target))
            .await
            .map_err(|e| AppError::automation(format!("element {} not found: {}", target, e)))
    }
}

#[async_trait::async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        log::debug!("Navigating to {}", url);
        self.driver
            .goto(url)
            .await
            .map_err(|e| AppError::automation(format!("navigation to {} failed: {}", url, e)))
    }

    async fn current_url(&self) -> Result<String, AppError> {
        self.driver
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(AppError::automation)
    }

    async fn page_text(&self) -> Result<String, AppError> {
        let body = self
            .driver
            .find(By::Tag("body"))
            .await
            .map_err(|e| AppError::automation(format!("page has no body: {}", e)))?;
        body.text().await.map_err(AppError::automation)
    }

    async fn is_present(&self, target: &ElementTarget) -> Result<bool, AppError> {
        let found = self
            .driver
            .find_all(locator(target))
            .await
            .map_err(AppError::automation)?;
        Ok(!found.is_empty())
    }

    async fn fill(&self, target: &ElementTarget, text: &str) -> Result<(), AppError> {
        let element = self.element(target).await?;
        element
            .clear()
            .await
            .map_err(|e| AppError::automation(format!("cannot clear {}: {}", target, e)))?;
        element
            .send_keys(text)
            .await
            .map_err(|e| AppError::automation(format!("cannot type into {}: {}", target, e)))
    }

    async fn attach(&self, target: &ElementTarget, path: &Path) -> Result<(), AppError> {
        let element = self.element(target).await?;
        let path = path.to_string_lossy().into_owned();
        element
            .send_keys(path.as_str())
            .await
            .map_err(|e| AppError::automation(format!("cannot attach {}: {}", path, e)))
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), AppError> {
        self.element(target)
            .await?
            .click()
            .await
            .map_err(|e| AppError::automation(format!("cannot click {}: {}", target, e)))
    }

    async fn quit(&self) -> Result<(), AppError> {
        self.driver
            .clone()
            .quit()
            .await
            .map_err(|e| AppError::automation(format!("browser did not quit cleanly: {}", e)))
    }
}
