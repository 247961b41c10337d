// src/delivery/mod.rs
//! Delivery stage: drives the web mail UI to send one message.
//!
//! The browser session is opened at the start of [`DeliveryStage::run`] and
//! quit exactly once before it returns, whatever happened in between.

mod browser;
mod message;
mod signal;
mod state;
mod webdriver;

pub use browser::{wait_for_element, BrowserLauncher, BrowserSession, ElementTarget, WaitPolicy};
pub use message::{
    DeliveryMessage, MessageComposer, MessageTemplates, DEFAULT_BODY_TEMPLATE, DEFAULT_SUBJECT_TEMPLATE,
};
pub use signal::{await_signal, AnyOf, ElementPresent, PageContains, PathContains, SuccessSignal, UrlMatches};
pub use state::{DeliveryFailure, DeliveryMachine, DeliveryReport, DeliveryState};
pub use webdriver::{WebDriverLauncher, WebDriverSession};

use crate::error::{panic_message, AppError};
use crate::types::{Secret, ValidatedUrl};
use futures::FutureExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Locators of every control the delivery sequence touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormLocators {
    pub username: ElementTarget,
    pub password: ElementTarget,
    pub login_submit: ElementTarget,
    pub recipient: ElementTarget,
    pub subject: ElementTarget,
    pub body: ElementTarget,
    pub attachment: ElementTarget,
    pub send: ElementTarget,
}

impl Default for FormLocators {
    fn default() -> Self {
        Self {
            username: ElementTarget::name("username"),
            password: ElementTarget::name("password"),
            login_submit: ElementTarget::css("button[type='submit']"),
            recipient: ElementTarget::name("recipient"),
            subject: ElementTarget::name("subject"),
            body: ElementTarget::name("body"),
            attachment: ElementTarget::name("attachment"),
            send: ElementTarget::css("button[type='submit']"),
        }
    }
}

/// Where and as whom messages are sent.
#[derive(Debug, Clone)]
pub struct MailAccount {
    pub base_url: ValidatedUrl,
    pub login_path: String,
    pub compose_path: String,
    pub username: String,
    pub password: Secret,
}

impl MailAccount {
    pub fn login_url(&self) -> String {
        self.base_url.page(&self.login_path)
    }

    pub fn compose_url(&self) -> String {
        self.base_url.page(&self.compose_path)
    }
}

/// The two page signals the sequence waits on.
pub struct DeliverySignals {
    pub authenticated: Box<dyn SuccessSignal>,
    pub delivered: Box<dyn SuccessSignal>,
}

impl DeliverySignals {
    /// Authenticated once the browser has left `login_url` for a page whose
    /// path carries one of `auth_markers`; delivered when the URL matches
    /// `delivered_url` or the visible page text shows one of
    /// `delivered_text`.
    pub fn from_markers(
        auth_markers: Vec<String>,
        login_url: &str,
        delivered_url: Option<Regex>,
        delivered_text: Vec<String>,
    ) -> Self {
        let mut delivered: Vec<Box<dyn SuccessSignal>> = Vec::new();
        if let Some(pattern) = delivered_url {
            delivered.push(Box::new(UrlMatches::new(pattern)));
        }
        delivered.push(Box::new(PageContains::new(delivered_text)));

        Self {
            authenticated: Box::new(PathContains::new(auth_markers).away_from(login_url)),
            delivered: Box::new(AnyOf::new(delivered)),
        }
    }
}

/// Runs the fixed UI sequence against sessions from one launcher.
pub struct DeliveryStage {
    launcher: Arc<dyn BrowserLauncher>,
    account: MailAccount,
    locators: FormLocators,
    signals: DeliverySignals,
    wait: WaitPolicy,
}

impl DeliveryStage {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        account: MailAccount,
        locators: FormLocators,
        signals: DeliverySignals,
        wait: WaitPolicy,
    ) -> Self {
        Self {
            launcher,
            account,
            locators,
            signals,
            wait,
        }
    }

    /// Sends `message`. Never returns an error: every failure ends up in the
    /// report's `Failed` state.
    pub async fn run(&self, message: &DeliveryMessage) -> DeliveryReport {
        let mut machine = DeliveryMachine::new();

        let session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => return machine.fail(&e),
        };
        machine.advance();

        let outcome = AssertUnwindSafe(self.drive(session.as_ref(), message, &mut machine))
            .catch_unwind()
            .await;

        if let Err(e) = session.quit().await {
            log::warn!("{}", e);
        }

        match outcome {
            Ok(Ok(())) => machine.finish(),
            Ok(Err(e)) => machine.fail(&e),
            Err(payload) => machine.fail(&AppError::internal(format!(
                "delivery panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    async fn drive(
        &self,
        session: &dyn BrowserSession,
        message: &DeliveryMessage,
        machine: &mut DeliveryMachine,
    ) -> Result<(), AppError> {
        self.authenticate(session, machine.state()).await?;
        machine.advance();

        self.open_composer(session, machine.state()).await?;
        machine.advance();

        self.fill_content(session, message, machine.state()).await?;
        machine.advance();

        session.click(&self.locators.send).await?;
        machine.advance();

        await_signal(session, self.signals.delivered.as_ref(), self.wait, machine.state()).await?;
        machine.advance();
        Ok(())
    }

    async fn authenticate(&self, session: &dyn BrowserSession, state: DeliveryState) -> Result<(), AppError> {
        session.navigate(&self.account.login_url()).await?;
        wait_for_element(session, &self.locators.username, self.wait, state).await?;

        session.fill(&self.locators.username, &self.account.username).await?;
        session
            .fill(&self.locators.password, self.account.password.expose())
            .await?;
        session.click(&self.locators.login_submit).await?;

        await_signal(session, self.signals.authenticated.as_ref(), self.wait, state).await?;
        log::info!("Logged in as {}", self.account.username);
        Ok(())
    }

    async fn open_composer(&self, session: &dyn BrowserSession, state: DeliveryState) -> Result<(), AppError> {
        session.navigate(&self.account.compose_url()).await?;
        wait_for_element(session, &self.locators.recipient, self.wait, state).await
    }

    async fn fill_content(
        &self,
        session: &dyn BrowserSession,
        message: &DeliveryMessage,
        state: DeliveryState,
    ) -> Result<(), AppError> {
        session
            .fill(&self.locators.recipient, &message.recipients.joined())
            .await?;
        session.fill(&self.locators.subject, &message.subject).await?;
        session.fill(&self.locators.body, &message.body).await?;

        match &message.attachment {
            Some(path) if !path.exists() => {
                return Err(AppError::step_failure(
                    state,
                    format!("attachment {} does not exist", path.display()),
                ));
            }
            Some(path) => {
                session.attach(&self.locators.attachment, path).await?;
                log::info!("Attached {}", path.display());
            }
            None => log::info!("Sending without attachment"),
        }
        Ok(())
    }
}
