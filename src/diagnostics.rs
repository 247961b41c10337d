// src/diagnostics.rs
//! Connectivity checks for both stages, run in isolation.
//!
//! Each probe answers one "can I connect" question and is reported on its
//! own. Nothing here extracts data or sends mail.

use crate::constants::{HTTP_PROBE_TIMEOUT_SECS, LISTENER_PROBE_TIMEOUT_SECS};
use crate::delivery::{
    await_signal, AnyOf, BrowserLauncher, DeliveryState, ElementPresent, FormLocators, MailAccount,
    PageContains, PathContains, WaitPolicy,
};
use crate::error::{panic_message, AppError};
use crate::extraction::{with_session, ConnectionDescriptor, DataSource};
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Text shown on the mail UI's login page.
const LOGIN_PAGE_TEXT: &str = "登录";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub checks: Vec<CheckResult>,
}

impl DiagnosticReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Everything the probes need to reach both stages' resources.
pub struct Diagnostics {
    pub output_dir: PathBuf,
    pub descriptor: ConnectionDescriptor,
    pub probe_query: String,
    pub source: Arc<dyn DataSource>,
    pub account: MailAccount,
    pub locators: FormLocators,
    pub launcher: Arc<dyn BrowserLauncher>,
    pub wait: WaitPolicy,
}

impl Diagnostics {
    /// Runs every probe in order; a failing probe does not stop the rest.
    pub async fn run(&self) -> DiagnosticReport {
        let mut checks = Vec::new();

        checks.push(timed("output directory", async { check_output_dir(&self.output_dir) }).await);

        let listener = self.descriptor.listener_address();
        checks.push(
            timed(
                "database listener",
                check_listener(&listener, Duration::from_secs(LISTENER_PROBE_TIMEOUT_SECS)),
            )
            .await,
        );

        let source = self.source.clone();
        let descriptor = self.descriptor.clone();
        let probe = self.probe_query.clone();
        checks.push(
            timed("database session", async move {
                tokio::task::spawn_blocking(move || check_database(source.as_ref(), &descriptor, &probe)).await?
            })
            .await,
        );

        checks.push(timed("mail login page", check_login_page(&self.account.login_url())).await);

        checks.push(
            timed(
                "browser login surface",
                check_login_surface(self.launcher.as_ref(), &self.account, &self.locators, self.wait),
            )
            .await,
        );

        DiagnosticReport { checks }
    }
}

async fn timed<F>(name: &str, probe: F) -> CheckResult
where
    F: Future<Output = Result<String, AppError>>,
{
    let started = Instant::now();
    let outcome = AssertUnwindSafe(probe).catch_unwind().await;
    let duration_ms = started.elapsed().as_millis();

    let (passed, detail) = match outcome {
        Ok(Ok(detail)) => (true, detail),
        Ok(Err(e)) => (false, e.to_string()),
        Err(payload) => (false, format!("probe panicked: {}", panic_message(payload.as_ref()))),
    };

    if passed {
        log::info!("[PASS] {} ({} ms): {}", name, duration_ms, detail);
    } else {
        log::error!("[FAIL] {} ({} ms): {}", name, duration_ms, detail);
    }

    CheckResult {
        name: name.to_string(),
        passed,
        detail,
        duration_ms,
    }
}

/// The output directory exists (or can be created) and accepts files.
pub fn check_output_dir(dir: &Path) -> Result<String, AppError> {
    crate::artifact::ensure_output_dir(dir)?;
    let probe = tempfile::NamedTempFile::new_in(dir)?;
    drop(probe);
    Ok(format!("{} is writable", dir.display()))
}

/// The database listener accepts TCP connections.
pub async fn check_listener(address: &str, timeout: Duration) -> Result<String, AppError> {
    let connection_error = |message: String| AppError::Connection {
        target: address.to_string(),
        message,
    };

    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Ok(format!("{} accepts connections", address)),
        Ok(Err(e)) => Err(connection_error(e.to_string())),
        Err(_) => Err(connection_error(format!(
            "no answer within {}s",
            timeout.as_secs()
        ))),
    }
}

/// A session can be opened and can execute the probe statement. Blocking.
pub fn check_database(
    source: &dyn DataSource,
    descriptor: &ConnectionDescriptor,
    probe_query: &str,
) -> Result<String, AppError> {
    let result = with_session(source, descriptor, |session| session.query(probe_query))?;
    Ok(format!(
        "{} answered `{}` with {} row(s)",
        descriptor,
        probe_query,
        result.row_count()
    ))
}

/// The mail UI's login page answers over plain HTTP.
pub async fn check_login_page(url: &str) -> Result<String, AppError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_PROBE_TIMEOUT_SECS))
        .build()
        .map_err(AppError::automation)?;

    let response = client.get(url).send().await.map_err(|e| AppError::Connection {
        target: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if status.is_success() {
        Ok(format!("{} answered {}", url, status))
    } else {
        Err(AppError::Connection {
            target: url.to_string(),
            message: format!("HTTP {}", status),
        })
    }
}

/// A browser session can reach the login surface. The session is always
/// quit.
pub async fn check_login_surface(
    launcher: &dyn BrowserLauncher,
    account: &MailAccount,
    locators: &FormLocators,
    wait: WaitPolicy,
) -> Result<String, AppError> {
    let session = launcher.launch().await?;
    let url = account.login_url();

    let login_surface = AnyOf::new(vec![
        Box::new(PathContains::new(vec!["login".to_string()])),
        Box::new(PageContains::new(vec![LOGIN_PAGE_TEXT.to_string()])),
        Box::new(ElementPresent::new(locators.username.clone())),
    ]);

    let reached = AssertUnwindSafe(async {
        session.navigate(&url).await?;
        await_signal(session.as_ref(), &login_surface, wait, DeliveryState::SessionReady).await
    })
    .catch_unwind()
    .await;

    if let Err(e) = session.quit().await {
        log::warn!("{}", e);
    }

    match reached {
        Ok(Ok(())) => Ok(format!("browser reached {}", url)),
        Ok(Err(e)) => Err(e),
        Err(payload) => Err(AppError::internal(format!(
            "browser probe panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writable_output_dir_passes() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out");
        let detail = check_output_dir(&nested).unwrap();
        assert!(detail.contains("writable"));
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn blocked_output_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(check_output_dir(&file).is_err());
    }

    #[tokio::test]
    async fn listener_check_reaches_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let detail = check_listener(&address, Duration::from_secs(2)).await.unwrap();
        assert!(detail.contains(&address));
    }

    #[tokio::test]
    async fn listener_check_reports_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = check_listener(&address, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, AppError::Connection { .. }));
    }

    #[tokio::test]
    async fn timed_probe_records_failures() {
        let result = timed("always fails", async { Err(AppError::internal("nope")) }).await;
        assert!(!result.passed);
        assert!(result.detail.contains("nope"));

        let result = timed("passes", async { Ok("fine".to_string()) }).await;
        assert!(result.passed);
    }
}
