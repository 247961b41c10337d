//! In-memory fakes for the database and browser ports.
#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use report_relay::delivery::{
    BrowserLauncher, BrowserSession, DeliverySignals, DeliveryStage, ElementTarget, FormLocators,
    MailAccount, WaitPolicy,
};
use report_relay::extraction::{
    CellValue, ConnectionDescriptor, DataSource, ExtractionRequest, QueryResult, SourceSession,
};
use report_relay::types::{Encoding, FileExtension, FilePrefix, Secret, SheetName, ValidatedUrl};
use report_relay::AppError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://mail.test:5000";

// ─── Database ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct SourceCounters {
    pub connects: AtomicUsize,
    pub queries: AtomicUsize,
    pub closes: AtomicUsize,
}

impl SourceCounters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// What the fake database does when asked.
#[derive(Clone)]
pub enum SourceScript {
    Rows(QueryResult),
    RefuseConnection,
    FailQuery(&'static str),
    PanicInQuery,
}

pub struct MemorySource {
    pub script: SourceScript,
    pub counters: Arc<SourceCounters>,
}

impl MemorySource {
    pub fn new(script: SourceScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            counters: Arc::new(SourceCounters::default()),
        })
    }
}

struct MemorySession {
    script: SourceScript,
    counters: Arc<SourceCounters>,
}

impl DataSource for MemorySource {
    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn SourceSession>, AppError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if let SourceScript::RefuseConnection = self.script {
            return Err(AppError::Connection {
                target: descriptor.connect_string(),
                message: "ORA-12541: TNS:no listener".into(),
            });
        }
        Ok(Box::new(MemorySession {
            script: self.script.clone(),
            counters: self.counters.clone(),
        }))
    }
}

impl SourceSession for MemorySession {
    fn query(&mut self, _statement: &str) -> Result<QueryResult, AppError> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            SourceScript::Rows(result) => Ok(result.clone()),
            SourceScript::FailQuery(message) => Err(AppError::Query {
                message: message.to_string(),
            }),
            SourceScript::PanicInQuery => panic!("driver returned garbage"),
            SourceScript::RefuseConnection => unreachable!(),
        }
    }

    fn close(self: Box<Self>) -> Result<(), AppError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn id_name_result() -> QueryResult {
    QueryResult::new(
        vec!["ID".into(), "NAME".into()],
        vec![
            vec![CellValue::from("1"), CellValue::from("Alice")],
            vec![CellValue::from("2"), CellValue::from("Bob")],
        ],
    )
    .unwrap()
}

pub fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor {
        host: "localhost".into(),
        port: 1521,
        service_name: "orcl".into(),
        username: "system".into(),
        password: Secret::new("root").unwrap(),
        encoding: Encoding::default(),
    }
}

pub fn extraction_request(output_dir: &Path, prefix: &str) -> ExtractionRequest {
    ExtractionRequest {
        descriptor: descriptor(),
        statement: "SELECT id, name FROM patients ORDER BY id".into(),
        output_dir: output_dir.to_path_buf(),
        file_prefix: FilePrefix::new(prefix).unwrap(),
        extension: FileExtension::default(),
        sheet_name: SheetName::new("数据报表").unwrap(),
        started_at: chrono::Local::now(),
    }
}

// ─── Browser ────────────────────────────────────────────────────────

/// How the fake mail UI behaves.
#[derive(Clone)]
pub struct UiScript {
    /// Origin the fake UI is served from.
    pub base_url: &'static str,
    pub launch_fails: bool,
    /// Path the browser lands on after submitting the login form.
    pub after_login: &'static str,
    /// Markup shown after the send button is clicked; `None` shows nothing.
    pub after_send: Option<&'static str>,
    /// Markup of the composer before anything is sent.
    pub compose_page: &'static str,
    /// Path the browser lands on after sending.
    pub after_send_path: &'static str,
    pub panic_on_fill: bool,
}

impl Default for UiScript {
    fn default() -> Self {
        Self {
            base_url: BASE_URL,
            launch_fails: false,
            after_login: "/inbox",
            after_send: Some("<div class=\"flash\">邮件发送成功</div>"),
            compose_page: "<form><button type=\"submit\">发送</button></form>",
            after_send_path: "/compose",
            panic_on_fill: false,
        }
    }
}

#[derive(Default)]
pub struct UiState {
    pub url: String,
    /// Markup of the current page.
    pub page: String,
    pub present: HashSet<ElementTarget>,
    pub filled: Vec<(ElementTarget, String)>,
    pub attached: Vec<PathBuf>,
    pub clicks: Vec<(String, ElementTarget)>,
    pub sent: usize,
    pub launches: usize,
    pub quits: usize,
}

/// Launcher whose sessions all share one recorded [`UiState`].
pub struct FakeMailUi {
    pub script: UiScript,
    pub state: Arc<Mutex<UiState>>,
}

impl FakeMailUi {
    pub fn new(script: UiScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            state: Arc::new(Mutex::new(UiState::default())),
        })
    }

    pub fn quits(&self) -> usize {
        self.state.lock().unwrap().quits
    }

    pub fn sent(&self) -> usize {
        self.state.lock().unwrap().sent
    }

    pub fn filled(&self, target: &ElementTarget) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .filled
            .iter()
            .rev()
            .find(|(t, _)| t == target)
            .map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl BrowserLauncher for FakeMailUi {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError> {
        if self.script.launch_fails {
            return Err(AppError::Automation {
                message: "cannot start browser at http://localhost:4444: connection refused".into(),
            });
        }
        self.state.lock().unwrap().launches += 1;
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    script: UiScript,
    state: Arc<Mutex<UiState>>,
}

impl FakeSession {
    fn path<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.script.base_url).unwrap_or(url)
    }
}

/// What a browser would show of `markup`: scripts, styles and tags removed.
fn visible_text(markup: &str) -> String {
    let hidden = Regex::new(r"(?s)<(script|style)\b.*?</(script|style)>").unwrap();
    let tags = Regex::new(r"<[^>]*>").unwrap();
    let without_hidden = hidden.replace_all(markup, " ");
    tags.replace_all(&without_hidden, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.present.clear();
        state.page.clear();
        let locators = FormLocators::default();
        match self.path(url) {
            "/login" => {
                state.page = "<h1>登录</h1>".into();
                state.present.insert(locators.username);
                state.present.insert(locators.password);
            }
            "/compose" => {
                state.page = self.script.compose_page.into();
                state.present.insert(locators.recipient);
                state.present.insert(locators.subject);
                state.present.insert(locators.body);
                state.present.insert(locators.attachment);
            }
            _ => {}
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn page_text(&self) -> Result<String, AppError> {
        Ok(visible_text(&self.state.lock().unwrap().page))
    }

    async fn is_present(&self, target: &ElementTarget) -> Result<bool, AppError> {
        Ok(self.state.lock().unwrap().present.contains(target))
    }

    async fn fill(&self, target: &ElementTarget, text: &str) -> Result<(), AppError> {
        if self.script.panic_on_fill {
            panic!("element went stale mid-fill");
        }
        let mut state = self.state.lock().unwrap();
        if !state.present.contains(target) {
            return Err(AppError::Automation {
                message: format!("element {} not found", target),
            });
        }
        state.filled.push((target.clone(), text.to_string()));
        Ok(())
    }

    async fn attach(&self, target: &ElementTarget, path: &Path) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if !state.present.contains(target) {
            return Err(AppError::Automation {
                message: format!("element {} not found", target),
            });
        }
        state.attached.push(path.to_path_buf());
        Ok(())
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let path = self.path(&state.url).to_string();
        state.clicks.push((path.clone(), target.clone()));
        match path.as_str() {
            "/login" => {
                state.url = format!("{}{}", self.script.base_url, self.script.after_login);
                state.present.clear();
                state.page.clear();
            }
            "/compose" => {
                state.sent += 1;
                state.url = format!("{}{}", self.script.base_url, self.script.after_send_path);
                if let Some(markup) = self.script.after_send {
                    state.page = markup.to_string();
                }
            }
            other => {
                return Err(AppError::Automation {
                    message: format!("nothing to click on {}", other),
                })
            }
        }
        Ok(())
    }

    async fn quit(&self) -> Result<(), AppError> {
        self.state.lock().unwrap().quits += 1;
        Ok(())
    }
}

pub fn account() -> MailAccount {
    account_at(BASE_URL)
}

pub fn account_at(base_url: &str) -> MailAccount {
    MailAccount {
        base_url: ValidatedUrl::parse(base_url).unwrap(),
        login_path: "/login".into(),
        compose_path: "/compose".into(),
        username: "admin".into(),
        password: Secret::new("admin123").unwrap(),
    }
}

pub fn quick_wait() -> WaitPolicy {
    WaitPolicy {
        timeout: Duration::from_millis(150),
        poll_interval: Duration::from_millis(10),
    }
}

pub fn default_signals() -> DeliverySignals {
    DeliverySignals::from_markers(
        vec!["inbox".into(), "dashboard".into(), "main".into()],
        &account().login_url(),
        None,
        vec!["邮件发送成功".into(), "Success".into()],
    )
}

pub fn delivery_stage(ui: Arc<FakeMailUi>, signals: DeliverySignals) -> DeliveryStage {
    DeliveryStage::new(ui, account(), FormLocators::default(), signals, quick_wait())
}
