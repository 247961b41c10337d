// src/config.rs
use crate::constants::{DEFAULT_DATABASE_PORT, DEFAULT_ELEMENT_WAIT_SECS, DEFAULT_PROBE_QUERY, DEFAULT_WEBDRIVER_URL};
use crate::delivery::{FormLocators, MailAccount, MessageTemplates, WaitPolicy};
use crate::error::AppError;
use crate::extraction::{ConnectionDescriptor, ExtractionRequest};
use crate::types::{
    Encoding, FileExtension, FilePrefix, RecipientList, Secret, SheetName, ValidatedUrl, ValidationError,
};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `database.password`.
pub const DB_PASSWORD_ENV: &str = "REPORT_RELAY_DB_PASSWORD";
/// Environment variable that overrides `delivery.password`.
pub const MAIL_PASSWORD_ENV: &str = "REPORT_RELAY_MAIL_PASSWORD";

const MAX_WAIT_SECS: u64 = 600;

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "report-relay.toml")]
    pub config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Extract the report and deliver it (the scheduled daily job)
    Run {
        /// Print the run outcome as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Extract and render the report without delivering it
    Extract {
        /// Print the run outcome as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Probe the database, output directory and mail UI
    Check {
        /// Print the diagnostic report as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Command {
    pub fn json(&self) -> bool {
        match self {
            Self::Run { json } | Self::Extract { json } | Self::Check { json } => *json,
        }
    }
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

/// The configuration file as written on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub query: QuerySection,
    pub output: OutputSection,
    pub delivery: DeliverySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub service_name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuerySection {
    pub statement: String,
    #[serde(default = "default_report_name")]
    pub sheet_name: String,
    #[serde(default = "default_probe")]
    pub probe: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSection {
    pub dir: PathBuf,
    #[serde(default = "default_report_name")]
    pub file_prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliverySection {
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_compose_path")]
    pub compose_path: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    pub recipients: Vec<String>,
    #[serde(default = "default_report_name")]
    pub subject_prefix: String,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
    #[serde(default = "default_auth_markers")]
    pub auth_markers: Vec<String>,
    #[serde(default)]
    pub delivered_url_pattern: Option<String>,
    #[serde(default = "default_delivered_text")]
    pub delivered_text: Vec<String>,
    #[serde(default)]
    pub locators: FormLocators,
    #[serde(default)]
    pub templates: MessageTemplates,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingSection {
    pub file: Option<PathBuf>,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    DEFAULT_DATABASE_PORT
}
fn default_encoding() -> String {
    "UTF-8".to_string()
}
fn default_report_name() -> String {
    "数据报表".to_string()
}
fn default_probe() -> String {
    DEFAULT_PROBE_QUERY.to_string()
}
fn default_extension() -> String {
    ".xlsx".to_string()
}
fn default_login_path() -> String {
    "/login".to_string()
}
fn default_compose_path() -> String {
    "/compose".to_string()
}
fn default_webdriver_url() -> String {
    DEFAULT_WEBDRIVER_URL.to_string()
}
fn default_wait_secs() -> u64 {
    DEFAULT_ELEMENT_WAIT_SECS
}
fn default_auth_markers() -> Vec<String> {
    vec!["inbox".to_string(), "dashboard".to_string(), "main".to_string()]
}
fn default_delivered_text() -> Vec<String> {
    vec!["邮件发送成功".to_string(), "Success".to_string()]
}

impl ConfigFile {
    pub fn parse(content: &str, origin: &Path) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::ConfigParse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::MissingConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, path)
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Delivery settings, validated.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub account: MailAccount,
    pub recipients: RecipientList,
    pub subject_prefix: String,
    pub webdriver_url: ValidatedUrl,
    pub headless: bool,
    pub wait: WaitPolicy,
    pub auth_markers: Vec<String>,
    pub delivered_url: Option<Regex>,
    pub delivered_text: Vec<String>,
    pub locators: FormLocators,
    pub templates: MessageTemplates,
}

/// Resolved pipeline configuration, validated and ready to drive both stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub descriptor: ConnectionDescriptor,
    pub statement: String,
    pub probe_query: String,
    pub sheet_name: SheetName,
    pub output_dir: PathBuf,
    pub file_prefix: FilePrefix,
    pub extension: FileExtension,
    pub delivery: DeliveryConfig,
    pub log_file: PathBuf,
}

impl PipelineConfig {
    /// Loads `path` and resolves it against the process environment.
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let file = ConfigFile::load(path)?;
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Validates `file`. `env` supplies secret overrides.
    pub fn resolve(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let ConfigFile {
            database,
            query,
            output,
            delivery,
            logging,
        } = file;

        let db_password = secret(env(DB_PASSWORD_ENV), database.password, "database.password", DB_PASSWORD_ENV)?;
        let mail_password = secret(env(MAIL_PASSWORD_ENV), delivery.password, "delivery.password", MAIL_PASSWORD_ENV)?;

        if database.service_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("database.service_name").into());
        }
        if database.username.trim().is_empty() {
            return Err(ValidationError::EmptyField("database.username").into());
        }
        if query.statement.trim().is_empty() {
            return Err(ValidationError::EmptyField("query.statement").into());
        }

        let descriptor = ConnectionDescriptor {
            host: database.host,
            port: database.port,
            service_name: database.service_name,
            username: database.username,
            password: db_password,
            encoding: Encoding::new(database.encoding)?,
        };

        if !(1..=MAX_WAIT_SECS).contains(&delivery.wait_secs) {
            return Err(ValidationError::OutOfBounds {
                value: delivery.wait_secs,
                min: 1,
                max: MAX_WAIT_SECS,
            }
            .into());
        }

        let delivered_url = delivery
            .delivered_url_pattern
            .map(|pattern| {
                Regex::new(&pattern).map_err(|e| ValidationError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let delivery = DeliveryConfig {
            account: MailAccount {
                base_url: ValidatedUrl::parse(&delivery.base_url)?,
                login_path: delivery.login_path,
                compose_path: delivery.compose_path,
                username: delivery.username,
                password: mail_password,
            },
            recipients: RecipientList::new(delivery.recipients)?,
            subject_prefix: delivery.subject_prefix,
            webdriver_url: ValidatedUrl::parse(&delivery.webdriver_url)?,
            headless: delivery.headless,
            wait: WaitPolicy::with_timeout(Duration::from_secs(delivery.wait_secs)),
            auth_markers: delivery.auth_markers,
            delivered_url,
            delivered_text: delivery.delivered_text,
            locators: delivery.locators,
            templates: delivery.templates,
        };

        Ok(Self {
            descriptor,
            statement: query.statement.trim().to_string(),
            probe_query: query.probe,
            sheet_name: SheetName::new(query.sheet_name)?,
            output_dir: output.dir,
            file_prefix: FilePrefix::new(output.file_prefix)?,
            extension: FileExtension::new(output.extension)?,
            delivery,
            log_file: logging
                .file
                .unwrap_or_else(|| std::env::temp_dir().join("report-relay.log")),
        })
    }

    /// The extraction inputs for a run started at `started_at`.
    pub fn extraction_request(&self, started_at: DateTime<Local>) -> ExtractionRequest {
        ExtractionRequest {
            descriptor: self.descriptor.clone(),
            statement: self.statement.clone(),
            output_dir: self.output_dir.clone(),
            file_prefix: self.file_prefix.clone(),
            extension: self.extension.clone(),
            sheet_name: self.sheet_name.clone(),
            started_at,
        }
    }
}

/// The environment wins over the file; one of the two must be set.
fn secret(
    from_env: Option<String>,
    from_file: Option<String>,
    key: &str,
    env_name: &str,
) -> Result<Secret, AppError> {
    match from_env.filter(|v| !v.is_empty()).or(from_file) {
        Some(value) => Ok(Secret::new(value)?),
        None => Err(AppError::MissingConfiguration(format!(
            "{} is not set (set it in the file or via {})",
            key, env_name
        ))),
    }
}
