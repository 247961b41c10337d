// src/main.rs

use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use report_relay::config::{Command, CommandLineInput, PipelineConfig};
use report_relay::delivery::{DeliverySignals, DeliveryStage, MessageComposer, WebDriverLauncher};
use report_relay::diagnostics::{DiagnosticReport, Diagnostics};
use report_relay::extraction::{Extractor, OracleSource};
use report_relay::orchestrator::{Pipeline, PipelineRunOutcome};
use report_relay::pipeline::{DatabaseExtraction, MailDelivery};
use report_relay::{AppError, FailureKind};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}";

/// Sets up logging configuration.
fn setup_logging(verbose: bool, log_file_path: &Path) -> anyhow::Result<()> {
    let console_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let console_appender = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(log_file_path)?;

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(console_level)))
                .build("console", Box::new(console_appender)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(LevelFilter::Debug),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Wires the production stages: Oracle extraction and WebDriver delivery.
fn build_pipeline(config: &PipelineConfig) -> Result<Pipeline, AppError> {
    let extractor = Extractor::new(Arc::new(OracleSource));
    let extraction = DatabaseExtraction::new(extractor, config.extraction_request(chrono::Local::now()));

    let delivery = &config.delivery;
    let launcher = WebDriverLauncher::new(delivery.webdriver_url.as_str(), delivery.headless);
    let stage = DeliveryStage::new(
        Arc::new(launcher),
        delivery.account.clone(),
        delivery.locators.clone(),
        DeliverySignals::from_markers(
            delivery.auth_markers.clone(),
            &delivery.account.login_url(),
            delivery.delivered_url.clone(),
            delivery.delivered_text.clone(),
        ),
        delivery.wait,
    );
    let composer = MessageComposer::new(&delivery.templates, delivery.subject_prefix.clone())?;
    let mail = MailDelivery::new(stage, composer, delivery.recipients.clone());

    Ok(Pipeline::new(Arc::new(extraction), Arc::new(mail)))
}

fn build_diagnostics(config: &PipelineConfig) -> Diagnostics {
    let delivery = &config.delivery;
    Diagnostics {
        output_dir: config.output_dir.clone(),
        descriptor: config.descriptor.clone(),
        probe_query: config.probe_query.clone(),
        source: Arc::new(OracleSource),
        account: delivery.account.clone(),
        locators: delivery.locators.clone(),
        launcher: Arc::new(WebDriverLauncher::new(
            delivery.webdriver_url.as_str(),
            delivery.headless,
        )),
        wait: delivery.wait,
    }
}

fn print_outcome(outcome: &PipelineRunOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    if outcome.success {
        match &outcome.artifact {
            Some(path) if outcome.delivery_state.is_some() => {
                println!("✓ Report {} delivered", path.display())
            }
            Some(path) => println!("✓ Report saved to {}", path.display()),
            None => println!("✓ Run finished"),
        }
    } else if let Some(failure) = &outcome.failure {
        eprintln!(
            "✗ Run failed during {:?} at {} ({}): {}",
            outcome.stage_reached, failure.step, failure.kind, failure.message
        );
    }
    Ok(())
}

fn print_diagnostics(report: &DiagnosticReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for check in &report.checks {
        let mark = if check.passed { "✓" } else { "✗" };
        println!("{} {} ({} ms): {}", mark, check.name, check.duration_ms, check.detail);
    }
    Ok(())
}

async fn dispatch(command: &Command, config: &PipelineConfig) -> anyhow::Result<bool> {
    match command {
        Command::Run { json } => {
            let outcome = build_pipeline(config)?.execute().await;
            print_outcome(&outcome, *json)?;
            Ok(outcome.success)
        }
        Command::Extract { json } => {
            let outcome = build_pipeline(config)?.extract_only().await;
            print_outcome(&outcome, *json)?;
            Ok(outcome.success)
        }
        Command::Check { json } => {
            let report = build_diagnostics(config).run().await;
            print_diagnostics(&report, *json)?;
            Ok(report.all_passed())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CommandLineInput::parse();

    let config = match PipelineConfig::from_path(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = setup_logging(cli.verbose, &config.log_file) {
        eprintln!("✗ Could not initialize logging: {}", e);
        return ExitCode::from(2);
    }

    match dispatch(&cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            let configuration = e
                .downcast_ref::<AppError>()
                .is_some_and(|app| app.kind() == FailureKind::Configuration);
            ExitCode::from(if configuration { 2 } else { 1 })
        }
    }
}
