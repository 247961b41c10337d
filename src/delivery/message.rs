// src/delivery/message.rs
//! Message composition from Handlebars templates.

use crate::constants::{DELIVERY_DATE_FORMAT, GENERATED_AT_FORMAT};
use crate::error::AppError;
use crate::types::RecipientList;
use chrono::{DateTime, Local};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

const SUBJECT_TEMPLATE: &str = "subject";
const BODY_TEMPLATE: &str = "body";

pub const DEFAULT_SUBJECT_TEMPLATE: &str = "{{subject_prefix}} - {{delivery_date}}";

pub const DEFAULT_BODY_TEMPLATE: &str = "您好！

附件为今日数据报表，请查收。

生成时间：{{generated_at}}

此邮件为系统自动发送，请勿回复。
";

/// What one delivery run sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryMessage {
    pub recipients: RecipientList,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

/// Subject and body template sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    pub subject: String,
    pub body: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            body: DEFAULT_BODY_TEMPLATE.to_string(),
        }
    }
}

/// Renders [`DeliveryMessage`]s. Templates are parsed once, up front.
#[derive(Debug)]
pub struct MessageComposer {
    handlebars: Handlebars<'static>,
    subject_prefix: String,
}

impl MessageComposer {
    pub fn new(templates: &MessageTemplates, subject_prefix: impl Into<String>) -> Result<Self, AppError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in [(SUBJECT_TEMPLATE, &templates.subject), (BODY_TEMPLATE, &templates.body)] {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| AppError::TemplateRenderError {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
        }

        Ok(Self {
            handlebars,
            subject_prefix: subject_prefix.into(),
        })
    }

    /// Composes the message for a run at `now`, attaching `attachment` when
    /// there is one.
    pub fn compose(
        &self,
        recipients: &RecipientList,
        attachment: Option<&Path>,
        now: DateTime<Local>,
    ) -> Result<DeliveryMessage, AppError> {
        let artifact_name = attachment
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let data = json!({
            "subject_prefix": self.subject_prefix,
            "delivery_date": now.format(DELIVERY_DATE_FORMAT).to_string(),
            "generated_at": now.format(GENERATED_AT_FORMAT).to_string(),
            "artifact_name": artifact_name,
        });

        let subject = self.render(SUBJECT_TEMPLATE, &data)?;
        let body = self.render(BODY_TEMPLATE, &data)?;

        Ok(DeliveryMessage {
            recipients: recipients.clone(),
            subject: subject.trim().to_string(),
            body,
            attachment: attachment.map(Path::to_path_buf),
        })
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, AppError> {
        self.handlebars
            .render(name, data)
            .map_err(|e| AppError::TemplateRenderError {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}
