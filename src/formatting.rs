// src/formatting.rs

use crate::core::{Alert, AlertBatch, RenderedMessage};
use handlebars::Handlebars;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The template every alert message is rendered with.
pub const MESSAGE_TEMPLATE: &str = "message-template";

const BUILTIN_MESSAGE_TEMPLATE: &str = "{{{header}}} <i>{{status}}</i>
Message: <blockquote>{{summary}}</blockquote>
---
<blockquote>{{description}}</blockquote>
<a href=\"{{generator_url}}\">Metric that caused alert</a>";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register template '{name}': {source}")]
    Register {
        name: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("template directory {0} does not define '{MESSAGE_TEMPLATE}'")]
    MissingMessageTemplate(String),
}

/// Rendering a single alert failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to render alert message: {0}")]
pub struct FormatError(#[from] Box<handlebars::RenderError>);

/// Maps a severity label to its icon.
pub fn severity_icon(severity: &str) -> Option<&'static str> {
    match severity {
        "warning" => Some("⚠️"),
        "info" => Some("ℹ️"),
        "critical" => Some("⛔"),
        _ => None,
    }
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// The fields a message template can reference.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComposedAlert {
    /// Title-cased severity for known severities, the raw label otherwise.
    pub severity: String,
    /// Empty for unknown severities.
    pub severity_icon: String,
    /// `"{icon} <b>{severity}</b> {icon}"`, or the raw label for unknown severities.
    pub header: String,
    pub status: String,
    pub summary: String,
    pub description: String,
    pub generator_url: String,
}

impl ComposedAlert {
    pub fn new(alert: &Alert, status: &str) -> Self {
        let raw = alert.labels.severity.as_str();
        let (severity, severity_icon, header) = match severity_icon(raw) {
            Some(icon) => {
                let label = title_case(raw);
                let header = format!(
                    "{icon} <b>{}</b> {icon}",
                    handlebars::html_escape(&label)
                );
                (label, icon.to_string(), header)
            }
            None => (
                raw.to_string(),
                String::new(),
                handlebars::html_escape(raw),
            ),
        };

        Self {
            severity,
            severity_icon,
            header,
            status: status.to_string(),
            summary: alert.annotations.summary.clone(),
            description: alert.annotations.description.clone(),
            generator_url: alert.generator_url.clone(),
        }
    }
}

/// A registry of message templates.
///
/// Field values are HTML-escaped on render, as messages are sent with HTML
/// parse mode.
pub struct MessageTemplates {
    registry: Handlebars<'static>,
}

impl MessageTemplates {
    /// The default layout, used when no template directory is configured.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry
            .register_template_string(MESSAGE_TEMPLATE, BUILTIN_MESSAGE_TEMPLATE)
            .map_err(|e| TemplateError::Register {
                name: MESSAGE_TEMPLATE.to_string(),
                source: Box::new(e),
            })?;
        Ok(Self { registry })
    }

    /// Registers every file in `dir` under its file stem.
    ///
    /// Subdirectories are skipped. The directory must provide a
    /// `message-template`.
    pub fn from_dir(dir: &Path) -> Result<Self, TemplateError> {
        let io_err = |source| TemplateError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);

        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path).map_err(io_err)?;
            registry
                .register_template_string(name, source)
                .map_err(|e| TemplateError::Register {
                    name: name.to_string(),
                    source: Box::new(e),
                })?;
        }

        if !registry.has_template(MESSAGE_TEMPLATE) {
            return Err(TemplateError::MissingMessageTemplate(
                dir.display().to_string(),
            ));
        }
        Ok(Self { registry })
    }

    fn render(&self, alert: &ComposedAlert) -> Result<String, FormatError> {
        self.registry
            .render(MESSAGE_TEMPLATE, alert)
            .map_err(|e| FormatError(Box::new(e)))
    }
}

/// Turns alert batches into per-alert chat messages.
pub struct AlertFormatter {
    templates: MessageTemplates,
}

impl AlertFormatter {
    pub fn new(templates: MessageTemplates) -> Self {
        Self { templates }
    }

    /// Lazily renders one message per alert, in input order.
    pub fn render<'a>(
        &'a self,
        batch: &'a AlertBatch,
    ) -> impl Iterator<Item = Result<RenderedMessage, FormatError>> + 'a {
        batch.alerts.iter().map(move |alert| -> Result<RenderedMessage, FormatError> {
            let composed = ComposedAlert::new(alert, &batch.status);
            let text = self.templates.render(&composed)?;
            Ok(RenderedMessage {
                severity: alert.labels.severity.clone(),
                text,
            })
        })
    }
}
