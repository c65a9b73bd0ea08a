//! Request body validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Channel;

/// A validated email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// A validated SMS or WhatsApp message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    pub to: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// A message ready for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum OutboundMessage {
    Email(EmailMessage),
    Sms(TextMessage),
    #[serde(rename = "whatsapp")]
    WhatsApp(TextMessage),
}

impl OutboundMessage {
    pub fn channel(&self) -> Channel {
        match self {
            OutboundMessage::Email(_) => Channel::Email,
            OutboundMessage::Sms(_) => Channel::Sms,
            OutboundMessage::WhatsApp(_) => Channel::WhatsApp,
        }
    }

    /// Parse and validate a request body for `channel`.
    pub fn parse(
        channel: Channel,
        body: &str,
        default_email_from: &str,
        default_sms_from: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ValidationError::NotJson(e.to_string()))?;
        if !value.is_object() {
            return Err(ValidationError::NotJson("body must be a JSON object".to_string()));
        }

        let mut missing = Vec::new();
        let to = recipients(&value);
        if to.is_empty() {
            missing.push("to");
        }

        match channel {
            Channel::Email => {
                let subject = text_field(&value, "subject");
                let html = text_field(&value, "html");
                let text = text_field(&value, "text");
                if subject.is_none() {
                    missing.push("subject");
                }
                if html.is_none() && text.is_none() {
                    missing.push("html or text");
                }
                if !missing.is_empty() {
                    return Err(ValidationError::MissingFields(missing));
                }
                Ok(OutboundMessage::Email(EmailMessage {
                    to,
                    subject: subject.unwrap_or_default(),
                    html,
                    text,
                    from: text_field(&value, "from").unwrap_or_else(|| default_email_from.to_string()),
                    reply_to: text_field(&value, "reply_to").or_else(|| text_field(&value, "replyTo")),
                }))
            }
            Channel::Sms | Channel::WhatsApp => {
                let body = text_field(&value, "message");
                if body.is_none() {
                    missing.push("message");
                }
                if !missing.is_empty() {
                    return Err(ValidationError::MissingFields(missing));
                }
                if to.len() > 1 {
                    return Err(ValidationError::TooManyRecipients {
                        channel,
                        count: to.len(),
                    });
                }
                let message = TextMessage {
                    to: to.into_iter().next().unwrap_or_default(),
                    body: body.unwrap_or_default(),
                    from: default_sms_from.map(str::to_string),
                };
                Ok(if channel == Channel::Sms {
                    OutboundMessage::Sms(message)
                } else {
                    OutboundMessage::WhatsApp(message)
                })
            }
        }
    }
}

/// Why a body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid JSON body: {0}")]
    NotJson(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{channel} accepts a single recipient, got {count}")]
    TooManyRecipients { channel: Channel, count: usize },
}

/// Non-empty trimmed string field.
fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `to` as a single string or an array of strings.
fn recipients(value: &Value) -> Vec<String> {
    match value.get("to") {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
