//! Delivery providers and error mapping.

use std::fmt;

use edge_protocol::HttpResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{Channel, OutboundMessage};

/// Third-party delivery vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    SendGrid,
    Twilio,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::SendGrid => f.write_str("SendGrid"),
            Vendor::Twilio => f.write_str("Twilio"),
        }
    }
}

/// A rejection reported by a vendor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{vendor} error: {message}")]
pub struct ProviderError {
    pub vendor: Vendor,
    /// Vendor error code (Twilio numeric codes).
    pub code: Option<u32>,
    /// HTTP status the vendor answered with.
    pub status: Option<u16>,
    /// Offending field, when the vendor names one.
    pub field: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn twilio(code: u32, message: impl Into<String>) -> Self {
        Self {
            vendor: Vendor::Twilio,
            code: Some(code),
            status: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn sendgrid(status: u16, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            vendor: Vendor::SendGrid,
            code: None,
            status: Some(status),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Client-facing category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    InvalidDestination,
    PermissionDenied,
    MalformedBody,
    Unknown,
}

impl FailureClass {
    pub fn classify(error: &ProviderError) -> Self {
        match error.vendor {
            Vendor::Twilio => match error.code {
                Some(21211) | Some(21614) | Some(63003) => FailureClass::InvalidDestination,
                Some(21408) | Some(21610) | Some(63007) => FailureClass::PermissionDenied,
                Some(21602) => FailureClass::MalformedBody,
                _ => FailureClass::Unknown,
            },
            Vendor::SendGrid => match error.status {
                Some(400) if error.field.as_deref() == Some("to") => FailureClass::InvalidDestination,
                Some(400) => FailureClass::MalformedBody,
                Some(401) | Some(403) => FailureClass::PermissionDenied,
                _ => FailureClass::Unknown,
            },
        }
    }
}

/// Turn a provider failure into the endpoint response.
///
/// Unrecognised failures answer 500; the vendor message is attached only
/// outside production.
pub fn map_provider_error(channel: Channel, error: &ProviderError, production: bool) -> HttpResponse {
    let (status, message) = match FailureClass::classify(error) {
        FailureClass::InvalidDestination => (
            400,
            match channel {
                Channel::Email => "Invalid email address".to_string(),
                Channel::Sms | Channel::WhatsApp => "Invalid phone number".to_string(),
            },
        ),
        FailureClass::PermissionDenied => (
            403,
            format!("{} provider refused to deliver to this recipient", channel),
        ),
        FailureClass::MalformedBody => (400, "Malformed message body".to_string()),
        FailureClass::Unknown => {
            let mut body = json!({ "error": format!("Failed to send {}", channel) });
            if !production {
                body["details"] = json!(error.message);
            }
            if let Some(code) = error.code {
                body["code"] = json!(code);
            }
            return HttpResponse::json(500, &body);
        }
    };
    HttpResponse::json(status, &json!({ "error": message }))
}

/// Sends typed messages.
pub trait Provider: Send + Sync {
    /// Deliver a message, returning the vendor's message id.
    fn send(&self, message: &OutboundMessage) -> Result<String, ProviderError>;
}

/// Logs messages instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProvider;

impl Provider for DryRunProvider {
    fn send(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        let id = Uuid::new_v4().simple().to_string();
        let id = match message.channel() {
            Channel::Email => id,
            Channel::Sms | Channel::WhatsApp => format!("SM{}", id),
        };
        info!(channel = %message.channel(), id = %id, "dry run: message not delivered");
        Ok(id)
    }
}
