//! Transactional messaging endpoints
//!
//! One HTTP endpoint per channel (email, SMS, WhatsApp). Each validates the
//! JSON body, hands a typed message to a [`Provider`] and maps provider
//! failures onto a small set of client-facing errors.

mod endpoint;
mod payload;
mod provider;

pub use endpoint::{EndpointRequest, MessagingEndpoint};
pub use payload::{EmailMessage, OutboundMessage, TextMessage, ValidationError};
pub use provider::{
    map_provider_error, DryRunProvider, FailureClass, Provider, ProviderError, Vendor,
};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::WhatsApp => "whatsapp",
        }
    }

    /// The vendor that carries this channel.
    pub fn vendor(&self) -> Vendor {
        match self {
            Channel::Email => Vendor::SendGrid,
            Channel::Sms | Channel::WhatsApp => Vendor::Twilio,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            "whatsapp" => Ok(Channel::WhatsApp),
            other => Err(format!("unknown channel '{}'", other)),
        }
    }
}

/// `[messaging]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    /// Value of `Access-Control-Allow-Origin`.
    pub allowed_origin: String,
    /// When set, requests must carry `Authorization: Bearer <token>`.
    pub auth_token: Option<String>,
    /// Hide provider error details from responses.
    pub production: bool,
    /// Sender used when an email payload has no `from`.
    pub email_from: String,
    /// Sender number for SMS and WhatsApp.
    pub sms_from: Option<String>,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            allowed_origin: "*".to_string(),
            auth_token: None,
            production: false,
            email_from: "noreply@petcare.local".to_string(),
            sms_from: None,
        }
    }
}
