//! HTTP handling for one messaging channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use edge_protocol::{HttpResponse, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::provider::map_provider_error;
use super::{Channel, MessagingSettings, OutboundMessage, Provider};

const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// An incoming HTTP request to a messaging endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRequest {
    #[serde(default = "default_method")]
    pub method: Method,
    /// Header names are matched case-insensitively.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

fn default_method() -> Method {
    Method::Post
}

impl EndpointRequest {
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Endpoint for a single channel.
pub struct MessagingEndpoint {
    channel: Channel,
    settings: MessagingSettings,
    provider: Arc<dyn Provider>,
}

impl MessagingEndpoint {
    pub fn new(channel: Channel, settings: MessagingSettings, provider: Arc<dyn Provider>) -> Self {
        Self {
            channel,
            settings,
            provider,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn handle(&self, request: &EndpointRequest) -> HttpResponse {
        let response = self.respond(request);
        self.with_cors(response)
    }

    fn respond(&self, request: &EndpointRequest) -> HttpResponse {
        match request.method {
            Method::Options => return HttpResponse::new(200, "ok"),
            Method::Post => {}
            other => {
                return HttpResponse::json(405, &json!({ "error": format!("Method {} not allowed", other) }))
                    .with_header("allow", ALLOWED_METHODS)
            }
        }

        if let Some(expected) = &self.settings.auth_token {
            let presented = request
                .header("authorization")
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim);
            if presented != Some(expected.as_str()) {
                warn!(channel = %self.channel, "rejected unauthenticated messaging request");
                return HttpResponse::json(401, &json!({ "error": "Unauthorized" }));
            }
        }

        let message = match OutboundMessage::parse(
            self.channel,
            &request.body,
            &self.settings.email_from,
            self.settings.sms_from.as_deref(),
        ) {
            Ok(message) => message,
            Err(e) => return HttpResponse::json(400, &json!({ "error": e.to_string() })),
        };

        match self.provider.send(&message) {
            Ok(id) => {
                info!(channel = %self.channel, id = %id, "message accepted by provider");
                let id_field = match self.channel {
                    Channel::Email => "messageId",
                    Channel::Sms | Channel::WhatsApp => "messageSid",
                };
                let mut body = json!({ "success": true });
                body[id_field] = json!(id);
                HttpResponse::json(200, &body)
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "provider rejected message");
                map_provider_error(self.channel, &e, self.settings.production)
            }
        }
    }

    fn with_cors(&self, response: HttpResponse) -> HttpResponse {
        response
            .with_header("access-control-allow-origin", self.settings.allowed_origin.clone())
            .with_header("access-control-allow-headers", ALLOWED_HEADERS)
            .with_header("access-control-allow-methods", ALLOWED_METHODS)
    }
}
