//! Messaging endpoints over a recording provider.

use std::sync::{Arc, Mutex};

use edge_protocol::Method;
use petcare_edge::messaging::{
    Channel, EndpointRequest, MessagingEndpoint, MessagingSettings, OutboundMessage, Provider,
    ProviderError,
};
use serde_json::json;

/// Records every message and answers with a canned result.
struct RecordingProvider {
    sent: Mutex<Vec<OutboundMessage>>,
    result: Result<String, ProviderError>,
}

impl RecordingProvider {
    fn accepting(id: &str) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            result: Ok(id.to_string()),
        })
    }

    fn failing(error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            result: Err(error),
        })
    }

    fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Provider for RecordingProvider {
    fn send(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        self.sent.lock().unwrap().push(message.clone());
        self.result.clone()
    }
}

fn endpoint(channel: Channel, provider: &Arc<RecordingProvider>) -> MessagingEndpoint {
    endpoint_with(channel, MessagingSettings::default(), provider)
}

fn endpoint_with(
    channel: Channel,
    settings: MessagingSettings,
    provider: &Arc<RecordingProvider>,
) -> MessagingEndpoint {
    let provider: Arc<dyn Provider> = Arc::clone(provider) as Arc<dyn Provider>;
    MessagingEndpoint::new(channel, settings, provider)
}

#[test]
fn test_missing_recipient_rejected_without_provider_call() {
    let provider = RecordingProvider::accepting("unused");
    let endpoint = endpoint(Channel::Email, &provider);

    let body = json!({ "subject": "Grooming reminder", "html": "<p>Tomorrow at 10</p>" });
    let response = endpoint.handle(&EndpointRequest::post(body.to_string()));

    assert_eq!(response.status, 400);
    let error = response.json_body().unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("to"), "error should name the missing field: {}", error);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_email_success_reports_message_id() {
    let provider = RecordingProvider::accepting("msg-123");
    let endpoint = endpoint(Channel::Email, &provider);

    let body = json!({
        "to": "owner@example.com",
        "subject": "Booking confirmed",
        "text": "See you Saturday"
    });
    let response = endpoint.handle(&EndpointRequest::post(body.to_string()));

    assert_eq!(response.status, 200);
    let json = response.json_body().unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["messageId"], "msg-123");

    let sent = provider.sent.lock().unwrap();
    match &sent[0] {
        OutboundMessage::Email(email) => {
            assert_eq!(email.to, vec!["owner@example.com".to_string()]);
            assert_eq!(email.from, "noreply@petcare.local");
        }
        other => panic!("expected email, got {:?}", other),
    }
}

#[test]
fn test_sms_success_reports_message_sid() {
    let provider = RecordingProvider::accepting("SM42");
    let endpoint = endpoint(Channel::Sms, &provider);

    let body = json!({ "to": "+15550100", "message": "Your vet visit is at 3pm" });
    let response = endpoint.handle(&EndpointRequest::post(body.to_string()));

    assert_eq!(response.status, 200);
    assert_eq!(response.json_body().unwrap()["messageSid"], "SM42");
}

#[test]
fn test_whatsapp_several_recipients_rejected() {
    let provider = RecordingProvider::accepting("unused");
    let endpoint = endpoint(Channel::WhatsApp, &provider);

    let body = json!({ "to": ["+15550100", "+15550101"], "message": "Pickup at 5pm" });
    let response = endpoint.handle(&EndpointRequest::post(body.to_string()));

    assert_eq!(response.status, 400);
    let error = response.json_body().unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("single recipient"), "{}", error);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_non_json_body_rejected() {
    let provider = RecordingProvider::accepting("unused");
    let endpoint = endpoint(Channel::WhatsApp, &provider);

    let response = endpoint.handle(&EndpointRequest::post("to=+15550100"));

    assert_eq!(response.status, 400);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_preflight_and_cors_headers() {
    let provider = RecordingProvider::accepting("unused");
    let settings = MessagingSettings {
        allowed_origin: "https://petcare.test".to_string(),
        ..MessagingSettings::default()
    };
    let endpoint = endpoint_with(Channel::Email, settings, &provider);

    let preflight = EndpointRequest {
        method: Method::Options,
        ..EndpointRequest::post("")
    };
    let response = endpoint.handle(&preflight);

    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("access-control-allow-origin"),
        Some("https://petcare.test")
    );
    assert!(response
        .header("access-control-allow-methods")
        .unwrap()
        .contains("POST"));
    assert_eq!(provider.calls(), 0);

    // Error responses carry CORS headers as well
    let rejected = endpoint.handle(&EndpointRequest::post("{}"));
    assert_eq!(rejected.status, 400);
    assert!(rejected.header("access-control-allow-origin").is_some());
}

#[test]
fn test_get_not_allowed() {
    let provider = RecordingProvider::accepting("unused");
    let endpoint = endpoint(Channel::Sms, &provider);

    let request = EndpointRequest {
        method: Method::Get,
        ..EndpointRequest::post("")
    };
    let response = endpoint.handle(&request);

    assert_eq!(response.status, 405);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_bearer_token_enforced_when_configured() {
    let provider = RecordingProvider::accepting("SM1");
    let settings = MessagingSettings {
        auth_token: Some("edge-secret".to_string()),
        ..MessagingSettings::default()
    };
    let endpoint = endpoint_with(Channel::Sms, settings, &provider);
    let body = json!({ "to": "+15550100", "message": "hi" }).to_string();

    let anonymous = endpoint.handle(&EndpointRequest::post(body.clone()));
    assert_eq!(anonymous.status, 401);

    let wrong = endpoint.handle(
        &EndpointRequest::post(body.clone()).with_header("Authorization", "Bearer nope"),
    );
    assert_eq!(wrong.status, 401);
    assert_eq!(provider.calls(), 0);

    let authorized = endpoint
        .handle(&EndpointRequest::post(body).with_header("Authorization", "Bearer edge-secret"));
    assert_eq!(authorized.status, 200);
    assert_eq!(provider.calls(), 1);
}

#[test]
fn test_invalid_phone_number_maps_to_400() {
    let provider = RecordingProvider::failing(ProviderError::twilio(21211, "invalid 'To' number"));
    let endpoint = endpoint(Channel::Sms, &provider);

    let body = json!({ "to": "12", "message": "hi" });
    let response = endpoint.handle(&EndpointRequest::post(body.to_string()));

    assert_eq!(response.status, 400);
    assert_eq!(response.json_body().unwrap()["error"], "Invalid phone number");
}

#[test]
fn test_unknown_failure_hides_details_in_production() {
    let error = ProviderError::sendgrid(502, None, "upstream exploded");
    let body = json!({ "to": "a@b.test", "subject": "s", "text": "t" }).to_string();

    let dev = RecordingProvider::failing(error.clone());
    let response = endpoint(Channel::Email, &dev).handle(&EndpointRequest::post(body.clone()));
    assert_eq!(response.status, 500);
    assert_eq!(response.json_body().unwrap()["details"], "upstream exploded");

    let prod = RecordingProvider::failing(error);
    let settings = MessagingSettings {
        production: true,
        ..MessagingSettings::default()
    };
    let response = endpoint_with(Channel::Email, settings, &prod).handle(&EndpointRequest::post(body));
    assert_eq!(response.status, 500);
    assert!(response.json_body().unwrap().get("details").is_none());
}
