use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use site_serverless_core::contract::{HelloBody, JSON_CONTENT_TYPE};
use site_serverless_core::cors::{CorsPolicy, HttpMethod};

use crate::adapters::clock::Clock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// Answers every invocation; there is no error path.
///
/// `OPTIONS` gets the site CORS preflight answer, anything else gets the
/// greeting with the request path echoed verbatim.
pub fn handle_hello_event(event: &Value, clock: &dyn Clock) -> ApiGatewayResponse {
    if request_method(event) == Some(HttpMethod::Options) {
        return preflight_response(event);
    }

    let path = request_path(event);
    let body = HelloBody::new(path, clock.now());
    tracing::info!(
        component = "hello_handler",
        event = "request_answered",
        path = body.path.as_deref().unwrap_or_default(),
        path_present = body.path.is_some(),
    );

    ApiGatewayResponse {
        status_code: 200,
        headers: json!({ "content-type": JSON_CONTENT_TYPE }),
        body: serde_json::to_string(&body).expect("hello body should serialize"),
    }
}

fn preflight_response(event: &Value) -> ApiGatewayResponse {
    let origin = header(event, "origin");
    let preflight = CorsPolicy::site_default().preflight(origin);
    tracing::info!(
        component = "hello_handler",
        event = "preflight_answered",
        origin = origin.unwrap_or_default(),
    );

    let headers: Map<String, Value> = preflight
        .headers
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect();
    ApiGatewayResponse {
        status_code: preflight.status_code,
        headers: Value::Object(headers),
        body: String::new(),
    }
}

/// HTTP API payloads carry `rawPath`; REST-style payloads carry `path`.
fn request_path(event: &Value) -> Option<String> {
    event
        .get("rawPath")
        .and_then(Value::as_str)
        .or_else(|| event.get("path").and_then(Value::as_str))
        .map(str::to_string)
}

fn request_method(event: &Value) -> Option<HttpMethod> {
    event
        .pointer("/requestContext/http/method")
        .or_else(|| event.get("httpMethod"))
        .and_then(Value::as_str)
        .and_then(HttpMethod::parse)
}

fn header<'a>(event: &'a Value, name: &str) -> Option<&'a str> {
    event
        .get("headers")
        .and_then(Value::as_object)?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(
            Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0)
                .single()
                .expect("fixed time should be valid"),
        )
    }

    fn body_of(response: &ApiGatewayResponse) -> Value {
        serde_json::from_str(&response.body).expect("body should be json")
    }

    #[test]
    fn echoes_raw_path_with_fixed_shape() {
        let event = json!({"rawPath": "/hello", "requestContext": {"http": {"method": "GET"}}});
        let response = handle_hello_event(&event, &fixed_clock());

        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers["content-type"], "application/json");
        assert_eq!(
            body_of(&response),
            json!({
                "message": "Hello OP, from the backend",
                "path": "/hello",
                "time": "2026-02-14T09:30:00.000Z",
            })
        );
    }

    #[test]
    fn falls_back_to_rest_style_path() {
        let event = json!({"path": "/", "httpMethod": "GET"});
        let response = handle_hello_event(&event, &fixed_clock());
        assert_eq!(body_of(&response)["path"], "/");
    }

    #[test]
    fn null_raw_path_falls_back_to_rest_style_path() {
        let event = json!({"rawPath": null, "path": "/x", "httpMethod": "GET"});
        let response = handle_hello_event(&event, &fixed_clock());

        assert_eq!(response.status_code, 200);
        assert_eq!(body_of(&response)["path"], "/x");
    }

    #[test]
    fn non_string_raw_path_without_fallback_is_null() {
        let event = json!({"rawPath": 42});
        let response = handle_hello_event(&event, &fixed_clock());
        assert_eq!(body_of(&response)["path"], Value::Null);
    }

    #[test]
    fn missing_path_passes_through_as_null() {
        let response = handle_hello_event(&json!({}), &fixed_clock());

        assert_eq!(response.status_code, 200);
        assert_eq!(body_of(&response)["path"], Value::Null);
    }

    #[test]
    fn non_object_event_still_answers() {
        let event = json!("not an event");
        let response = handle_hello_event(&event, &fixed_clock());
        assert_eq!(response.status_code, 200);
    }

    #[test]
    fn options_returns_preflight_for_any_origin() {
        let event = json!({
            "rawPath": "/hello",
            "requestContext": {"http": {"method": "OPTIONS"}},
            "headers": {
                "Origin": "https://anywhere.example",
                "access-control-request-method": "GET"
            }
        });
        let response = handle_hello_event(&event, &fixed_clock());

        assert_eq!(response.status_code, 204);
        assert_eq!(response.headers["access-control-allow-origin"], "*");
        assert_eq!(response.headers["access-control-allow-methods"], "GET");
        assert!(response.body.is_empty());
    }
}
