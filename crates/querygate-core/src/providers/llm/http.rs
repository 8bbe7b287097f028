use crate::errors::{GateError, GateResult};
use serde_json::Value;
use std::time::Duration;

/// Send a JSON POST and return the parsed body.
///
/// The whole exchange runs under `timeout`; on expiry the in-flight request is
/// dropped. Non-success statuses surface the provider's `error.message` when
/// the body carries one.
pub async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &Value,
    timeout: Duration,
) -> GateResult<Value> {
    let call = async {
        let resp = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| GateError::provider(provider, format!("request failed: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GateError::provider(provider, format!("failed to read response: {}", e)))?;
        let parsed: Option<Value> = if text.is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        if !status.is_success() {
            return Err(GateError::Provider {
                provider: provider.to_string(),
                message: format!(
                    "HTTP {} from provider: {}",
                    status.as_u16(),
                    error_detail(parsed.as_ref(), &text)
                ),
                status: Some(status.as_u16()),
            });
        }

        Ok(parsed.unwrap_or(Value::Null))
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GateError::provider(
            provider,
            format!("request timed out after {} ms", timeout.as_millis()),
        )),
    }
}

pub fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// `error.message` from a failed response body, else the raw body.
pub fn error_detail(parsed: Option<&Value>, text: &str) -> String {
    parsed
        .and_then(|v| v.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match non_empty(text) {
            Some(t) => t.to_string(),
            None => "unknown error".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_is_taken_from_the_body() {
        let body = json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}});
        assert_eq!(error_detail(Some(&body), "ignored"), "Incorrect API key provided");
    }

    #[test]
    fn falls_back_to_raw_text() {
        assert_eq!(error_detail(None, "502 Bad Gateway"), "502 Bad Gateway");
        assert_eq!(error_detail(Some(&json!({"error": "rate limited"})), "{\"error\":\"rate limited\"}"), "{\"error\":\"rate limited\"}");
        assert_eq!(error_detail(None, ""), "unknown error");
        assert_eq!(error_detail(None, "  \n"), "unknown error");
    }
}
