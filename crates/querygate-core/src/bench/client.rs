//! Client for the externally hosted pipeline the harness drives.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub payload: Value,
}

impl ApiResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn items(&self) -> Option<&Vec<Value>> {
        self.payload.get("items").and_then(Value::as_array)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunOptions {
    pub max_rows: u64,
    pub timeout_ms: u64,
    #[serde(rename = "llm_provider", skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Transport failures are `Err`; any HTTP status is an `Ok(ApiResponse)`.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    async fn list_data_sources(&self) -> anyhow::Result<ApiResponse>;
    async fn create_data_source(
        &self,
        name: &str,
        connection_ref: &str,
    ) -> anyhow::Result<ApiResponse>;
    async fn trigger_introspection(&self, data_source_id: &str) -> anyhow::Result<ApiResponse>;
    async fn list_schema_objects(&self, data_source_id: &str) -> anyhow::Result<ApiResponse>;
    async fn create_session(
        &self,
        data_source_id: &str,
        question: &str,
    ) -> anyhow::Result<ApiResponse>;
    async fn run_session(&self, session_id: &str, opts: &RunOptions)
        -> anyhow::Result<ApiResponse>;
    async fn fetch_metrics(&self) -> anyhow::Result<ApiResponse>;
    async fn publish_report(&self, report: &Value) -> anyhow::Result<ApiResponse>;
}

pub struct HttpPipelineClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpPipelineClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid pipeline url {:?}: {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("invalid pipeline url {:?}: not a base url", base_url.as_str());
        }
        Ok(Self { base_url, client })
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("pipeline url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> anyhow::Result<ApiResponse> {
        let url = self.url(path)?;
        let path = url.path().to_string();
        let mut req = self.client.request(method.clone(), url).query(query);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{} {} failed: {}", method, path, e))?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let payload = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
        };
        tracing::debug!(event = "bench.http", %method, path = %path, status);
        Ok(ApiResponse { status, payload })
    }
}

#[async_trait]
impl PipelineClient for HttpPipelineClient {
    async fn list_data_sources(&self) -> anyhow::Result<ApiResponse> {
        self.request(reqwest::Method::GET, &["v1", "data-sources"], &[], None)
            .await
    }

    async fn create_data_source(
        &self,
        name: &str,
        connection_ref: &str,
    ) -> anyhow::Result<ApiResponse> {
        let body = serde_json::json!({
            "name": name,
            "db_type": "postgres",
            "connection_ref": connection_ref,
        });
        self.request(reqwest::Method::POST, &["v1", "data-sources"], &[], Some(&body))
            .await
    }

    async fn trigger_introspection(&self, data_source_id: &str) -> anyhow::Result<ApiResponse> {
        let path = ["v1", "data-sources", data_source_id, "introspect"];
        self.request(reqwest::Method::POST, &path, &[], None).await
    }

    async fn list_schema_objects(&self, data_source_id: &str) -> anyhow::Result<ApiResponse> {
        self.request(
            reqwest::Method::GET,
            &["v1", "schema-objects"],
            &[("data_source_id", data_source_id)],
            None,
        )
        .await
    }

    async fn create_session(
        &self,
        data_source_id: &str,
        question: &str,
    ) -> anyhow::Result<ApiResponse> {
        let body = serde_json::json!({
            "data_source_id": data_source_id,
            "question": question,
        });
        self.request(reqwest::Method::POST, &["v1", "query", "sessions"], &[], Some(&body))
            .await
    }

    async fn run_session(
        &self,
        session_id: &str,
        opts: &RunOptions,
    ) -> anyhow::Result<ApiResponse> {
        let path = ["v1", "query", "sessions", session_id, "run"];
        let body = serde_json::to_value(opts)?;
        self.request(reqwest::Method::POST, &path, &[], Some(&body))
            .await
    }

    async fn fetch_metrics(&self) -> anyhow::Result<ApiResponse> {
        self.request(reqwest::Method::GET, &["v1", "observability", "metrics"], &[], None)
            .await
    }

    async fn publish_report(&self, report: &Value) -> anyhow::Result<ApiResponse> {
        self.request(
            reqwest::Method::POST,
            &["v1", "observability", "release-gates", "report"],
            &[],
            Some(report),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_use_wire_names() {
        let opts = RunOptions {
            max_rows: 2000,
            timeout_ms: 30000,
            provider: Some("gemini".into()),
            model: None,
        };
        assert_eq!(
            serde_json::to_value(&opts).unwrap(),
            serde_json::json!({"max_rows": 2000, "timeout_ms": 30000, "llm_provider": "gemini"})
        );
    }

    fn client(base: &str) -> HttpPipelineClient {
        HttpPipelineClient::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn ids_are_escaped_as_single_segments() {
        let url = client("http://localhost:8000")
            .url(&["v1", "query", "sessions", "a/b c?#%", "run"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/v1/query/sessions/a%2Fb%20c%3F%23%25/run"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        for base in ["http://gw.local/api", "http://gw.local/api/"] {
            let url = client(base)
                .url(&["v1", "data-sources", "3f2a-11", "introspect"])
                .unwrap();
            assert_eq!(url.as_str(), "http://gw.local/api/v1/data-sources/3f2a-11/introspect");
        }
    }

    #[test]
    fn non_base_urls_are_refused() {
        assert!(HttpPipelineClient::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
        assert!(HttpPipelineClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
