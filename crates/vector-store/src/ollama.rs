use crate::embeddings::{ensure_dimension, EmbeddingProvider};
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Embedding provider backed by an Ollama server (`POST {base_url}/api/embed`).
#[derive(Clone, Debug)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    request_timeout: Duration,
    batch_timeout: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: EmbedInput<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbedInput<'a> {
    One(&'a str),
    Many(&'a [&'a str]),
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            dimension,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_timeouts(
        mut self,
        request_timeout: Duration,
        batch_timeout: Duration,
    ) -> Self {
        self.request_timeout = request_timeout;
        self.batch_timeout = batch_timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }

    async fn post(
        &self,
        input: EmbedInput<'_>,
        timeout: Duration,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let endpoint = self.endpoint();
        log::debug!("Embedding {expected} text(s) via {endpoint} (model: {})", self.model);

        let response = self
            .client
            .post(&endpoint)
            .timeout(timeout)
            .json(&EmbedRequest {
                model: &self.model,
                input,
            })
            .send()
            .await?
            .error_for_status()?;
        let body: EmbedResponse = response.json().await?;

        if body.embeddings.len() != expected {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Embedding endpoint returned {} vectors for {expected} input(s)",
                body.embeddings.len()
            )));
        }
        for vector in &body.embeddings {
            ensure_dimension(vector, self.dimension)?;
        }
        Ok(body.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.post(EmbedInput::Many(&texts), self.batch_timeout, texts.len())
            .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self
            .post(EmbedInput::One(text), self.request_timeout, 1)
            .await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one HTTP request with a canned response and hands back
    /// the raw request body.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if let Some(body_start) = find_body_start(&raw) {
                    let head = String::from_utf8_lossy(&raw[..body_start]).to_ascii_lowercase();
                    let length = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= body_start + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let body_start = find_body_start(&raw).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[body_start..]).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn find_body_start(raw: &[u8]) -> Option<usize> {
        raw.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
    }

    #[tokio::test]
    async fn embeds_single_text() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"embeddings":[[0.5,0.5,0.0]]}"#.to_string()).await;
        let embedder = OllamaEmbedder::new(base_url, "qwen3-embedding", 3).unwrap();

        let vector = embedder.embed("rule web allow").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.5, 0.0]);

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["model"], "qwen3-embedding");
        assert_eq!(sent["input"], "rule web allow");
    }

    #[tokio::test]
    async fn embeds_batch_as_array_input() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"embeddings":[[1.0,0.0],[0.0,1.0]]}"#.to_string(),
        )
        .await;
        let embedder = OllamaEmbedder::new(format!("{base_url}/"), "m", 2).unwrap();

        let vectors = embedder.embed_batch(vec!["a", "b"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["input"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let (base_url, _server) =
            serve_once("200 OK", r#"{"embeddings":[[1.0,0.0]]}"#.to_string()).await;
        let embedder = OllamaEmbedder::new(base_url, "m", 3).unwrap();
        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::InvalidDimension {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn rejects_vector_count_mismatch() {
        let (base_url, _server) =
            serve_once("200 OK", r#"{"embeddings":[[1.0,0.0]]}"#.to_string()).await;
        let embedder = OllamaEmbedder::new(base_url, "m", 2).unwrap();
        let err = embedder.embed_batch(vec!["a", "b"]).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::EmbeddingError(_)));
    }

    #[tokio::test]
    async fn surfaces_server_errors() {
        let (base_url, _server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":"model not loaded"}"#.to_string(),
        )
        .await;
        let embedder = OllamaEmbedder::new(base_url, "m", 2).unwrap();
        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::HttpError(_)));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "m", 2).unwrap();
        assert!(embedder.embed_batch(vec![]).await.unwrap().is_empty());
    }
}
