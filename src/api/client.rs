use super::download::{package_file_name, write_stream};
use super::TaskBackend;
use crate::error::{extract_detail, ApiError};
use crate::model::{ClientConfig, SubmitReceipt, TaskSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP client for the processing service.
#[derive(Clone)]
pub(crate) struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&cfg.base_url)?;
        // Only connecting is bounded client-wide; API calls add a per-request
        // timeout and package downloads may run as long as the transfer needs.
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.request_timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            request_timeout: cfg.request_timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        join_segments(&self.base_url, segments)
    }

    async fn read_json<T: DeserializeOwned>(
        url: &Url,
        resp: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = resp.status();
        let body = resp.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                detail: extract_detail(&body),
            });
        }
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn submit(&self, input: &str) -> Result<SubmitReceipt, ApiError> {
        let url = self.endpoint(&["process"]);
        let resp = self
            .http
            .post(url.clone())
            .timeout(self.request_timeout)
            .form(&[("input", input)])
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::read_json(&url, resp).await
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskSnapshot, ApiError> {
        let url = self.endpoint(&["tasks", task_id]);
        let resp = self
            .http
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::read_json(&url, resp).await
    }

    async fn download(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let name = package_file_name(filename).ok_or_else(|| ApiError::Io {
            path: dest_dir.join(filename),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "result file name is not a plain file name",
            ),
        })?;
        let url = self.endpoint(&["download", filename]);
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                detail: extract_detail(&body),
            });
        }

        let dest = dest_dir.join(name);
        let bytes = write_stream(&dest, resp.bytes_stream()).await?;
        tracing::info!(path = %dest.display(), bytes, "package saved");
        Ok(dest)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim()).map_err(|_| ApiError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one.
fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Link to a finished package. Only constructed, never fetched here.
pub(crate) fn download_url(base_url: &str, filename: &str) -> String {
    match parse_base_url(base_url) {
        Ok(base) => join_segments(&base, &["download", filename]).to_string(),
        Err(_) => format!("{}/download/{}", base_url.trim_end_matches('/'), filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressPolicy;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.to_string(),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            user_agent: "stemsense-cli/test".into(),
            progress_policy: ProgressPolicy::Trust,
        }
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Read one HTTP/1.1 request and return "<request line>\n<body>".
    async fn read_request(sock: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = find_header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                let len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    let body = String::from_utf8_lossy(&buf[end + 4..end + 4 + len]);
                    let request_line = head.lines().next().unwrap_or_default();
                    return format!("{request_line}\n{body}");
                }
            }
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                return String::from_utf8_lossy(&buf).to_string();
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Serve one canned reply per connection and hand back the requests seen.
    async fn spawn_backend(
        replies: Vec<(u16, &'static str)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (code, body) in replies {
                let (mut sock, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut sock).await);
                let reply = format!(
                    "HTTP/1.1 {code} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(reply.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
            seen
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn submit_posts_form_field_and_reads_task_id() {
        let (base, server) = spawn_backend(vec![(
            200,
            r#"{"task_id":"t1","message":"Job submitted successfully"}"#,
        )])
        .await;
        let backend = HttpBackend::new(&config(&base)).unwrap();

        let receipt = backend.submit("https://youtu.be/abc123").await.unwrap();
        assert_eq!(receipt.task_id, "t1");

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("POST /process HTTP/1.1"));
        assert!(seen[0].ends_with("input=https%3A%2F%2Fyoutu.be%2Fabc123"));
    }

    #[tokio::test]
    async fn submit_error_carries_server_detail() {
        let (base, _server) =
            spawn_backend(vec![(503, r#"{"detail":"Workers are busy"}"#)]).await;
        let backend = HttpBackend::new(&config(&base)).unwrap();

        let err = backend.submit("song name").await.unwrap_err();
        assert_eq!(err.detail(), Some("Workers are busy"));
        assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn task_status_reads_completed_snapshot() {
        let (base, server) = spawn_backend(vec![(
            200,
            r#"{"task_id":"t1","status":"completed","result_file":"t1.zip","error":null,"created_at":"2024-05-01 10:00:00"}"#,
        )])
        .await;
        let backend = HttpBackend::new(&config(&base)).unwrap();

        let snap = backend.task_status("t1").await.unwrap();
        assert_eq!(snap.status, "completed");
        assert_eq!(snap.result_file.as_deref(), Some("t1.zip"));

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /tasks/t1 HTTP/1.1"));
    }

    #[tokio::test]
    async fn task_status_rejects_non_json_body() {
        let (base, _server) = spawn_backend(vec![(200, "not json")]).await;
        let backend = HttpBackend::new(&config(&base)).unwrap();

        let err = backend.task_status("t1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn download_url_joins_under_base_path() {
        assert_eq!(
            download_url("http://localhost:8000", "t1.zip"),
            "http://localhost:8000/download/t1.zip"
        );
        assert_eq!(
            download_url("https://stems.example.com/api/", "My Song.zip"),
            "https://stems.example.com/api/download/My%20Song.zip"
        );
    }

    #[test]
    fn base_url_must_be_http() {
        assert!(HttpBackend::new(&config("ftp://example.com")).is_err());
        assert!(HttpBackend::new(&config("localhost:8000")).is_err());
        assert!(HttpBackend::new(&config("http://localhost:8000/")).is_ok());
    }
}
