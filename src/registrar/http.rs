//! HTTP registration of the VoIP push token

use anyhow::{Context, Result};
use url::Url;

/// Posts push tokens to a registration endpoint.
pub struct HttpRegistrar {
    http: reqwest::Client,
    url: Url,
    auth: Option<String>,
}

impl HttpRegistrar {
    pub fn new(url: Url, auth: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            auth,
        }
    }

    /// Register `token` for VoIP pushes. An empty token unregisters the device.
    pub async fn register(&self, token: &str) -> Result<()> {
        let payload = serde_json::json!({
            "registrationId": uuid::Uuid::new_v4().to_string(),
            "pushType": "voip",
            "pushToken": token,
        });

        tracing::info!(
            "Reporting push token to {} ({})",
            self.url,
            if token.is_empty() { "unregister" } else { "register" }
        );

        let mut req = self.http.post(self.url.clone()).json(&payload);
        if let Some(ref auth) = self.auth {
            req = req.bearer_auth(auth);
        }

        let resp = req.send().await.context("Registrar POST failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Registrar returned {}: {}", status, body);
        }
        tracing::info!("Push token registration succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering with `status_line`; returns the request text.
    async fn serve_once(status_line: &'static str) -> (Url, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut req = String::new();
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                req.push_str(&String::from_utf8_lossy(&buf[..n]));
                if n == 0 || (req.contains("\"pushToken\"") && req.trim_end().ends_with('}')) {
                    break;
                }
            }
            let resp = format!("{}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok", status_line);
            sock.write_all(resp.as_bytes()).await.unwrap();
            req
        });
        let url = Url::parse(&format!("http://{}/push/register", addr)).unwrap();
        (url, handle)
    }

    #[tokio::test]
    async fn test_register_posts_token() {
        let (url, server) = serve_once("HTTP/1.1 200 OK").await;
        let registrar = HttpRegistrar::new(url, Some("secret".into()));
        registrar.register("0aff10").await.unwrap();

        let req = server.await.unwrap();
        assert!(req.starts_with("POST /push/register"));
        assert!(req.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(req.contains("\"pushToken\":\"0aff10\""));
    }

    #[tokio::test]
    async fn test_register_surfaces_http_errors() {
        let (url, server) = serve_once("HTTP/1.1 503 Service Unavailable").await;
        let registrar = HttpRegistrar::new(url, None);
        let err = registrar.register("").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        server.await.unwrap();
    }
}
