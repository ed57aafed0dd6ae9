//! HTTP fleet controller.
//!
//! Talks to the platform's replica endpoint over HTTP/1.1 with a bearer
//! token. Every request (connect, handshake, send, body read) is bounded by
//! one timeout.
//!
//! ```text
//! GET {api}/services/{ref}/replicas   → {"replicas": n}
//! PUT {api}/services/{ref}/replicas   ← {"replicas": n}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use jobscale_core::is_path_segment;

use crate::controller::{FleetController, FleetError};

#[derive(Debug, Serialize, Deserialize)]
struct ReplicaBody {
    replicas: i64,
}

pub struct HttpFleetController {
    /// `host:port` of the fleet API.
    address: String,
    /// Path prefix of the API, without a trailing slash.
    base_path: String,
    token: String,
    timeout: Duration,
}

impl HttpFleetController {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, FleetError> {
        let uri: Uri = base_url
            .parse()
            .map_err(|e| FleetError::permanent(format!("invalid fleet API url {base_url:?}: {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(FleetError::permanent(format!(
                "unsupported fleet API scheme in {base_url:?}"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| FleetError::permanent(format!("fleet API url {base_url:?} has no host")))?;
        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        let base_path = uri.path().trim_end_matches('/').to_string();

        info!(%address, "fleet controller configured");
        Ok(Self {
            address,
            base_path,
            token: token.to_string(),
            timeout,
        })
    }

    fn replicas_path(&self, service_ref: &str) -> Result<String, FleetError> {
        if !is_path_segment(service_ref) {
            return Err(FleetError::permanent(format!(
                "service ref {service_ref:?} is not a plain path segment"
            )));
        }
        Ok(format!("{}/services/{service_ref}/replicas", self.base_path))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
    ) -> Result<(StatusCode, Bytes), FleetError> {
        let uri = format!("http://{}{path}", self.address);

        let result = tokio::time::timeout(self.timeout, async {
            let stream = tokio::net::TcpStream::connect(&self.address)
                .await
                .map_err(|e| FleetError::transient(format!("connect {}: {e}", self.address)))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| FleetError::transient(format!("handshake: {e}")))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method(method.clone())
                .uri(&uri)
                .header(http::header::HOST, &self.address)
                .header(http::header::AUTHORIZATION, format!("Bearer {}", self.token))
                .header(http::header::CONTENT_TYPE, "application/json")
                .header(http::header::USER_AGENT, "jobscale/0.1")
                .body(Full::new(body))
                .map_err(|e| FleetError::permanent(format!("build request: {e}")))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| FleetError::transient(format!("request: {e}")))?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| FleetError::transient(format!("read body: {e}")))?
                .to_bytes();
            Ok::<_, FleetError>((status, bytes))
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => {
                debug!(%uri, %method, "fleet request timed out");
                Err(FleetError::transient(format!(
                    "{method} {uri} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

/// Map a non-success status onto the retry taxonomy.
fn classify(status: StatusCode, body: &[u8]) -> FleetError {
    let message = format!("{status}: {}", String::from_utf8_lossy(body).trim());
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        FleetError::transient(message)
    } else {
        FleetError::permanent(message)
    }
}

#[async_trait]
impl FleetController for HttpFleetController {
    async fn replica_count(&self, service_ref: &str) -> Result<i64, FleetError> {
        let (status, body) = self
            .send(Method::GET, &self.replicas_path(service_ref)?, Bytes::new())
            .await?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        let parsed: ReplicaBody = serde_json::from_slice(&body)
            .map_err(|e| FleetError::permanent(format!("unexpected replica response: {e}")))?;
        Ok(parsed.replicas)
    }

    async fn set_replica_count(&self, service_ref: &str, replicas: u32) -> Result<(), FleetError> {
        let body = serde_json::to_vec(&ReplicaBody {
            replicas: i64::from(replicas),
        })
        .map_err(|e| FleetError::permanent(e.to_string()))?;

        let (status, resp) = self
            .send(Method::PUT, &self.replicas_path(service_ref)?, Bytes::from(body))
            .await?;
        if !status.is_success() {
            let err = classify(status, &resp);
            warn!(service = %service_ref, replicas, error = %err, "fleet rejected replica update");
            return Err(err);
        }
        Ok(())
    }
}
