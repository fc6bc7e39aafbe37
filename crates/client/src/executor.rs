//! Request execution
//!
//! The transport seam and its reqwest-backed default. Executors own all
//! socket I/O: resolving the request against the base URL, sending it,
//! honoring cancellation, and converting failures into
//! [`TransportError`]. Non-success statuses become
//! [`TransportError::BadResponse`] with the raw body attached so
//! classification never touches the wire again.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use crate::config::{ClientConfig, ConfigError};
use crate::context::{RequestContext, Response};
use crate::error::TransportError;

/// Transport seam: send one prepared request
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Send `ctx` and produce the response or a transport failure
    ///
    /// # Errors
    /// Returns [`TransportError::BadResponse`] for non-success statuses,
    /// [`TransportError::Cancelled`] when the context's cancellation
    /// signal fires mid-flight, and the matching variant for timeouts and
    /// connection failures.
    async fn send(&self, ctx: &RequestContext) -> Result<Response, TransportError>;
}

/// reqwest-backed executor
///
/// The per-attempt timeout is enforced by the underlying client and
/// spans connect through the end of the response body. Context paths are
/// joined to the base URL on a single `/`, so a leading slash on the
/// path is optional.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: ReqwestClient,
    base_url: String,
}

impl HttpExecutor {
    /// Build an executor for the configured base URL and timeout
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client construction failed: {e}")))?;

        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn send(&self, ctx: &RequestContext) -> Result<Response, TransportError> {
        let url = format!("{}/{}", self.base_url, ctx.path.trim_start_matches('/'));

        let mut builder =
            self.client.request(ctx.method.clone(), &url).headers(ctx.headers.clone());
        if !ctx.query.is_empty() {
            builder = builder.query(&ctx.query);
        }
        if let Some(body) = &ctx.body {
            builder = builder.body(body.clone());
        }

        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            %url,
            attempt = ctx.retry_count() + 1,
            "sending request"
        );

        let attempt = async {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(map_reqwest_error)?;
            Ok::<_, TransportError>((status, headers, body))
        };

        let (status, headers, body) = match &ctx.cancellation {
            Some(token) => tokio::select! {
                () = token.cancelled() => return Err(TransportError::Cancelled),
                result = attempt => result?,
            },
            None => attempt.await?,
        };

        debug!(request_id = %ctx.request_id, %status, "received response");

        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::BadResponse {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(Response::new(status, headers, body.to_vec()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() {
        TransportError::ConnectionFailure(err.to_string())
    } else {
        TransportError::Unknown(err.to_string())
    }
}
