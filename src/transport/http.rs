//! HTTP transport for the collector endpoint.

use super::{Transport, TransportError};
use crate::config::{ConfigError, TrackerConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

/// Posts JSON payloads to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpTransport {
    /// Create a transport from the tracker configuration.
    pub fn new(config: &TrackerConfig) -> Result<Self, ConfigError> {
        let endpoint =
            reqwest::Url::parse(config.endpoint.trim()).map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "headers",
                    reason: format!("'{name}': {e}"),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
                    field: "headers",
                    reason: format!("'{name}': {e}"),
                })?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Transport(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    async fn post(
        client: reqwest::Client,
        endpoint: reqwest::Url,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let response = client
            .post(endpoint)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        Self::post(self.client.clone(), self.endpoint.clone(), payload.to_vec()).await
    }

    fn send_beacon(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let request = Self::post(self.client.clone(), self.endpoint.clone(), payload);
        let report = |result: Result<(), TransportError>| match result {
            Ok(()) => tracing::debug!("Beacon delivered"),
            Err(e) => tracing::warn!(error = %e, "Beacon delivery failed"),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { report(request.await) });
            }
            Err(_) => {
                // No runtime to borrow: send from a short-lived thread of our own.
                std::thread::Builder::new()
                    .name("synheart-beacon".to_string())
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(runtime) => report(runtime.block_on(request)),
                            Err(e) => tracing::warn!(error = %e, "Failed to create beacon runtime"),
                        }
                    })
                    .map_err(|e| TransportError::Network(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_header() {
        let mut config = TrackerConfig::new("https://collect.example.com/v1/events");
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ConfigError::InvalidValue {
                field: "headers",
                ..
            })
        ));
    }

    #[test]
    fn test_new_keeps_endpoint() {
        let config = TrackerConfig::new("https://collect.example.com/v1/events");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint().path(), "/v1/events");
    }
}
