use async_trait::async_trait;

use super::protocol::CONTENT_TYPE;
use crate::error::TransportError;

/// Point-to-point request/response to a worker. `address` is the full URL the
/// worker advertised in the registry.
#[async_trait]
pub trait WorkerTransport: Send + Sync + 'static {
    async fn send_task(&self, address: &str, payload: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}

#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkerTransport for HttpTransport {
    async fn send_task(&self, address: &str, payload: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(address)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
