//! Thin HTTP wrapper used by the one-shot vendor drivers (Roku ECP and the
//! other request/response protocols). Non-2xx statuses surface as errors so
//! callers can treat every response body as a success payload.

use std::time::Duration;

use crate::error::RemoteError;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn get(&self, url: &str) -> Result<String, RemoteError> {
        let response = self.client.get(url).send().await?;
        Self::validate(&response)?;
        Ok(response.text().await?)
    }

    pub async fn post(&self, url: &str, body: Option<String>) -> Result<String, RemoteError> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await?;
        Self::validate(&response)?;
        Ok(response.text().await?)
    }

    fn validate(response: &reqwest::Response) -> Result<(), RemoteError> {
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Network(format!("HTTP {}", status.as_u16())));
        }
        Ok(())
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        // reqwest::Client::builder only fails on TLS backend misconfiguration;
        // fall back to the stock client in that case.
        Self::new(Duration::from_secs(5)).unwrap_or(Self {
            client: reqwest::Client::new(),
        })
    }
}
