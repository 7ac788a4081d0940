//! OpenAI-compatible API endpoint shared by chat, STT and TTS clients

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::{Error, Result};

/// Base URL plus optional bearer key
#[derive(Debug)]
pub struct Endpoint {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl Endpoint {
    /// Create an endpoint rooted at `base_url` (e.g. `http://localhost:8080/v1`)
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("invalid API base URL {base_url:?}: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    /// Full URL for a path relative to the base (e.g. `chat/completions`)
    ///
    /// # Errors
    ///
    /// Returns error if the joined URL is invalid
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("invalid API path {path:?}: {e}")))
    }

    /// Start a POST request with authorization applied
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid
    pub fn post(&self, path: &str) -> Result<reqwest::RequestBuilder> {
        let request = self.client.post(self.url(path)?);
        Ok(match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        })
    }
}

/// Read an error body from a non-success response into a message
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = %status, body = %body, "API error");
    format!("{status}: {body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_under_versioned_base() {
        let endpoint = Endpoint::new("http://localhost:8080/v1", None).unwrap();
        assert_eq!(
            endpoint.url("chat/completions").unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );

        let endpoint = Endpoint::new("https://api.example.com/v1///", None).unwrap();
        assert_eq!(
            endpoint.url("/audio/speech").unwrap().as_str(),
            "https://api.example.com/v1/audio/speech"
        );
    }

    #[test]
    fn rejects_garbage_url() {
        let err = Endpoint::new("not a url", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
