//! HTTP configuration source speaking the AppConfig-style `GetConfiguration` API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, Url};

use super::{ConfigurationRequest, ConfigurationSource, Fetched, Payload};
use crate::error::SourceError;

/// Response header carrying the version of the returned configuration.
pub const VERSION_HEADER: &str = "Configuration-Version";

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of an error body kept in errors, to keep logs legible.
const MAX_ERROR_BODY_LENGTH: usize = 200;

pub struct HttpConfigurationSource {
    client: Client,
    base_url: Url,
}

impl HttpConfigurationSource {
    /// Creates a source for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::BadRequest(format!("Invalid source URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Builds the request URL for `request`.
    pub fn endpoint(&self, request: &ConfigurationRequest) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::BadRequest(format!("Source URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend([
                "applications",
                request.application.as_str(),
                "environments",
                request.environment.as_str(),
                "configurations",
                request.profile.as_str(),
            ]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &request.client_id);
            if let Some(version) = &request.client_configuration_version {
                query.append_pair("client_configuration_version", version);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl ConfigurationSource for HttpConfigurationSource {
    async fn get_configuration(
        &self,
        request: &ConfigurationRequest,
    ) -> Result<Fetched, SourceError> {
        let url = self.endpoint(request)?;
        debug!("Fetching configuration from {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(e.to_string())
            } else {
                SourceError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let headers = response.headers().clone();
        let content = response
            .bytes()
            .await
            .map_err(|e| SourceError::Request(format!("Failed to read response body: {}", e)))?;

        if content.is_empty() {
            return Ok(Fetched::Unchanged);
        }

        let configuration_version = headers
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(SourceError::MissingVersion)?;
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        Ok(Fetched::Updated(Payload {
            content: content.to_vec(),
            configuration_version,
            content_type,
        }))
    }
}

fn classify_status(status: StatusCode, body: &str) -> SourceError {
    let body = if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    };

    if status == StatusCode::BAD_REQUEST {
        SourceError::BadRequest(body)
    } else {
        SourceError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(version: Option<&str>) -> ConfigurationRequest {
        ConfigurationRequest {
            application: "my app".to_string(),
            environment: "prod".to_string(),
            profile: "main".to_string(),
            client_configuration_version: version.map(str::to_string),
            client_id: "abc".to_string(),
        }
    }

    #[test]
    fn test_endpoint_includes_version_hint() {
        let source =
            HttpConfigurationSource::new("http://localhost:2772/", Duration::from_secs(5)).unwrap();

        let url = source.endpoint(&request(Some("7"))).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:2772/applications/my%20app/environments/prod/configurations/main?client_id=abc&client_configuration_version=7"
        );
    }

    #[test]
    fn test_endpoint_without_version_hint() {
        let source =
            HttpConfigurationSource::new("http://localhost:2772/base", Duration::from_secs(5))
                .unwrap();

        let url = source.endpoint(&request(None)).unwrap();
        assert_eq!(url.path(), "/base/applications/my%20app/environments/prod/configurations/main");
        assert_eq!(url.query(), Some("client_id=abc"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpConfigurationSource::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "nope"),
            SourceError::BadRequest(_)
        ));

        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, &"x".repeat(500));
        assert!(err.is_retryable());
        match err {
            SourceError::Status { status, body } => {
                assert_eq!(status, 503);
                assert!(body.ends_with("(truncated)"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
