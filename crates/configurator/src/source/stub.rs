//! In-memory configuration source for tests and dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ConfigurationRequest, ConfigurationSource, Fetched, Payload};
use crate::error::SourceError;

/// Answers requests from canned responses keyed by application name and
/// records every request it receives.
///
/// Several responses queued for one application are returned in order; the
/// last one is repeated once the queue is down to a single entry.
#[derive(Default)]
pub struct StubSource {
    responses: Mutex<HashMap<String, VecDeque<Result<Fetched, SourceError>>>>,
    requests: Mutex<Vec<ConfigurationRequest>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `application`.
    pub fn respond(&self, application: &str, response: Result<Fetched, SourceError>) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(application.to_string())
                .or_default()
                .push_back(response);
        }
        self
    }

    /// Queues new content for `application`.
    pub fn updated(&self, application: &str, version: &str, content: &str, content_type: &str) -> &Self {
        self.respond(
            application,
            Ok(Fetched::Updated(Payload {
                content: content.as_bytes().to_vec(),
                configuration_version: version.to_string(),
                content_type: content_type.to_string(),
            })),
        )
    }

    /// Queues an "unchanged" answer for `application`.
    pub fn unchanged(&self, application: &str) -> &Self {
        self.respond(application, Ok(Fetched::Unchanged))
    }

    /// Queues a failure for `application`.
    pub fn failing(&self, application: &str, error: SourceError) -> &Self {
        self.respond(application, Err(error))
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ConfigurationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConfigurationSource for StubSource {
    async fn get_configuration(
        &self,
        request: &ConfigurationRequest,
    ) -> Result<Fetched, SourceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| SourceError::Request("stub response table poisoned".to_string()))?;

        let queue = responses.get_mut(&request.application).ok_or_else(|| {
            SourceError::BadRequest(format!("no response stubbed for '{}'", request.application))
        })?;

        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        response.unwrap_or_else(|| {
            Err(SourceError::BadRequest(format!(
                "no response stubbed for '{}'",
                request.application
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(application: &str) -> ConfigurationRequest {
        ConfigurationRequest {
            application: application.to_string(),
            environment: "test".to_string(),
            profile: "test".to_string(),
            client_configuration_version: None,
            client_id: "id".to_string(),
        }
    }

    #[tokio::test]
    async fn test_queued_responses_then_repeat_last() {
        let stub = StubSource::new();
        stub.failing("app", SourceError::Timeout("slow".into()))
            .unchanged("app");

        assert!(stub.get_configuration(&request("app")).await.is_err());
        assert_eq!(
            stub.get_configuration(&request("app")).await,
            Ok(Fetched::Unchanged)
        );
        assert_eq!(
            stub.get_configuration(&request("app")).await,
            Ok(Fetched::Unchanged)
        );
        assert_eq!(stub.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_application_errors() {
        let stub = StubSource::new();
        let result = stub.get_configuration(&request("missing")).await;
        assert!(matches!(result, Err(SourceError::BadRequest(_))));
    }
}
