//! In-memory service manager for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ServiceDef, ServiceManager};
use crate::error::ServiceError;

/// Records reload calls and fails the services it was told to fail.
#[derive(Debug, Default)]
pub struct RecordingServiceManager {
    failures: Mutex<HashMap<String, ServiceError>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every reload of `service` fail with `error` until [`Self::heal`].
    pub fn fail(&self, service: &str, error: ServiceError) -> &Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(service.to_string(), error);
        }
        self
    }

    pub fn heal(&self, service: &str) -> &Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(service);
        }
        self
    }

    /// Names of every service a reload was attempted for, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ServiceManager for RecordingServiceManager {
    async fn reload(&self, service: &ServiceDef) -> Result<(), ServiceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(service.name.clone());
        }

        let failure = self
            .failures
            .lock()
            .ok()
            .and_then(|failures| failures.get(&service.name).cloned());

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_and_heal() {
        let manager = RecordingServiceManager::new();
        let web = ServiceDef::new("web", vec![]);
        manager.fail(
            "web",
            ServiceError::UnitNotFound {
                unit: "web".to_string(),
            },
        );

        assert!(manager.reload(&web).await.is_err());
        manager.heal("web");
        assert!(manager.reload(&web).await.is_ok());
        assert_eq!(manager.calls(), vec!["web", "web"]);
    }
}
