use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ServiceDef, ServiceManager};
use crate::error::ServiceError;

/// Reloads services through `systemctl`.
pub struct SystemdServiceManager {
    command: String,
}

impl Default for SystemdServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemdServiceManager {
    pub fn new() -> Self {
        Self {
            command: "systemctl".to_string(),
        }
    }

    /// Uses `command` instead of `systemctl`. It is invoked with the same
    /// arguments (`<verb> <unit>`).
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ServiceManager for SystemdServiceManager {
    async fn reload(&self, service: &ServiceDef) -> Result<(), ServiceError> {
        let verb = service.restart_mode.verb();
        log::debug!("Running {} {} {}", self.command, verb, service.unit);

        let output = Command::new(&self.command)
            .args([verb, service.unit.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ServiceError::Spawn {
                command: self.command.clone(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_systemctl_error(&service.unit, stderr.trim()))
    }
}

/// Maps `systemctl` stderr output to a specific error.
fn classify_systemctl_error(unit: &str, stderr: &str) -> ServiceError {
    let lower = stderr.to_lowercase();

    if lower.contains("not found") || lower.contains("not loaded") || lower.contains("no such unit")
    {
        return ServiceError::UnitNotFound {
            unit: unit.to_string(),
        };
    }

    if lower.contains("access denied")
        || lower.contains("permission denied")
        || lower.contains("interactive authentication required")
    {
        return ServiceError::PermissionDenied {
            unit: unit.to_string(),
            message: stderr.to_string(),
        };
    }

    let message = if stderr.is_empty() {
        "exited with a non-zero status".to_string()
    } else {
        stderr.to_string()
    };
    ServiceError::ReloadFailed {
        unit: unit.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_systemctl_error(
            "web.service",
            "Failed to reload web.service: Unit web.service not found.",
        );
        assert_eq!(
            err,
            ServiceError::UnitNotFound {
                unit: "web.service".to_string()
            }
        );
    }

    #[test]
    fn test_classify_permission() {
        let err = classify_systemctl_error(
            "web",
            "Failed to restart web.service: Interactive authentication required.",
        );
        assert!(matches!(err, ServiceError::PermissionDenied { .. }));
    }

    #[test]
    fn test_classify_other() {
        let err = classify_systemctl_error("web", "");
        assert_eq!(
            err,
            ServiceError::ReloadFailed {
                unit: "web".to_string(),
                message: "exited with a non-zero status".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reload_exit_status() {
        let service = ServiceDef::new("web", vec![]);

        let ok = SystemdServiceManager::with_command("true");
        assert!(ok.reload(&service).await.is_ok());

        let failing = SystemdServiceManager::with_command("false");
        assert!(matches!(
            failing.reload(&service).await,
            Err(ServiceError::ReloadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_reload_missing_command() {
        let manager = SystemdServiceManager::with_command("configurator-no-such-binary");
        let err = manager
            .reload(&ServiceDef::new("web", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Spawn { .. }));
    }
}
