//! The pipeline engine.
//!
//! Drives [`Memory`] through the stage table: compile once, then run the
//! refresh → apply → generate → reload cycle, sleeping `refresh_interval`
//! between cycles. Retryable stages are retried while the cycle's retry
//! budget lasts; a stage that fails for good switches the engine onto the
//! recovery track instead of aborting.

pub mod retry;
pub mod shutdown;
pub mod state;

use serde_json::json;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;
use crate::op::{describe, ErrorMap};

pub use shutdown::Shutdown;
pub use state::{NextState, RecoveryStage, Resume, Stage};

/// How a finished run should be reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Process exit status: 0 on a graceful stop, 1 otherwise.
    pub exit_status: u8,
    /// Lines for standard error.
    pub diagnostics: Vec<String>,
}

pub struct Configurator {
    memory: Memory,
    shutdown: Shutdown,
    error_op: Option<&'static str>,
    errors: ErrorMap,
    current_op: Option<&'static str>,
    recovery_errors: ErrorMap,
}

impl Configurator {
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            shutdown: Shutdown::new(),
            error_op: None,
            errors: ErrorMap::new(),
            current_op: None,
            recovery_errors: ErrorMap::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn into_memory(self) -> Memory {
        self.memory
    }

    /// Name of the operation whose failure is outstanding.
    pub fn error_op(&self) -> Option<&'static str> {
        self.error_op
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    /// Name of the recovery operation that failed, if recovery failed.
    pub fn current_op(&self) -> Option<&'static str> {
        self.current_op
    }

    pub fn recovery_errors(&self) -> &ErrorMap {
        &self.recovery_errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_recovery_errors(&self) -> bool {
        !self.recovery_errors.is_empty()
    }

    /// Summarizes outstanding failures and picks the exit status.
    pub fn outcome(&self) -> Outcome {
        let mut diagnostics = Vec::new();

        if self.has_errors() {
            diagnostics.push(format!(
                "Errored executing {}",
                self.error_op.unwrap_or("unknown")
            ));
            diagnostics.push(format!("Errors: {}", describe(&self.errors)));
        }
        if self.has_recovery_errors() {
            diagnostics.push(format!(
                "Errors recovering from error. Errored executing recovery {}",
                self.current_op.unwrap_or("unknown")
            ));
            diagnostics.push(format!("Errors: {}", describe(&self.recovery_errors)));
        }

        Outcome {
            exit_status: u8::from(!diagnostics.is_empty()),
            diagnostics,
        }
    }

    /// Runs until a graceful stop or an unrecoverable failure.
    pub async fn run(&mut self) {
        while !self.memory.next_state.is_terminal() {
            self.step().await;
        }
        info!(
            cycles = self.memory.run_count,
            state = ?self.memory.next_state,
            "Configurator stopped"
        );
    }

    /// Executes the state `next_state` points at and advances it.
    pub async fn step(&mut self) {
        match self.memory.next_state {
            NextState::Starting => {
                self.memory.reset_retries();
                self.memory.next_state = NextState::Running(Stage::CompileTemplates);
            }
            NextState::Running(stage) => self.run_stage(stage).await,
            NextState::Recovering { step, resume } => self.run_recovery(step, resume).await,
            NextState::Sleeping => self.end_cycle().await,
            NextState::Stopped | NextState::Failed => {}
        }
    }

    async fn run_stage(&mut self, stage: Stage) {
        let op = stage.operation();
        let span = info_span!("stage", op = op.name(), cycle = self.memory.run_count);
        let errors = op.execute(&mut self.memory).instrument(span).await;

        if errors.is_empty() {
            self.memory.next_state = NextState::after_success(stage);
            return;
        }

        if stage.is_retryable() && self.memory.retries_left > 0 && !self.shutdown.is_requested() {
            self.memory.retries_left -= 1;
            warn!(
                op = op.name(),
                retries_left = self.memory.retries_left,
                "Operation failed, retrying in {:?}: {}",
                self.memory.retry_wait,
                describe(&errors)
            );
            self.shutdown.sleep(self.memory.retry_wait).await;

            let implicated = retry::implicated_profiles(&self.memory, stage, &errors);
            if !implicated.is_empty() {
                let refresh_errors = retry::refresh_implicated(&mut self.memory, &implicated).await;
                if !refresh_errors.is_empty() {
                    debug!("Refresh before retry failed: {}", describe(&refresh_errors));
                }
            }
            return;
        }

        error!(op = op.name(), "Operation failed: {}", describe(&errors));
        self.error_op = Some(op.name());
        self.errors = errors;
        self.memory.next_state = NextState::on_failure(stage);
    }

    async fn run_recovery(&mut self, step: RecoveryStage, resume: Resume) {
        let op = step.operation();
        let span = info_span!("recovery", op = op.name(), cycle = self.memory.run_count);
        let errors = op.execute(&mut self.memory).instrument(span).await;

        if !errors.is_empty() {
            error!(
                op = op.name(),
                failed = ?self.error_op,
                "Recovery failed: {}",
                describe(&errors)
            );
            self.current_op = Some(op.name());
            self.recovery_errors = errors;
            self.memory.next_state = NextState::Failed;
            return;
        }

        let next = NextState::after_recovery_step(step, resume);
        if !next.is_recovering() {
            let failed = self.error_op.take().unwrap_or("unknown");
            let errors = std::mem::take(&mut self.errors);
            warn!(op = failed, "Recovered from failure: {}", describe(&errors));
            self.memory.log(
                LogLevel::Warning,
                "recovered",
                event_data(json!({
                    "operation": failed,
                    "errors": errors
                        .iter()
                        .map(|(name, list)| {
                            (name.clone(), list.iter().map(|e| e.to_string()).collect::<Vec<_>>())
                        })
                        .collect::<std::collections::BTreeMap<_, _>>(),
                })),
            );
        }
        self.memory.next_state = next;
    }

    async fn end_cycle(&mut self) {
        self.memory.run_count += 1;
        debug!(cycle = self.memory.run_count, "Cycle complete");

        if self.shutdown.is_requested() {
            self.memory.early_exit = true;
        }
        if self.memory.early_exit {
            self.memory.next_state = NextState::Stopped;
            return;
        }

        self.shutdown.sleep(self.memory.refresh_interval).await;
        if self.shutdown.is_requested() {
            self.memory.early_exit = true;
            self.memory.next_state = NextState::Stopped;
            return;
        }

        self.memory.reset_retries();
        self.memory.next_state = NextState::Running(Stage::CYCLE_START);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OperationError, TemplateError};
    use crate::op::record;
    use crate::op::testing::fixture;

    #[test]
    fn test_outcome_after_graceful_stop() {
        let engine = Configurator::new(fixture().memory);
        assert_eq!(
            engine.outcome(),
            Outcome {
                exit_status: 0,
                diagnostics: Vec::new()
            }
        );
    }

    #[test]
    fn test_outcome_reports_failure_and_recovery_failure() {
        let mut engine = Configurator::new(fixture().memory);
        engine.error_op = Some("GenerateAllTemplates");
        record(
            &mut engine.errors,
            "site",
            OperationError::from(TemplateError::ProfileNotApplied {
                profile: "web".into(),
            }),
        );
        engine.current_op = Some("RestoreGeneratedTemplates");
        record(
            &mut engine.recovery_errors,
            "site",
            OperationError::from(TemplateError::Write {
                path: "/run/site.conf".into(),
                message: "read-only file system".into(),
            }),
        );

        let outcome = engine.outcome();

        assert_eq!(outcome.exit_status, 1);
        assert_eq!(outcome.diagnostics.len(), 4);
        assert_eq!(outcome.diagnostics[0], "Errored executing GenerateAllTemplates");
        assert!(outcome.diagnostics[1].starts_with("Errors: {site: ["));
        assert_eq!(
            outcome.diagnostics[2],
            "Errors recovering from error. Errored executing recovery RestoreGeneratedTemplates"
        );
        assert!(outcome.diagnostics[3].contains("read-only file system"));
    }
}
