//! Isolated environment for running the engine end to end.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use configurator::engine::Configurator;
use configurator::logging::RecordingLogger;
use configurator::memory::Memory;
use configurator::service::RecordingServiceManager;
use configurator::source::StubSource;

pub struct TestHarness {
    temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub source: Arc<StubSource>,
    pub services: Arc<RecordingServiceManager>,
    pub logger: Arc<RecordingLogger>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = temp_dir.path().join("config");
        let runtime_dir = temp_dir.path().join("run");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            config_dir,
            runtime_dir,
            source: Arc::new(StubSource::new()),
            services: Arc::new(RecordingServiceManager::new()),
            logger: Arc::new(RecordingLogger::new()),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a file under the configuration directory.
    pub fn write_config(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.config_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create config subdir");
        }
        std::fs::write(&path, content).expect("Failed to write config file");
        path
    }

    /// Loads the configuration directory into memory wired to the stubs.
    /// Sleeps between cycles and retries are zero.
    pub fn memory(&self) -> Memory {
        let config = configurator::config::load(&self.config_dir).expect("Failed to load config");
        let mut memory = config
            .build_memory(self.source.clone(), self.services.clone())
            .with_logger(self.logger.clone())
            .with_runtime_directory(&self.runtime_dir)
            .with_refresh_interval(Duration::ZERO);
        memory.retry_wait = Duration::ZERO;
        memory
    }

    /// An engine that stops after one cycle.
    pub fn single_shot(&self) -> Configurator {
        Configurator::new(self.memory().with_early_exit(true))
    }

    /// An engine that keeps cycling until told otherwise.
    pub fn continuous(&self) -> Configurator {
        Configurator::new(self.memory())
    }

    pub fn read_output(&self, relative: &str) -> String {
        std::fs::read_to_string(self.runtime_dir.join(relative)).expect("Failed to read output")
    }
}

/// Steps `engine` until it has completed `cycles` cycles or reached a
/// terminal state.
pub async fn run_cycles(engine: &mut Configurator, cycles: u64) {
    while engine.memory().run_count < cycles && !engine.memory().next_state.is_terminal() {
        engine.step().await;
    }
}
