use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use configurator::engine::{Configurator, Shutdown};
use configurator::logging::{self, TracingLogger};
use configurator::memory::DEFAULT_CONFIGURATION_DIRECTORY;
use configurator::service::SystemdServiceManager;
use configurator::source::HttpConfigurationSource;

#[derive(Debug, Parser)]
#[command(name = "configurator", version, about)]
struct Args {
    /// Directory holding the Settings, Profile, Template and Service resources.
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIGURATION_DIRECTORY)]
    configuration_directory: PathBuf,

    /// Directory rendered templates are written under.
    #[arg(short = 'r', long)]
    runtime_directory: Option<PathBuf>,

    /// Base URL of the configuration source. Overrides the Settings resource.
    #[arg(long)]
    source_url: Option<String>,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(logging::level_from_env(), logging::json_from_env()) {
        eprintln!("{}", e);
    }

    let config = match configurator::config::load(&args.configuration_directory) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = config.settings_spec();

    let Some(base_url) = args.source_url.or(settings.source.base_url) else {
        eprintln!("No configuration source: set source.baseUrl in Settings or pass --source-url");
        return ExitCode::FAILURE;
    };
    let source = match HttpConfigurationSource::new(
        &base_url,
        Duration::from_secs(settings.source.timeout_secs),
    ) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to create configuration source: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut memory = config
        .build_memory(Arc::new(source), Arc::new(SystemdServiceManager::new()))
        .with_logger(Arc::new(TracingLogger))
        .with_early_exit(args.once);
    if let Some(dir) = args.runtime_directory {
        memory.runtime_directory = dir;
    }

    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Stop requested, finishing the current cycle");
        handle.request();
    }) {
        log::warn!("Failed to install signal handler: {}", e);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Starting configurator: {} profiles, {} templates, {} services",
        memory.profile_defs.len(),
        memory.template_defs.len(),
        memory.service_defs.len()
    );

    let mut engine = Configurator::new(memory).with_shutdown(shutdown);
    runtime.block_on(engine.run());

    let outcome = engine.outcome();
    for line in &outcome.diagnostics {
        eprintln!("{}", line);
    }
    ExitCode::from(outcome.exit_status)
}
