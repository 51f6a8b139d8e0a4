pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod memory;
pub mod op;
pub mod profile;
pub mod service;
pub mod source;
pub mod template;

pub use engine::{Configurator, NextState, Shutdown, Stage};
pub use error::{ConfigError, ConfiguratorError, OperationError, Result};
pub use memory::Memory;
pub use op::{ErrorMap, Operation};
pub use profile::{LoadedProfile, ProfileDef};
