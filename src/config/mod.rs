//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → read once at startup by the agent builder and the acceptor
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → main applies the runtime-adjustable parts (log level)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AgentConfig, IdentityConfig, ListenerConfig, ObservabilityConfig, PushChannelConfig,
    RepresentationConfig, SecurityConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
