//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::representation::PipelineOptions;

/// Root configuration for the inspection agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Listener configuration (loopback port range, connection limit).
    pub listener: ListenerConfig,

    /// Push channel keepalive.
    pub push_channel: PushChannelConfig,

    /// Representation pipeline behavior.
    pub representation: RepresentationConfig,

    /// Identity reported to clients.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind. Only loopback addresses pass validation.
    pub host: String,

    /// Lowest port tried when picking a random port.
    pub port_min: u16,

    /// Highest port tried when picking a random port.
    pub port_max: u16,

    /// Maximum concurrently served connections.
    pub max_connections: usize,

    /// Give up binding after this many milliseconds of collisions.
    pub bind_timeout_ms: u64,
}

impl ListenerConfig {
    pub fn bind_timeout(&self) -> Duration {
        Duration::from_millis(self.bind_timeout_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port_min: 49152,
            port_max: 65535,
            max_connections: 4,
            bind_timeout_ms: 1000,
        }
    }
}

/// Push channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushChannelConfig {
    /// Seconds of idle time before a keepalive ping is written.
    pub keepalive_secs: u64,
}

impl PushChannelConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self { keepalive_secs: 5 }
    }
}

/// Representation pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepresentationConfig {
    /// Elements read per enumerable interaction.
    pub slice_size: usize,

    /// Reject pipeline calls made off the main thread.
    pub enforce_main_thread: bool,

    /// Also include the original value when it is wire-safe.
    pub yield_original: bool,

    /// Attach interactive proxies to object values.
    pub yield_interactive: bool,
}

impl RepresentationConfig {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            enforce_main_thread: self.enforce_main_thread,
            yield_original: self.yield_original,
            yield_interactive: self.yield_interactive,
            slice_size: self.slice_size,
        }
    }
}

impl Default for RepresentationConfig {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            slice_size: options.slice_size,
            enforce_main_thread: options.enforce_main_thread,
            yield_original: options.yield_original,
            yield_interactive: options.yield_interactive,
        }
    }
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Agent type reported in the identity response.
    pub agent_type: String,

    /// Host application name.
    pub application_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            agent_type: "console".to_string(),
            application_name: "inspection-agent".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Request-size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AgentConfig = toml::from_str("").expect("parse");
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port_min, 49152);
        assert_eq!(config.listener.max_connections, 4);
        assert_eq!(config.push_channel.keepalive(), Duration::from_secs(5));
        assert_eq!(config.representation.slice_size, 10);
        assert!(config.representation.enforce_main_thread);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            [listener]
            port_min = 50000
            port_max = 50010

            [representation]
            yield_original = true
            "#,
        )
        .expect("parse");

        assert_eq!(config.listener.port_min, 50000);
        assert_eq!(config.listener.bind_timeout(), Duration::from_millis(1000));
        let options = config.representation.pipeline_options();
        assert!(options.yield_original);
        assert!(options.yield_interactive);
    }
}
