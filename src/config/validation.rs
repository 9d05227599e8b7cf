//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports ordered, limits > 0)
//! - Keep the listener on loopback
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::config::schema::AgentConfig;
use crate::observability::logging::parse_level;

/// First port of the dynamic/private range.
pub const EPHEMERAL_PORT_MIN: u16 = 49152;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    match listener.host.parse::<IpAddr>() {
        Ok(ip) if !ip.is_loopback() => errors.push(ValidationError::new(
            "listener.host",
            format!("{ip} is not a loopback address"),
        )),
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::new(
            "listener.host",
            format!("'{}' is not an IP address", listener.host),
        )),
    }
    if listener.port_min < EPHEMERAL_PORT_MIN || listener.port_min > listener.port_max {
        errors.push(ValidationError::new(
            "listener.port_min",
            format!(
                "port range {}..={} is empty or starts below {EPHEMERAL_PORT_MIN}",
                listener.port_min, listener.port_max
            ),
        ));
    }
    if listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than 0",
        ));
    }
    if listener.bind_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "listener.bind_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.push_channel.keepalive_secs == 0 {
        errors.push(ValidationError::new(
            "push_channel.keepalive_secs",
            "must be greater than 0",
        ));
    }

    if config.representation.slice_size == 0 {
        errors.push(ValidationError::new(
            "representation.slice_size",
            "must be greater than 0",
        ));
    }

    let observability = &config.observability;
    if parse_level(&observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&AgentConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = AgentConfig::default();
        config.listener.host = "0.0.0.0".to_string();
        config.listener.port_min = 60000;
        config.listener.port_max = 50000;
        config.representation.slice_size = 0;
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).expect_err("invalid");
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.host",
                "listener.port_min",
                "representation.slice_size",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn port_range_must_be_ephemeral() {
        let mut config = AgentConfig::default();
        config.listener.port_min = 8080;
        config.listener.port_max = 8090;
        let errors = validate_config(&config).expect_err("invalid");
        assert_eq!(errors[0].field, "listener.port_min");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = AgentConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
