// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Environment-driven configuration for the coordination hub.
//!
//! There is no on-disk config file: the hub has no persistence story (see
//! the Non-goals in the project's design notes) and is meant to be started
//! by whatever supervises the agent fleet, so every knob is an environment
//! variable with a production-safe default. [`HubConfig::load`] never fails.
//!
//! ```
//! use hub_config::HubConfig;
//!
//! let config = HubConfig::load();
//! assert_eq!(config.api_port, 3200);
//! ```

use std::env;
use std::time::Duration;

/// Default control-plane HTTP port.
pub const DEFAULT_API_PORT: u16 = 3200;
/// Default port for the alternative push-stream control plane.
pub const DEFAULT_MCP_PORT: u16 = 3201;

/// Top-level hub configuration, assembled entirely from the process
/// environment.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// `API_PORT` — control-plane HTTP port.
    pub api_port: u16,
    /// `MCP_PORT` — alternative control-plane port for the push stream.
    pub mcp_port: u16,
    /// `HUB_URL` — peer-relative URL used by adapters, if any.
    pub hub_url: Option<String>,
    /// `SYNAPSE_DASHBOARD_URL` — advertised dashboard base URL.
    pub dashboard_url: Option<String>,
    /// Bind address for the HTTP listener (host part is fixed at `0.0.0.0`;
    /// only the port is configurable).
    pub bind_host: String,
    pub timings: Timings,
}

/// Tunable periods and TTLs that ship with concrete defaults but
/// which a deployer may still want to override (e.g. in tests, or to
/// tighten lock TTLs in a CI sandbox).
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Default lock TTL when a caller does not supply one.
    pub default_lock_ttl: Duration,
    /// Lock sweeper period.
    pub lock_sweep_interval: Duration,
    /// Presence sweeper period.
    pub presence_sweep_interval: Duration,
    /// Presence → `disconnected` threshold.
    pub presence_disconnect_after: Duration,
    /// Presence removal threshold.
    pub presence_remove_after: Duration,
    /// Convergence engine tick period.
    pub convergence_tick_interval: Duration,
    /// Deferred GC delay for an emptied doc session.
    pub doc_gc_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            default_lock_ttl: Duration::from_secs(30),
            lock_sweep_interval: Duration::from_secs(5),
            presence_sweep_interval: Duration::from_secs(30),
            presence_disconnect_after: Duration::from_secs(5 * 60),
            presence_remove_after: Duration::from_secs(15 * 60),
            convergence_tick_interval: Duration::from_secs(2),
            doc_gc_delay: Duration::from_secs(60),
        }
    }
}

impl HubConfig {
    /// Load configuration from the process environment. Always succeeds —
    /// unset or unparsable variables fall back to their documented default
    /// and a warning is logged.
    pub fn load() -> Self {
        Self {
            api_port: env_port("API_PORT", DEFAULT_API_PORT),
            mcp_port: env_port("MCP_PORT", DEFAULT_MCP_PORT),
            hub_url: env_string("HUB_URL"),
            dashboard_url: env_string("SYNAPSE_DASHBOARD_URL"),
            bind_host: "0.0.0.0".to_string(),
            timings: Timings::default(),
        }
    }

    /// The socket address the control-plane HTTP server should bind to.
    pub fn http_bind(&self) -> String {
        format!("{}:{}", self.bind_host, self.api_port)
    }

    /// The socket address the alternative push-stream port should bind to.
    pub fn mcp_bind(&self) -> String {
        format!("{}:{}", self.bind_host, self.mcp_port)
    }
}

fn env_port(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid port in environment, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests mutate process env vars; serialize them so parallel test threads
    // don't stomp on each other's assertions.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_with_clean_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("API_PORT");
        env::remove_var("MCP_PORT");
        env::remove_var("HUB_URL");
        env::remove_var("SYNAPSE_DASHBOARD_URL");

        let config = HubConfig::load();
        assert_eq!(config.api_port, DEFAULT_API_PORT);
        assert_eq!(config.mcp_port, DEFAULT_MCP_PORT);
        assert!(config.hub_url.is_none());
        assert!(config.dashboard_url.is_none());
    }

    #[test]
    fn overrides_from_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("API_PORT", "9000");
        env::set_var("HUB_URL", "http://peer.local");

        let config = HubConfig::load();
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.hub_url.as_deref(), Some("http://peer.local"));

        env::remove_var("API_PORT");
        env::remove_var("HUB_URL");
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("API_PORT", "not-a-port");
        let config = HubConfig::load();
        assert_eq!(config.api_port, DEFAULT_API_PORT);
        env::remove_var("API_PORT");
    }

    #[test]
    fn bind_addresses_combine_host_and_port() {
        let config = HubConfig {
            api_port: 4000,
            mcp_port: 4001,
            hub_url: None,
            dashboard_url: None,
            bind_host: "127.0.0.1".to_string(),
            timings: Timings::default(),
        };
        assert_eq!(config.http_bind(), "127.0.0.1:4000");
        assert_eq!(config.mcp_bind(), "127.0.0.1:4001");
    }
}
