//! Command-line and environment configuration.
//!
//! DESIGN
//! ======
//! `Args` is the raw clap surface (every flag also reads `ROOMCHAT_*` from
//! the environment). `ClientConfig::from_args` validates it into what the
//! chat layer needs: a WebSocket URL, the STOMP host header, heart-beat
//! intervals, and the protocol-error policy.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use clap::{ArgAction, Parser, ValueEnum};
use frames::HeartBeat;
use tokio_tungstenite::tungstenite::http::Uri;

use crate::net::Endpoint;

pub const DEFAULT_URL: &str = "http://localhost:3000/ws";
pub const DEFAULT_ROOM: &str = "general";

/// Path a SockJS endpoint serves raw WebSocket sessions on.
const SOCKJS_WEBSOCKET_PATH: &str = "/websocket";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid broker URL: {0}")]
    InvalidUrl(String),
}

/// What to do with the session when the broker sends an ERROR frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicy {
    /// Log the error and stay connected.
    #[default]
    Tolerate,
    /// Log the error and tear the session down.
    Disconnect,
}

/// Terminal room chat over STOMP.
#[derive(Debug, Parser)]
#[command(name = "roomchat", version, about)]
pub struct Args {
    /// Broker endpoint. `http(s)` URLs are mapped to `ws(s)`.
    #[arg(long, env = "ROOMCHAT_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Username to pre-fill in the connect form.
    #[arg(long, env = "ROOMCHAT_USERNAME")]
    pub username: Option<String>,

    /// Room to join.
    #[arg(long, env = "ROOMCHAT_ROOM", default_value = DEFAULT_ROOM)]
    pub room: String,

    /// Treat an `http(s)` URL as a SockJS endpoint and use its raw WebSocket path.
    #[arg(long, env = "ROOMCHAT_SOCKJS", default_value_t = true, action = ArgAction::Set)]
    pub sockjs: bool,

    /// Heart-beat interval offered to the broker, in milliseconds. 0 disables.
    #[arg(long, env = "ROOMCHAT_HEARTBEAT_MS", default_value_t = 10_000)]
    pub heartbeat_ms: u64,

    /// Reaction to broker ERROR frames.
    #[arg(long, env = "ROOMCHAT_ON_ERROR", value_enum, default_value_t = ErrorPolicy::Tolerate)]
    pub on_error: ErrorPolicy,

    /// Connect as soon as the client starts.
    #[arg(long, default_value_t = false)]
    pub connect: bool,
}

/// Validated client settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub on_error: ErrorPolicy,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if the URL scheme is not one of
    /// `http`, `https`, `ws`, `wss` or the result does not parse as a URI.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let url = ws_url(&args.url, args.sockjs)?;
        let host = host_of(&url)?;
        Ok(Self {
            endpoint: Endpoint {
                url,
                host,
                heartbeat: HeartBeat::new(args.heartbeat_ms, args.heartbeat_ms),
            },
            on_error: args.on_error,
        })
    }
}

/// Map a configured endpoint to the WebSocket URL to dial.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] for unsupported schemes.
pub fn ws_url(base_url: &str, sockjs: bool) -> Result<String, ConfigError> {
    let base = base_url.trim().trim_end_matches('/');
    let suffix = if sockjs { SOCKJS_WEBSOCKET_PATH } else { "" };

    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{suffix}"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{suffix}"));
    }
    if base.starts_with("ws://") || base.starts_with("wss://") {
        return Ok(base.to_owned());
    }

    Err(ConfigError::InvalidUrl(base_url.to_owned()))
}

fn host_of(url: &str) -> Result<String, ConfigError> {
    let uri = url
        .parse::<Uri>()
        .map_err(|_| ConfigError::InvalidUrl(url.to_owned()))?;
    uri.host()
        .filter(|host| !host.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_owned()))
}
