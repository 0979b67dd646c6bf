use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::args;
use crate::http::ParseLimits;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4221;

/// Server options
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Give error responses without a body a JSON error document
    pub json: bool,
    /// Gzip response bodies for clients that accept it
    pub compression: bool,
    /// How long an idle keep-alive connection waits for the next request
    pub keep_alive_timeout: Duration,
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight connections
    pub shutdown_grace_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = ParseLimits::default();
        ServerConfig {
            json: false,
            compression: true,
            keep_alive_timeout: Duration::from_secs(5),
            max_head_bytes: limits.max_head_bytes,
            max_body_bytes: limits.max_body_bytes,
            shutdown_grace_period: Duration::from_millis(50),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    pub fn max_head_bytes(mut self, limit: usize) -> Self {
        self.max_head_bytes = limit;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn shutdown_grace_period(mut self, period: Duration) -> Self {
        self.shutdown_grace_period = period;
        self
    }

    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_head_bytes: self.max_head_bytes,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Where the binary listens and with which options
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub host: String,
    pub port: u16,
    pub server: ServerConfig,
}

const FLAGS: &[&str] = &["json", "no-compression"];

/// Parse command-line arguments into a LaunchConfig
pub fn parse_args() -> Result<LaunchConfig> {
    let args: Vec<String> = env::args().skip(1).collect();
    launch_config_from(&args)
}

fn launch_config_from(args: &[String]) -> Result<LaunchConfig> {
    let options = args::parse_args(args, FLAGS)?;
    let lookup = |long: &str, short: &str| options.get(long).or_else(|| options.get(short));

    let host = lookup("host", "h")
        .cloned()
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match lookup("port", "p") {
        Some(port) => port
            .parse::<u16>()
            .with_context(|| format!("Invalid port: {}", port))?,
        None => DEFAULT_PORT,
    };

    let mut server = ServerConfig::new()
        .json(options.contains_key("json"))
        .compression(!options.contains_key("no-compression"));

    if let Some(secs) = options.get("keep-alive") {
        let secs = secs
            .parse::<u64>()
            .with_context(|| format!("Invalid keep-alive seconds: {}", secs))?;
        server = server.keep_alive_timeout(Duration::from_secs(secs));
    }

    Ok(LaunchConfig { host, port, server })
}
