//! Configuration for `vsock-ping` and `vsock-echo`.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. The resolved
//! [`ProbeConfig`] and [`ServerConfig`] are built once at startup and
//! never mutated afterwards.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocols::ping::Payload;
use crate::transport::{Endpoint, TransportKind};

/// Command-line arguments for the prober
#[derive(Parser, Debug)]
#[command(name = "vsock-ping")]
#[command(version)]
#[command(about = "Send payloads to an echo server and report each round trip", long_about = None)]
pub struct PingArgs {
    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of requests to send (0 sends forever)
    #[arg(long)]
    pub count: Option<u64>,

    /// Duration to wait between sending each packet (e.g. 1s, 250ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Hex pattern to send with each request (up to 64 bytes, defaults to
    /// the md5 hash of the request count)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Verify that received data matches sent data
    #[arg(long)]
    pub verify: bool,

    /// Context ID of the remote VM socket
    #[arg(short = 'c', long)]
    pub cid: Option<u32>,

    /// Port to connect to
    #[arg(short = 'p', long)]
    pub port: Option<u32>,

    /// Transport to use
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Remote host (tcp transport only)
    #[arg(long)]
    pub host: Option<String>,

    /// Give up on a read or write that takes longer than this
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Enable verbose logging to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Command-line arguments for the echo responder
#[derive(Parser, Debug)]
#[command(name = "vsock-echo")]
#[command(version)]
#[command(about = "Echo every byte received on a stream connection back to its sender", long_about = None)]
pub struct EchoArgs {
    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (random port by default)
    #[arg(short = 'p', long)]
    pub port: Option<u32>,

    /// Transport to use
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Address to bind to (tcp transport only)
    #[arg(long)]
    pub host: Option<String>,

    /// Maximum number of simultaneous clients (unlimited by default)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Drop a client whose read or write takes longer than this
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Exit the whole server when any client connection fails
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose logging to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file for the prober
#[derive(Debug, Deserialize, Default)]
pub struct PingToml {
    #[serde(default)]
    pub ping: PingSection,
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Probe-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct PingSection {
    pub count: Option<u64>,
    /// Humantime duration, e.g. "500ms"
    pub interval: Option<String>,
    pub pattern: Option<String>,
    #[serde(default)]
    pub verify: bool,
    pub timeout: Option<String>,
}

/// Remote endpoint configuration
#[derive(Debug, Deserialize, Default)]
pub struct RemoteSection {
    pub transport: Option<TransportKind>,
    pub cid: Option<u32>,
    pub port: Option<u32>,
    pub host: Option<String>,
}

/// TOML configuration file for the echo responder
#[derive(Debug, Deserialize, Default)]
pub struct EchoToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ServerSection {
    pub transport: Option<TransportKind>,
    pub port: Option<u32>,
    pub host: Option<String>,
    pub max_connections: Option<usize>,
    pub timeout: Option<String>,
    #[serde(default)]
    pub strict: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

/// Final resolved prober configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub remote: Endpoint,
    /// Probes to send; 0 sends forever
    pub count: u64,
    /// Time between probe starts; zero disables pacing
    pub interval: Duration,
    /// Hex pattern as given, for display
    pub pattern: Option<String>,
    pub payload: Payload,
    pub verify: bool,
    pub timeout: Option<Duration>,
    pub log_level: String,
}

impl ProbeConfig {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(PingArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at, if any.
    pub fn from_args(cli: PingArgs) -> Result<Self, ConfigError> {
        let file: PingToml = match cli.config {
            Some(ref path) => read_toml(path)?,
            None => PingToml::default(),
        };

        // Decoded up front so a bad pattern fails before any dial
        let pattern = cli.pattern.or(file.ping.pattern).filter(|p| !p.is_empty());
        let payload = Payload::from_pattern(pattern.as_deref())?;

        let transport = cli.transport.or(file.remote.transport).unwrap_or_default();
        let host = cli
            .host
            .or(file.remote.host)
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let remote = Endpoint::new(
            transport,
            cli.cid.or(file.remote.cid).unwrap_or(0),
            &host,
            cli.port.or(file.remote.port).unwrap_or(0),
        )?;

        let interval = match cli.interval {
            Some(d) => d,
            None => parse_duration_opt(file.ping.interval)?.unwrap_or_else(default_interval),
        };
        let timeout = match cli.timeout {
            Some(d) => Some(d),
            None => parse_duration_opt(file.ping.timeout)?,
        };

        Ok(ProbeConfig {
            remote,
            count: cli.count.or(file.ping.count).unwrap_or(0),
            interval,
            pattern,
            payload,
            verify: cli.verify || file.ping.verify,
            timeout,
            log_level: resolve_log_level(cli.verbose, cli.log_level, file.logging),
        })
    }
}

/// Final resolved responder configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: Endpoint,
    /// Cap on simultaneous clients; `None` is unbounded
    pub max_connections: Option<usize>,
    pub timeout: Option<Duration>,
    /// Treat any per-connection failure as fatal to the server
    pub strict: bool,
    pub log_level: String,
}

impl ServerConfig {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(EchoArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at, if any.
    pub fn from_args(cli: EchoArgs) -> Result<Self, ConfigError> {
        let file: EchoToml = match cli.config {
            Some(ref path) => read_toml(path)?,
            None => EchoToml::default(),
        };

        let transport = cli.transport.or(file.server.transport).unwrap_or_default();
        let host = cli
            .host
            .or(file.server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let listen = Endpoint::new(
            transport,
            0,
            &host,
            cli.port.or(file.server.port).unwrap_or(0),
        )?;

        let timeout = match cli.timeout {
            Some(d) => Some(d),
            None => parse_duration_opt(file.server.timeout)?,
        };

        Ok(ServerConfig {
            listen,
            max_connections: cli.max_connections.or(file.server.max_connections),
            timeout,
            strict: cli.strict || file.server.strict,
            log_level: resolve_log_level(cli.verbose, cli.log_level, file.logging),
        })
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_duration_opt(value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|s| humantime::parse_duration(&s).map_err(|e| ConfigError::Duration(s, e)))
        .transpose()
}

/// `-v` wins, then `--log-level`, then the config file.
pub(crate) fn resolve_log_level(
    verbose: bool,
    cli_level: Option<String>,
    file: LoggingConfig,
) -> String {
    if verbose {
        "debug".to_string()
    } else {
        cli_level.unwrap_or(file.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ping_args(args: &[&str]) -> PingArgs {
        PingArgs::try_parse_from(std::iter::once("vsock-ping").chain(args.iter().copied()))
            .unwrap()
    }

    fn echo_args(args: &[&str]) -> EchoArgs {
        EchoArgs::try_parse_from(std::iter::once("vsock-echo").chain(args.iter().copied()))
            .unwrap()
    }

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vsock-echo-{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_ping_defaults() {
        let config = ProbeConfig::from_args(ping_args(&[])).unwrap();
        assert_eq!(config.count, 0);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.payload, Payload::Derived);
        assert!(config.pattern.is_none());
        assert!(!config.verify);
        assert!(config.timeout.is_none());
        assert_eq!(config.remote, Endpoint::Vsock { cid: 0, port: 0 });
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_ping_flags() {
        let args = ping_args(&[
            "--count", "3", "--interval", "250ms", "--pattern", "00ff", "--verify", "-c", "3",
            "-p", "1024", "-v",
        ]);
        let config = ProbeConfig::from_args(args).unwrap();
        assert_eq!(config.count, 3);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.pattern.as_deref(), Some("00ff"));
        assert!(config.payload.is_fixed());
        assert!(config.verify);
        assert_eq!(config.remote, Endpoint::Vsock { cid: 3, port: 1024 });
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_ping_invalid_pattern() {
        let args = ping_args(&["--pattern", "zz"]);
        assert!(matches!(
            ProbeConfig::from_args(args),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_ping_tcp_transport() {
        let args = ping_args(&["--transport", "tcp", "--host", "localhost", "-p", "7"]);
        let config = ProbeConfig::from_args(args).unwrap();
        assert_eq!(
            config.remote,
            Endpoint::Tcp {
                host: "localhost".to_string(),
                port: 7
            }
        );
    }

    #[test]
    fn test_ping_toml_with_cli_override() {
        let path = write_temp(
            "ping.toml",
            r#"
            [ping]
            count = 10
            interval = "2s"
            pattern = "abcd"
            verify = true
            timeout = "500ms"

            [remote]
            transport = "vsock"
            cid = 2
            port = 5000

            [logging]
            level = "warn"
            "#,
        );

        let args = ping_args(&["--config", path.to_str().unwrap(), "--count", "4"]);
        let config = ProbeConfig::from_args(args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.count, 4);
        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(&config.payload.generate(0)[..], &[0xab, 0xcd]);
        assert!(config.verify);
        assert_eq!(config.timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.remote, Endpoint::Vsock { cid: 2, port: 5000 });
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_toml_bad_duration() {
        let path = write_temp("bad-duration.toml", "[ping]\ninterval = \"soon\"\n");
        let args = ping_args(&["--config", path.to_str().unwrap()]);
        let result = ProbeConfig::from_args(args);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Duration(ref s, _)) if s == "soon"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = ping_args(&["--config", "/nonexistent/vsock-ping.toml"]);
        assert!(matches!(
            ProbeConfig::from_args(args),
            Err(ConfigError::FileRead { .. })
        ));
    }

    #[test]
    fn test_echo_defaults() {
        let config = ServerConfig::from_args(echo_args(&[])).unwrap();
        assert_eq!(config.listen, Endpoint::Vsock { cid: 0, port: 0 });
        assert!(config.max_connections.is_none());
        assert!(config.timeout.is_none());
        assert!(!config.strict);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_echo_toml_parsing() {
        let toml_str = r#"
            [server]
            transport = "tcp"
            host = "127.0.0.1"
            port = 9000
            max_connections = 16
            timeout = "30s"
            strict = true

            [logging]
            level = "trace"
        "#;

        let config: EchoToml = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.transport, Some(TransportKind::Tcp));
        assert_eq!(config.server.port, Some(9000));
        assert_eq!(config.server.max_connections, Some(16));
        assert_eq!(config.server.timeout.as_deref(), Some("30s"));
        assert!(config.server.strict);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_echo_flags() {
        let args = echo_args(&[
            "--transport", "tcp", "--host", "127.0.0.1", "-p", "0", "--max-connections", "2",
            "--timeout", "1s", "--strict",
        ]);
        let config = ServerConfig::from_args(args).unwrap();
        assert_eq!(
            config.listen,
            Endpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 0
            }
        );
        assert_eq!(config.max_connections, Some(2));
        assert_eq!(config.timeout, Some(Duration::from_secs(1)));
        assert!(config.strict);
    }
}
