use std::ffi::OsString;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;

use crate::primitives::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => Err(format!("unknown log format {s}, expected `json` or `pretty`")),
        }
    }
}

/// The configuration parameters for the gateway.
///
/// These can either be passed on the command line, or pulled from environment variables.
/// For development convenience, these can also be read from a `.env` file in the working
/// directory where the gateway is started. Anything left unset falls back to the YAML file
/// named by `--config`, then to the defaults below.
#[derive(Debug, Clone, Parser)]
#[command(name = "spigot", about = "HTTP and JSON-RPC gateway to a local Cardano node")]
pub struct Config {
    /// YAML configuration file
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Default log level, `RUST_LOG` takes precedence
    #[arg(long, env = "LOGGING_LEVEL", default_value = "info")]
    pub logging_level: String,

    #[arg(long, env = "LOGGING_FORMAT", default_value = "json", value_parser = clap::value_parser!(LogFormat))]
    pub logging_format: LogFormat,

    /// Also log healthcheck requests on the access log
    #[arg(long, env = "LOGGING_HEALTHCHECKS", default_value_t = false)]
    pub logging_healthchecks: bool,

    #[arg(long, env = "API_LISTEN_ADDRESS", default_value = "0.0.0.0")]
    pub api_listen_address: IpAddr,

    /// REST listener port, 0 disables it
    #[arg(long, env = "API_LISTEN_PORT", default_value_t = 8080)]
    pub api_listen_port: u16,

    #[arg(long, env = "RPC_LISTEN_ADDRESS", default_value = "0.0.0.0")]
    pub rpc_listen_address: IpAddr,

    /// JSON-RPC listener port, 0 disables it
    #[arg(long, env = "RPC_LISTEN_PORT", default_value_t = 9090)]
    pub rpc_listen_port: u16,

    #[arg(long, env = "CARDANO_NETWORK", default_value = "mainnet", value_parser = clap::value_parser!(Network))]
    pub network: Network,

    /// Overrides the magic of `network`
    #[arg(long, env = "CARDANO_NODE_NETWORK_MAGIC")]
    pub network_magic: Option<u64>,

    #[arg(long, env = "CARDANO_NODE_SOCKET_PATH", default_value = "/node-ipc/node.socket")]
    pub socket_path: PathBuf,

    /// Seconds to wait for the node connection
    #[arg(long, env = "CARDANO_NODE_SOCKET_TIMEOUT", default_value_t = 5)]
    pub socket_timeout: u64,

    /// Seconds to wait for a single node round trip
    #[arg(long, env = "CARDANO_NODE_SOCKET_QUERY_TIMEOUT", default_value_t = 180)]
    pub socket_query_timeout: u64,

    /// Start without probing the node
    #[arg(long, env = "CARDANO_NODE_SKIP_CHECK", default_value_t = false)]
    pub skip_check: bool,

    /// Pause after a mempool snapshot that held nothing new
    #[arg(long, env = "MEMPOOL_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub mempool_poll_interval_ms: u64,
}

/// Layout of the YAML configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    logging: LoggingSection,
    api: ListenerSection,
    rpc: ListenerSection,
    node: NodeSection,
    mempool: MempoolSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingSection {
    level: Option<String>,
    format: Option<String>,
    healthchecks: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListenerSection {
    address: Option<IpAddr>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NodeSection {
    network: Option<String>,
    network_magic: Option<u64>,
    socket_path: Option<PathBuf>,
    timeout: Option<u64>,
    query_timeout: Option<u64>,
    skip_check: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MempoolSection {
    poll_interval_ms: Option<u64>,
}

impl FileConfig {
    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("could not parse config file {}", path.display()))
    }

    fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        // an empty file is a null document
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Writes `value` into `field` unless the user set the argument `id`
fn layer<T>(matches: &ArgMatches, id: &str, field: &mut T, value: Option<T>) {
    let explicit = matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    );
    if let (false, Some(value)) = (explicit, value) {
        *field = value;
    }
}

impl Config {
    /// Parses the process arguments and environment, then layers the config file underneath.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(std::env::args_os())
    }

    pub fn load_from<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let mut config = Self::from_arg_matches(&matches)?;

        if let Some(path) = config.config.clone() {
            config.apply(FileConfig::read(&path)?, &matches)?;
        }
        Ok(config)
    }

    fn apply(&mut self, file: FileConfig, matches: &ArgMatches) -> anyhow::Result<()> {
        let format = file.logging.format.as_deref().map(LogFormat::from_str).transpose();
        let network = file.node.network.as_deref().map(Network::from_str).transpose();

        layer(matches, "logging_level", &mut self.logging_level, file.logging.level);
        layer(matches, "logging_format", &mut self.logging_format, format.map_err(|e| anyhow!(e))?);
        layer(matches, "logging_healthchecks", &mut self.logging_healthchecks, file.logging.healthchecks);
        layer(matches, "api_listen_address", &mut self.api_listen_address, file.api.address);
        layer(matches, "api_listen_port", &mut self.api_listen_port, file.api.port);
        layer(matches, "rpc_listen_address", &mut self.rpc_listen_address, file.rpc.address);
        layer(matches, "rpc_listen_port", &mut self.rpc_listen_port, file.rpc.port);
        layer(matches, "network", &mut self.network, network.map_err(|e| anyhow!(e))?);
        layer(
            matches,
            "network_magic",
            &mut self.network_magic,
            file.node.network_magic.map(Some),
        );
        layer(matches, "socket_path", &mut self.socket_path, file.node.socket_path);
        layer(matches, "socket_timeout", &mut self.socket_timeout, file.node.timeout);
        layer(matches, "socket_query_timeout", &mut self.socket_query_timeout, file.node.query_timeout);
        layer(matches, "skip_check", &mut self.skip_check, file.node.skip_check);
        layer(
            matches,
            "mempool_poll_interval_ms",
            &mut self.mempool_poll_interval_ms,
            file.mempool.poll_interval_ms,
        );
        Ok(())
    }

    pub fn magic(&self) -> u64 {
        self.network_magic.unwrap_or_else(|| self.network.magic())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_query_timeout)
    }

    pub fn mempool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mempool_poll_interval_ms)
    }

    pub fn api_address(&self) -> Option<SocketAddr> {
        (self.api_listen_port != 0).then(|| SocketAddr::new(self.api_listen_address, self.api_listen_port))
    }

    pub fn rpc_address(&self) -> Option<SocketAddr> {
        (self.rpc_listen_port != 0).then(|| SocketAddr::new(self.rpc_listen_address, self.rpc_listen_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["spigot"]).unwrap();

        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.magic(), 764824073);
        assert_eq!(config.logging_format, LogFormat::Json);
        assert_eq!(config.query_timeout(), Duration::from_secs(180));
        assert_eq!(config.api_address(), Some("0.0.0.0:8080".parse().unwrap()));
        assert_eq!(config.rpc_address(), Some("0.0.0.0:9090".parse().unwrap()));
    }

    #[test]
    fn test_magic_override_and_disabled_listener() {
        let config = Config::try_parse_from([
            "spigot",
            "--network",
            "preview",
            "--network-magic",
            "1234",
            "--rpc-listen-port",
            "0",
            "--logging-format",
            "pretty",
        ])
        .unwrap();

        assert_eq!(config.network, Network::Preview);
        assert_eq!(config.magic(), 1234);
        assert_eq!(config.rpc_address(), None);
        assert_eq!(config.logging_format, LogFormat::Pretty);
    }

    fn layered(args: &[&str], yaml: &str) -> anyhow::Result<Config> {
        let matches = Config::command().try_get_matches_from(args)?;
        let mut config = Config::from_arg_matches(&matches)?;
        config.apply(FileConfig::from_yaml_str(yaml)?, &matches)?;
        Ok(config)
    }

    const YAML: &str = "
logging:
  level: debug
  healthchecks: true
api:
  port: 8000
rpc:
  address: 127.0.0.1
node:
  network: preprod
  socketPath: /ipc/node.socket
  queryTimeout: 30
mempool:
  pollIntervalMs: 250
metrics:
  port: 8081
";

    #[test]
    fn test_file_fills_unset_values() {
        let config = layered(&["spigot"], YAML).unwrap();

        assert_eq!(config.logging_level, "debug");
        assert!(config.logging_healthchecks);
        assert_eq!(config.api_address(), Some("0.0.0.0:8000".parse().unwrap()));
        assert_eq!(config.rpc_address(), Some("127.0.0.1:9090".parse().unwrap()));
        assert_eq!(config.network, Network::Preprod);
        assert_eq!(config.socket_path, PathBuf::from("/ipc/node.socket"));
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.mempool_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_arguments_win_over_file() {
        let config = layered(
            &["spigot", "--network", "preview", "--api-listen-port", "0"],
            YAML,
        )
        .unwrap();

        assert_eq!(config.network, Network::Preview);
        assert_eq!(config.api_address(), None);
        assert_eq!(config.logging_level, "debug");
    }

    #[test]
    fn test_bad_file_values() {
        assert!(layered(&["spigot"], "node:\n  network: testnet\n").is_err());
        assert!(layered(&["spigot"], "api:\n  port: many\n").is_err());
        assert!(layered(&["spigot"], "").is_ok());
    }

    #[test]
    fn test_load_reads_config_file() {
        let path = std::env::temp_dir().join(format!("spigot-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "node:\n  skipCheck: true\n").unwrap();

        let config = Config::load_from(["spigot", "--config", path.to_str().unwrap()]);
        std::fs::remove_file(&path).unwrap();

        assert!(config.unwrap().skip_check);
        assert!(Config::load_from(["spigot", "--config", "/nonexistent/spigot.yaml"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_network() {
        assert!(Config::try_parse_from(["spigot", "--network", "testnet"]).is_err());
    }
}
