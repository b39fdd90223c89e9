use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WELCOME: &str = "Connected to Server";

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Enable structured JSON logging (for Docker/production)
    pub json_logs: bool,
    /// Data directory for the SQLite database
    pub data_dir: String,
    /// Greeting sent to every new connection
    pub welcome_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            welcome_message: DEFAULT_WELCOME.to_string(),
        }
    }
}

/// Private messaging relay
///
/// Flags left unset do not override the TOML file or environment.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "murmur-server", version, about = "Private messaging relay")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub json_logs: bool,

    /// Data directory for the SQLite database
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Greeting sent to every new connection
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./murmur.toml")]
    #[serde(skip)]
    pub config: String,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Config {
    /// Layered precedence:
    /// built-in defaults < TOML file < env vars (MURMUR_*) < CLI args
    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("MURMUR_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Murmur relay configuration
# Place this file at ./murmur.toml or specify with --config <path>
# All settings can be overridden via environment variables (MURMUR_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# Greeting sent in the welcome frame of every new connection
# welcome_message = "Connected to Server"
"#
    .to_string()
}
