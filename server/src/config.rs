use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest accepted access-token lifetime (one year).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Work factors bcrypt accepts.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Document proxy server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "docproxy-server", version, about = "Authenticated PDF document store")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "DOCPROXY_PORT", default_value = "8000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "DOCPROXY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./docproxy.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "DOCPROXY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "DOCPROXY_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Lifetime of issued access tokens, in minutes
    #[arg(long, env = "DOCPROXY_TOKEN_TTL_MINUTES", default_value = "30")]
    pub token_ttl_minutes: i64,

    /// bcrypt work factor for password hashes (4..=31)
    #[arg(long, env = "DOCPROXY_BCRYPT_COST", default_value = "12")]
    pub bcrypt_cost: u32,

    /// Maximum upload size in megabytes
    #[arg(long, env = "DOCPROXY_MAX_UPLOAD_SIZE_MB", default_value = "100")]
    pub max_upload_size_mb: u32,

    /// Allow cross-origin requests from any origin
    #[arg(long, env = "DOCPROXY_CORS_ALLOW_ANY", default_value = "true", action = clap::ArgAction::Set)]
    pub cors_allow_any: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./docproxy.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            token_ttl_minutes: 30,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            max_upload_size_mb: 100,
            cors_allow_any: true,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (DOCPROXY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let matches = Config::command().get_matches();
        let cli = Config::from_arg_matches(&matches)
            .map_err(|e| figment::Error::from(e.to_string()))?;
        let overrides = explicit_cli_args(&matches, &cli);

        let config: Config = Self::figment(&cli.config, overrides).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would panic or break every request at runtime.
    pub fn validate(&self) -> Result<(), figment::Error> {
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.token_ttl_minutes) {
            return Err(figment::Error::from(format!(
                "token_ttl_minutes must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_MINUTES, self.token_ttl_minutes
            )));
        }
        if !BCRYPT_COST_RANGE.contains(&self.bcrypt_cost) {
            return Err(figment::Error::from(format!(
                "bcrypt_cost must be between {} and {}, got {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end(),
                self.bcrypt_cost
            )));
        }
        Ok(())
    }

    fn figment(config_path: &str, overrides: Map<String, Value>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("DOCPROXY_"))
            .merge(Serialized::defaults(overrides))
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb as usize * 1024 * 1024
    }
}

/// Keep only the flags given on the command line. clap fills every field
/// with its default, which must not shadow the TOML and env layers.
fn explicit_cli_args(matches: &ArgMatches, cli: &Config) -> Map<String, Value> {
    let mut fields = match serde_json::to_value(cli) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    fields.retain(|key, _| matches.value_source(key) == Some(ValueSource::CommandLine));
    fields
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Document proxy server configuration
# Place this file at ./docproxy.toml or specify with --config <path>
# All settings can be overridden via environment variables (DOCPROXY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Access token lifetime in minutes (default: 30)
# token_ttl_minutes = 30

# bcrypt work factor for stored password hashes (default: 12)
# bcrypt_cost = 12

# Maximum PDF upload size in megabytes (default: 100)
# max_upload_size_mb = 100

# Allow browser clients from any origin (default: true)
# cors_allow_any = true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_survive_layering() {
        figment::Jail::expect_with(|_jail| {
            let config: Config = Config::figment("./docproxy.toml", Map::new()).extract()?;
            assert_eq!(config.port, 8000);
            assert_eq!(config.token_ttl_minutes, 30);
            assert!(config.cors_allow_any);
            assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
            Ok(())
        });
    }

    #[test]
    fn test_precedence_toml_env_cli() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                "token_ttl_minutes = 5\nbcrypt_cost = 4\nport = 9000\n",
            )?;
            jail.set_env("DOCPROXY_BCRYPT_COST", "6");

            let mut overrides = Map::new();
            overrides.insert("port".to_string(), Value::from(9100));

            let config: Config = Config::figment("custom.toml", overrides).extract()?;
            assert_eq!(config.token_ttl_minutes, 5);
            assert_eq!(config.bcrypt_cost, 6);
            assert_eq!(config.port, 9100);
            assert_eq!(config.data_dir, "./data");
            Ok(())
        });
    }

    #[test]
    fn test_only_explicit_flags_override() {
        let matches = Config::command()
            .try_get_matches_from(["docproxy-server", "--port", "9200"])
            .unwrap();
        let cli = Config::from_arg_matches(&matches).unwrap();
        let overrides = explicit_cli_args(&matches, &cli);

        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides["port"], Value::from(9200));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(Config::default().validate().is_ok());

        for ttl in [0, -5, MAX_TOKEN_TTL_MINUTES + 1, i64::MAX] {
            let config = Config {
                token_ttl_minutes: ttl,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "ttl {} accepted", ttl);
        }

        for cost in [0, 3, 32, 99] {
            let config = Config {
                bcrypt_cost: cost,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "cost {} accepted", cost);
        }

        let edges = Config {
            token_ttl_minutes: MAX_TOKEN_TTL_MINUTES,
            bcrypt_cost: 4,
            ..Config::default()
        };
        assert!(edges.validate().is_ok());
    }

    #[test]
    fn test_template_mentions_every_key() {
        let template = generate_config_template();
        for key in [
            "port",
            "bind_address",
            "json_logs",
            "data_dir",
            "token_ttl_minutes",
            "bcrypt_cost",
            "max_upload_size_mb",
            "cors_allow_any",
        ] {
            assert!(template.contains(key), "template missing {}", key);
        }
    }
}
