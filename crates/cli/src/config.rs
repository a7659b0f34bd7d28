//! Configuration for the composition root
//!
//! Layered with the `config` crate: an optional TOML file, then `INFRA_*`
//! environment variables, then command-line overrides. The deployment
//! target comes from `CDK_DEFAULT_ACCOUNT` and `CDK_DEFAULT_REGION`.

use anyhow::{Context, Result};
use serde::Deserialize;
use stack_lib::{Environment, NetworkQuery, ServiceScalingConfig};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "infra.toml";

/// Settings for the container stack
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerStackSettings {
    #[serde(default = "default_cluster_id")]
    pub cluster_id: String,

    #[serde(default = "default_family")]
    pub family: String,

    /// Image pulled from a public registry
    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default)]
    pub tcp_ports: Vec<u16>,

    #[serde(default = "default_cpu")]
    pub cpu: u32,

    #[serde(default = "default_memory_limit_mib")]
    pub memory_limit_mib: u32,

    /// Service port, or the listener port when load balanced
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub desired_count: u32,

    #[serde(default = "default_assign_public_ip")]
    pub assign_public_ip: bool,

    #[serde(default)]
    pub service_name: Option<String>,

    /// Front the service with an application load balancer
    #[serde(default)]
    pub load_balanced: bool,

    /// Internet-facing balancer; only read when `load_balanced`
    #[serde(default)]
    pub public_endpoint: Option<bool>,

    #[serde(default)]
    pub scaling: Option<ServiceScalingConfig>,
}

impl Default for ContainerStackSettings {
    fn default() -> Self {
        Self {
            cluster_id: default_cluster_id(),
            family: default_family(),
            image: default_image(),
            tcp_ports: Vec::new(),
            cpu: default_cpu(),
            memory_limit_mib: default_memory_limit_mib(),
            port: default_port(),
            desired_count: 0,
            assign_public_ip: default_assign_public_ip(),
            service_name: None,
            load_balanced: false,
            public_endpoint: None,
            scaling: None,
        }
    }
}

fn default_cluster_id() -> String {
    "my-test-cluster".to_string()
}

fn default_family() -> String {
    "webserver".to_string()
}

fn default_image() -> String {
    "httpd".to_string()
}

fn default_cpu() -> u32 {
    512
}

fn default_memory_limit_mib() -> u32 {
    1024
}

fn default_port() -> u16 {
    80
}

fn default_assign_public_ip() -> bool {
    true
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Cloud assembly output directory
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Known networks used to resolve lookups
    #[serde(default = "default_context_file")]
    pub context_file: PathBuf,

    /// Named network to look up; the account's default network when unset
    #[serde(default)]
    pub vpc_name: Option<String>,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub container_stack: ContainerStackSettings,

    #[serde(skip)]
    pub target: Target,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("cdk.out")
}

fn default_context_file() -> PathBuf {
    PathBuf::from("cdk.context.json")
}

/// Deployment account and region
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Target {
    /// Unset or empty values leave the stack environment-agnostic
    pub fn environment(&self) -> Environment {
        Environment {
            account: self.account.clone().filter(|value| !value.is_empty()),
            region: self.region.clone().filter(|value| !value.is_empty()),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment and `file`.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(file: Option<&Path>, overrides: &[(String, String)]) -> Result<Self> {
        Self::load_from(file, overrides, None)
    }

    fn load_from(
        file: Option<&Path>,
        overrides: &[(String, String)],
        env_vars: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let (path, required) = match file {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut builder = config::Config::builder()
            .add_source(config::File::from(path.as_path()).required(required))
            .add_source(
                config::Environment::with_prefix("INFRA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env_vars.clone()),
            );
        for (key, value) in overrides {
            builder = builder
                .set_override(key.as_str(), value.as_str())
                .with_context(|| format!("Invalid override for '{}'", key))?;
        }

        let mut app: AppConfig = builder
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        app.target = config::Config::builder()
            .add_source(config::Environment::with_prefix("CDK_DEFAULT").source(env_vars))
            .build()
            .context("Failed to read deployment target")?
            .try_deserialize()
            .context("Failed to parse deployment target")?;

        Ok(app)
    }

    pub fn network_query(&self) -> NetworkQuery {
        NetworkQuery::from_selector(self.vpc_name.as_deref())
    }
}

/// Parse a `KEY=VALUE` context override
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}
