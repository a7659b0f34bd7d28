//! Stack definitions composed by the CLI

mod container;
mod instance;

use crate::config::AppConfig;
use anyhow::{bail, Context, Result};
use stack_lib::{NetworkProvider, Stack, StaticNetworkProvider};

pub use container::CONTAINER_STACK;
pub use instance::INSTANCE_STACK;

/// A stack this binary knows how to compose
pub struct StackDefinition {
    pub name: &'static str,
    pub description: &'static str,
    compose: fn(&mut Stack, &AppConfig, &dyn NetworkProvider) -> Result<()>,
}

pub static DEFINITIONS: &[StackDefinition] = &[CONTAINER_STACK, INSTANCE_STACK];

pub fn find(name: &str) -> Result<&'static StackDefinition> {
    match DEFINITIONS.iter().find(|definition| definition.name == name) {
        Some(definition) => Ok(definition),
        None => {
            let known: Vec<&str> = DEFINITIONS.iter().map(|definition| definition.name).collect();
            bail!("Unknown stack '{}' (known stacks: {})", name, known.join(", "))
        }
    }
}

/// Definitions named by `names`, or all of them when empty
pub fn select(names: &[String]) -> Result<Vec<&'static StackDefinition>> {
    if names.is_empty() {
        return Ok(DEFINITIONS.iter().collect());
    }
    names.iter().map(|name| find(name)).collect()
}

/// Load the network context named by the configuration
pub fn network_provider(config: &AppConfig) -> Result<StaticNetworkProvider> {
    StaticNetworkProvider::from_context_file(&config.context_file).with_context(|| {
        format!(
            "Failed to load network context from {}",
            config.context_file.display()
        )
    })
}

impl StackDefinition {
    pub fn compose(&self, config: &AppConfig, provider: &dyn NetworkProvider) -> Result<Stack> {
        let mut stack = Stack::new(self.name, config.target.environment());
        (self.compose)(&mut stack, config, provider)
            .with_context(|| format!("Failed to compose stack '{}'", self.name))?;
        Ok(stack)
    }
}
