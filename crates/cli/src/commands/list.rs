//! Stack listing

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::config::AppConfig;
use crate::output::{or_agnostic, print_table, OutputFormat};
use crate::stacks::DEFINITIONS;

#[derive(Tabled, Serialize)]
struct StackRow {
    #[tabled(rename = "Stack")]
    name: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// List every stack this binary composes
pub fn list_stacks(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let env = config.target.environment();
    let show = |value: Option<&str>| match format {
        OutputFormat::Table => or_agnostic(value),
        OutputFormat::Json => value.unwrap_or_default().to_string(),
    };
    let rows: Vec<StackRow> = DEFINITIONS
        .iter()
        .map(|definition| StackRow {
            name: definition.name.to_string(),
            account: show(env.account.as_deref()),
            region: show(env.region.as_deref()),
            description: definition.description.to_string(),
        })
        .collect();
    print_table(&rows, format)
}
