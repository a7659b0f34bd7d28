//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table or as a JSON array
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return Ok(());
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Display form of an optional environment value
pub fn or_agnostic(value: Option<&str>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "(agnostic)".dimmed().to_string(),
    }
}

/// Shorten the AWS namespace off a resource type, coloring by service
pub fn color_resource_type(resource_type: &str) -> String {
    let short = resource_type.strip_prefix("AWS::").unwrap_or(resource_type);
    match short.split("::").next().unwrap_or_default() {
        "ECS" => short.cyan().to_string(),
        "EC2" => short.green().to_string(),
        "IAM" => short.yellow().to_string(),
        "ElasticLoadBalancingV2" => short.magenta().to_string(),
        "ApplicationAutoScaling" => short.blue().to_string(),
        _ => short.to_string(),
    }
}
