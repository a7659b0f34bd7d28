//! Cloud assembly synthesis

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use stack_lib::{CloudAssembly, CompositionMetrics, Stack};
use tabled::Tabled;
use tracing::info;

use crate::config::AppConfig;
use crate::output::{print_success, print_table, OutputFormat};
use crate::stacks;

#[derive(Tabled, Serialize)]
struct ArtifactRow {
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Template")]
    template: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Resources")]
    resources: usize,
    #[tabled(rename = "Outputs")]
    outputs: usize,
}

/// Compose the named stacks (all when empty) and write the cloud assembly
pub fn synth(
    config: &AppConfig,
    names: &[String],
    show_metrics: bool,
    format: OutputFormat,
) -> Result<()> {
    let definitions = stacks::select(names)?;
    let provider = stacks::network_provider(config)?;

    let composed: Vec<Stack> = definitions
        .iter()
        .map(|definition| definition.compose(config, &provider))
        .collect::<Result<_>>()?;
    let refs: Vec<&Stack> = composed.iter().collect();

    let assembly = CloudAssembly::write(&config.out_dir, &refs)
        .with_context(|| format!("Failed to synthesize into {}", config.out_dir.display()))?;
    info!(
        out_dir = %assembly.directory().display(),
        stacks = assembly.artifacts().len(),
        "Synthesis complete"
    );

    let rows: Vec<ArtifactRow> = assembly
        .artifacts()
        .iter()
        .map(|artifact| ArtifactRow {
            stack: artifact.stack.clone(),
            template: artifact.template_file.clone(),
            environment: artifact.environment.clone(),
            resources: artifact.resources,
            outputs: artifact.outputs,
        })
        .collect();
    print_table(&rows, format)?;

    if let OutputFormat::Table = format {
        print_success(&format!(
            "Wrote {} stack(s) to {}",
            rows.len(),
            assembly.directory().display().to_string().bold()
        ));
    }

    if show_metrics {
        print!("{}", CompositionMetrics::new().gather_text());
    }
    Ok(())
}
