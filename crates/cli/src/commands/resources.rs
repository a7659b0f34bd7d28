//! Per-stack resource listing

use anyhow::Result;
use serde::Serialize;
use stack_lib::synth::logical_id::logical_id;
use tabled::Tabled;

use crate::config::AppConfig;
use crate::output::{color_resource_type, print_info, print_table, OutputFormat};
use crate::stacks;

#[derive(Tabled, Serialize)]
struct ResourceRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Path")]
    path: String,
}

/// Compose one stack and list its resources in registration order
pub fn list_resources(config: &AppConfig, name: &str, format: OutputFormat) -> Result<()> {
    let definition = stacks::find(name)?;
    let provider = stacks::network_provider(config)?;
    let stack = definition.compose(config, &provider)?;

    let rows: Vec<ResourceRow> = stack
        .constructs()
        .map(|(_, construct)| ResourceRow {
            logical_id: logical_id(&construct.path),
            resource_type: match format {
                OutputFormat::Table => color_resource_type(construct.resource.cfn_type()),
                OutputFormat::Json => construct.resource.cfn_type().to_string(),
            },
            path: construct.path.clone(),
        })
        .collect();
    print_table(&rows, format)?;

    if let OutputFormat::Table = format {
        let parameters = stack.parameters().len();
        let outputs = stack.outputs().len();
        if parameters + outputs > 0 {
            print_info(&format!("{} parameter(s), {} output(s)", parameters, outputs));
        }
    }
    Ok(())
}
