//! Cloud assembly output
//!
//! One `<stack>.template.json` per stack plus a `manifest.json` listing the
//! artifacts and their target environments.

use super::synthesize;
use crate::context::Stack;
use crate::error::SynthError;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";
const ASSEMBLY_VERSION: &str = "36.0.0";

/// What was written for one stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSummary {
    pub stack: String,
    pub template_file: String,
    pub environment: String,
    pub resources: usize,
    pub outputs: usize,
}

#[derive(Debug, Clone)]
pub struct CloudAssembly {
    directory: PathBuf,
    artifacts: Vec<ArtifactSummary>,
}

impl CloudAssembly {
    /// Synthesize every stack into `directory`, creating it if needed.
    ///
    /// Nothing is written unless every stack synthesizes.
    pub fn write(directory: &Path, stacks: &[&Stack]) -> Result<Self, SynthError> {
        let mut rendered = Vec::with_capacity(stacks.len());
        for stack in stacks {
            let template = synthesize(stack)?;
            rendered.push((*stack, template.to_json_pretty()?, template));
        }

        fs::create_dir_all(directory).map_err(|source| SynthError::Io {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut artifacts = Vec::with_capacity(rendered.len());
        let mut manifest_artifacts = Map::new();
        for (stack, body, template) in rendered {
            let template_file = format!("{}.template.json", stack.name());
            let path = directory.join(&template_file);
            fs::write(&path, body).map_err(|source| SynthError::Io { path, source })?;

            let environment = environment_uri(stack);
            manifest_artifacts.insert(
                stack.name().to_string(),
                json!({
                    "type": "aws:cloudformation:stack",
                    "environment": environment,
                    "properties": { "templateFile": template_file },
                }),
            );
            artifacts.push(ArtifactSummary {
                stack: stack.name().to_string(),
                template_file,
                environment,
                resources: template.resources.len(),
                outputs: template.outputs.len(),
            });
        }

        let manifest = json!({
            "version": ASSEMBLY_VERSION,
            "generatedAt": Utc::now().to_rfc3339(),
            "artifacts": manifest_artifacts,
        });
        let manifest_path = directory.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).map_err(|source| {
            SynthError::Io {
                path: manifest_path.clone(),
                source,
            }
        })?;

        info!(
            directory = %directory.display(),
            stacks = artifacts.len(),
            "Wrote cloud assembly"
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            artifacts,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn artifacts(&self) -> &[ArtifactSummary] {
        &self.artifacts
    }
}

/// `aws://<account>/<region>`, with placeholders for an agnostic stack
fn environment_uri(stack: &Stack) -> String {
    let env = stack.env();
    format!(
        "aws://{}/{}",
        env.account.as_deref().unwrap_or("unknown-account"),
        env.region.as_deref().unwrap_or("unknown-region")
    )
}
