//! Stack synthesis
//!
//! A stack is validated as a whole, then every construct is lowered into a
//! CloudFormation resource keyed by its deterministic logical id. Rendering
//! the same stack twice produces byte-identical JSON.

mod assembly;
pub mod logical_id;
mod lower;
pub mod validate;

pub use assembly::{ArtifactSummary, CloudAssembly, MANIFEST_FILE};

use crate::context::Stack;
use crate::error::SynthError;
use crate::observability::CompositionMetrics;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A rendered CloudFormation template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, TemplateParameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "Metadata")]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateParameter {
    #[serde(rename = "Type")]
    pub param_type: String,
    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateOutput {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
}

impl Template {
    /// Resources of one CloudFormation type, in logical id order
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TemplateResource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, resource)| resource.resource_type == resource_type)
            .map(|(id, resource)| (id.as_str(), resource))
    }

    pub fn resource_count(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).count()
    }

    pub fn to_json_pretty(&self) -> Result<String, SynthError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Validate `stack` and render it as a template
pub fn synthesize(stack: &Stack) -> Result<Template, SynthError> {
    let metrics = CompositionMetrics::new();
    let start = Instant::now();

    let issues = validate::validate(stack);
    if !issues.is_empty() {
        metrics.inc_validation_failures();
        for issue in &issues {
            warn!(stack = %stack.name(), path = %issue.path, "{}", issue.message);
        }
        return Err(SynthError::Validation {
            stack: stack.name().to_string(),
            issues,
        });
    }

    let template = lower::lower(stack)?;
    let elapsed = start.elapsed();
    metrics.observe_synth_duration(elapsed.as_secs_f64());

    debug!(
        stack = %stack.name(),
        parameters = template.parameters.len(),
        outputs = template.outputs.len(),
        "Lowered constructs"
    );
    info!(
        stack = %stack.name(),
        resources = template.resources.len(),
        duration_ms = elapsed.as_millis() as u64,
        "Synthesized stack"
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::build_cluster;
    use crate::context::Environment;
    use crate::models::{ContainerConfig, ServiceConfig, TaskConfig};
    use crate::network::{create_network, NetworkProps};
    use crate::service::build_service;
    use crate::task_definition::build_task_definition;
    use serde_json::json;

    fn service_stack(cpu: u32) -> Stack {
        let mut stack = Stack::new("test", Environment::new("123456789012", "us-east-1"));
        let network = create_network(&mut stack, "vpc", &NetworkProps::default()).unwrap();
        let cluster = build_cluster(&mut stack, "test-cluster", &network).unwrap();
        let task_definition = build_task_definition(
            &mut stack,
            "test-taskdef",
            &TaskConfig {
                cpu,
                memory_limit_mib: 1024,
                family: "test".to_string(),
            },
            &ContainerConfig {
                image: "httpd".to_string(),
                tcp_ports: vec![80],
            },
        )
        .unwrap();
        build_service(
            &mut stack,
            "test-service",
            cluster,
            task_definition,
            &ServiceConfig {
                port: 80,
                desired_count: 1,
                ..Default::default()
            },
        )
        .unwrap();
        stack
    }

    #[test]
    fn test_task_definition_shape() {
        let template = synthesize(&service_stack(512)).unwrap();

        let (_, task_definition) = template
            .resources_of_type("AWS::ECS::TaskDefinition")
            .next()
            .unwrap();
        let properties = &task_definition.properties;
        assert_eq!(properties["Cpu"], "512");
        assert_eq!(properties["Memory"], "1024");
        assert_eq!(properties["Family"], "test");
        assert_eq!(properties["NetworkMode"], "awsvpc");
        assert_eq!(properties["RequiresCompatibilities"], json!(["FARGATE"]));

        let container = &properties["ContainerDefinitions"][0];
        assert_eq!(container["Name"], "container-httpd");
        assert_eq!(container["Image"], "httpd");
        assert_eq!(container["Essential"], true);
        assert_eq!(
            container["PortMappings"],
            json!([{ "ContainerPort": 80, "Protocol": "tcp" }])
        );
        assert_eq!(container["LogConfiguration"]["LogDriver"], "awslogs");
        assert_eq!(
            container["LogConfiguration"]["Options"]["awslogs-region"],
            "us-east-1"
        );
    }

    #[test]
    fn test_service_shape() {
        let template = synthesize(&service_stack(512)).unwrap();

        let (_, service) = template.resources_of_type("AWS::ECS::Service").next().unwrap();
        let properties = &service.properties;
        assert_eq!(properties["DesiredCount"], 1);
        assert_eq!(properties["LaunchType"], "FARGATE");
        assert_eq!(
            properties["DeploymentConfiguration"]["DeploymentCircuitBreaker"],
            json!({ "Enable": true, "Rollback": true })
        );
        assert_eq!(
            properties["NetworkConfiguration"]["AwsvpcConfiguration"]["AssignPublicIp"],
            "DISABLED"
        );
        assert!(properties.get("ServiceName").is_none());
    }

    #[test]
    fn test_log_group_is_retained() {
        let template = synthesize(&service_stack(512)).unwrap();

        let (_, log_group) = template.resources_of_type("AWS::Logs::LogGroup").next().unwrap();
        assert_eq!(log_group.properties["RetentionInDays"], 1);
        assert_eq!(log_group.deletion_policy.as_deref(), Some("Retain"));
        assert_eq!(log_group.update_replace_policy.as_deref(), Some("Retain"));
    }

    #[test]
    fn test_references_resolve_to_logical_ids() {
        let template = synthesize(&service_stack(512)).unwrap();

        let (_, service) = template.resources_of_type("AWS::ECS::Service").next().unwrap();
        let cluster_id = service.properties["Cluster"]["Ref"].as_str().unwrap();
        assert_eq!(
            template.resources[cluster_id].resource_type,
            "AWS::ECS::Cluster"
        );
        let task_definition_id = service.properties["TaskDefinition"]["Ref"].as_str().unwrap();
        assert_eq!(
            template.resources[task_definition_id].resource_type,
            "AWS::ECS::TaskDefinition"
        );
    }

    #[test]
    fn test_rendering_is_stable() {
        let first = synthesize(&service_stack(512)).unwrap().to_json_pretty().unwrap();
        let second = synthesize(&service_stack(512)).unwrap().to_json_pretty().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let err = synthesize(&service_stack(0)).unwrap_err();
        match err {
            SynthError::Validation { stack, issues } => {
                assert_eq!(stack, "test");
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].path, "test-taskdef");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_metadata_records_construct_path() {
        let template = synthesize(&service_stack(512)).unwrap();

        let (_, cluster) = template.resources_of_type("AWS::ECS::Cluster").next().unwrap();
        assert_eq!(cluster.metadata["infra:path"], "test/test-cluster");
        assert_eq!(cluster.properties, json!({}));
    }
}
