//! Pre-render validation
//!
//! Builders accept any representable value. Range and uniqueness rules are
//! checked here, once, over the whole stack, and every problem is reported
//! together.

use crate::context::{Resource, Stack};
use crate::error::ValidationIssue;
use crate::security_group::SecurityGroupDescriptor;
use std::collections::HashMap;

pub fn validate(stack: &Stack) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut families: HashMap<&str, &str> = HashMap::new();

    for (_, construct) in stack.constructs() {
        let path = construct.path.as_str();
        let mut issue = |message: String| issues.push(ValidationIssue::new(path, message));

        match &construct.resource {
            Resource::TaskDefinition(task_definition) => {
                if task_definition.cpu() == 0 {
                    issue("cpu must be positive".to_string());
                }
                if task_definition.memory_limit_mib() == 0 {
                    issue("memory limit must be positive".to_string());
                }
                let family = task_definition.family();
                if family.is_empty() {
                    issue("family must not be empty".to_string());
                } else if let Some(first) = families.insert(family, path) {
                    issue(format!("family '{}' is already used by '{}'", family, first));
                }

                let container = task_definition.default_container();
                if container.image().is_empty() {
                    issue("container image must not be empty".to_string());
                }
                for mapping in container.port_mappings() {
                    if mapping.container_port == 0 {
                        issue("container port 0 is out of range 1..=65535".to_string());
                    }
                }
            }
            Resource::SecurityGroup(SecurityGroupDescriptor { ingress, .. }) => {
                for rule in ingress {
                    if rule.port == 0 {
                        issue("ingress port 0 is out of range 1..=65535".to_string());
                    }
                }
            }
            Resource::Listener(listener) if listener.port == 0 => {
                issue("listener port 0 is out of range 1..=65535".to_string());
            }
            Resource::TargetGroup(target_group) if target_group.port == 0 => {
                issue("target port 0 is out of range 1..=65535".to_string());
            }
            Resource::ScalableTarget(target) if target.min_capacity > target.max_capacity => {
                issue(format!(
                    "min capacity {} exceeds max capacity {}",
                    target.min_capacity, target.max_capacity
                ));
            }
            Resource::ScalingPolicy(policy)
                if !(policy.target_value > 0.0 && policy.target_value <= 100.0) =>
            {
                issue(format!(
                    "target utilization {} is outside (0, 100]",
                    policy.target_value
                ));
            }
            _ => {}
        }
    }

    issues
}
