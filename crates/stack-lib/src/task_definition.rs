//! Fargate task definitions
//!
//! A task definition bundles exactly one container. The container's id is
//! derived from its image reference, so composing the same inputs twice
//! yields the same identifiers and the deployment engine sees no change.

use crate::context::{Handle, Stack};
use crate::error::ComposeError;
use crate::iam::{PolicyDescriptor, PolicyStatement, RoleDescriptor, RoleRef};
use crate::logs::{LogGroupDescriptor, RetentionDays};
use crate::models::{ContainerConfig, TaskConfig};
use crate::synth::logical_id::sanitize;
use crate::token::Token;
use tracing::info;

pub type TaskDefinitionRef = Handle<TaskDefinitionDescriptor>;

/// Retention applied to every container log group
pub const LOG_RETENTION: RetentionDays = RetentionDays::OneDay;

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Container id for an image reference
pub fn container_id(image: &str) -> String {
    format!("container-{}", image)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Protocol,
}

/// `awslogs` routing for a container
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfiguration {
    pub log_group: Token,
    pub stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDefinition {
    name: String,
    image: String,
    port_mappings: Vec<PortMapping>,
    logging: LogConfiguration,
}

impl ContainerDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn port_mappings(&self) -> &[PortMapping] {
        &self.port_mappings
    }

    pub fn logging(&self) -> &LogConfiguration {
        &self.logging
    }

    /// The single container of a task is always essential
    pub fn essential(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinitionDescriptor {
    cpu: u32,
    memory_limit_mib: u32,
    family: String,
    task_role: RoleRef,
    execution_role: RoleRef,
    container: ContainerDefinition,
}

impl TaskDefinitionDescriptor {
    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    pub fn memory_limit_mib(&self) -> u32 {
        self.memory_limit_mib
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn task_role(&self) -> RoleRef {
        self.task_role
    }

    pub fn execution_role(&self) -> RoleRef {
        self.execution_role
    }

    pub fn default_container(&self) -> &ContainerDefinition {
        &self.container
    }

    pub fn containers(&self) -> &[ContainerDefinition] {
        std::slice::from_ref(&self.container)
    }

    /// Always `awsvpc`, the only mode Fargate supports
    pub fn network_mode(&self) -> &'static str {
        "awsvpc"
    }

    pub fn is_fargate_compatible(&self) -> bool {
        true
    }
}

/// Add a Fargate task definition running one container built from `container_config`
pub fn build_task_definition(
    stack: &mut Stack,
    id: &str,
    task_config: &TaskConfig,
    container_config: &ContainerConfig,
) -> Result<TaskDefinitionRef, ComposeError> {
    let container_name = container_id(&container_config.image);
    let task_role_path = format!("{}/TaskRole", id);
    let execution_role_path = format!("{}/ExecutionRole", id);
    // Image references may contain '/', which would add nesting levels
    let log_group_path = format!("{}/{}/LogGroup", id, sanitize(&container_name));
    let policy_path = format!("{}/DefaultPolicy", execution_role_path);
    stack.ensure_available(&[
        id,
        task_role_path.as_str(),
        execution_role_path.as_str(),
        log_group_path.as_str(),
        policy_path.as_str(),
    ])?;

    let task_role = stack.add(
        task_role_path,
        RoleDescriptor::for_service(ECS_TASKS_PRINCIPAL),
    )?;
    let execution_role = stack.add(
        execution_role_path,
        RoleDescriptor::for_service(ECS_TASKS_PRINCIPAL),
    )?;
    let log_group = stack.add(
        log_group_path,
        LogGroupDescriptor {
            retention: LOG_RETENTION,
        },
    )?;

    let container = ContainerDefinition {
        name: container_name.clone(),
        image: container_config.image.clone(),
        port_mappings: container_config
            .tcp_ports
            .iter()
            .map(|&port| PortMapping {
                container_port: port,
                protocol: Protocol::Tcp,
            })
            .collect(),
        logging: LogConfiguration {
            log_group: log_group.to_ref(),
            stream_prefix: task_config.family.clone(),
        },
    };

    let task_definition = stack.add(
        id,
        TaskDefinitionDescriptor {
            cpu: task_config.cpu,
            memory_limit_mib: task_config.memory_limit_mib,
            family: task_config.family.clone(),
            task_role,
            execution_role,
            container,
        },
    )?;

    stack.add(
        policy_path,
        PolicyDescriptor {
            roles: vec![execution_role],
            statements: vec![PolicyStatement::allow(
                ["logs:CreateLogStream", "logs:PutLogEvents"],
                vec![log_group.attr("Arn")],
            )],
        },
    )?;

    info!(
        stack = %stack.name(),
        id = %id,
        family = %task_config.family,
        container = %container_name,
        ports = container_config.tcp_ports.len(),
        "Added task definition"
    );
    Ok(task_definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;

    fn task_config() -> TaskConfig {
        TaskConfig {
            cpu: 512,
            memory_limit_mib: 1024,
            family: "test".to_string(),
        }
    }

    fn container_config(ports: Vec<u16>) -> ContainerConfig {
        ContainerConfig {
            image: "httpd".to_string(),
            tcp_ports: ports,
        }
    }

    #[test]
    fn test_task_definition_sizing() {
        let mut stack = Stack::new("test", Environment::default());
        let handle =
            build_task_definition(&mut stack, "test-taskdef", &task_config(), &container_config(vec![80]))
                .unwrap();

        let task_definition = stack.get(handle).unwrap();
        assert_eq!(task_definition.cpu(), 512);
        assert_eq!(task_definition.memory_limit_mib(), 1024);
        assert_eq!(task_definition.family(), "test");
        assert!(task_definition.is_fargate_compatible());
        assert_eq!(stack.count_of("AWS::ECS::TaskDefinition"), 1);
    }

    #[test]
    fn test_single_container_named_after_image() {
        let mut stack = Stack::new("test", Environment::default());
        let handle =
            build_task_definition(&mut stack, "taskdef", &task_config(), &container_config(vec![80]))
                .unwrap();

        let task_definition = stack.get(handle).unwrap();
        assert_eq!(task_definition.containers().len(), 1);

        let container = task_definition.default_container();
        assert_eq!(container.name(), "container-httpd");
        assert_eq!(container.image(), "httpd");
        assert!(container.essential());
        assert_eq!(
            container.port_mappings(),
            &[PortMapping {
                container_port: 80,
                protocol: Protocol::Tcp
            }]
        );
    }

    #[test]
    fn test_port_order_preserved() {
        let mut stack = Stack::new("test", Environment::default());
        let ports = vec![8443, 80, 9090];
        let handle = build_task_definition(
            &mut stack,
            "taskdef",
            &task_config(),
            &container_config(ports.clone()),
        )
        .unwrap();

        let mapped: Vec<u16> = stack
            .get(handle)
            .unwrap()
            .default_container()
            .port_mappings()
            .iter()
            .map(|mapping| mapping.container_port)
            .collect();
        assert_eq!(mapped, ports);
    }

    #[test]
    fn test_empty_port_list_is_valid() {
        let mut stack = Stack::new("test", Environment::default());
        let handle =
            build_task_definition(&mut stack, "worker", &task_config(), &container_config(vec![]))
                .unwrap();

        let container = stack.get(handle).unwrap().default_container().clone();
        assert!(container.port_mappings().is_empty());
    }

    #[test]
    fn test_log_routing_uses_family_prefix() {
        let mut stack = Stack::new("test", Environment::default());
        let handle =
            build_task_definition(&mut stack, "taskdef", &task_config(), &container_config(vec![]))
                .unwrap();

        let logging = stack.get(handle).unwrap().default_container().logging().clone();
        assert_eq!(logging.stream_prefix, "test");

        let Token::Ref(log_group_id) = logging.log_group else {
            panic!("log group should be a reference");
        };
        let log_group = stack.construct(log_group_id).unwrap();
        assert_eq!(log_group.path, "taskdef/containerhttpd/LogGroup");
        assert_eq!(stack.count_of("AWS::Logs::LogGroup"), 1);
    }

    #[test]
    fn test_log_group_path_flattens_registry_image() {
        let mut stack = Stack::new("test", Environment::default());
        let image = "public.ecr.aws/nginx/nginx:1.25";
        let handle = build_task_definition(
            &mut stack,
            "taskdef",
            &task_config(),
            &ContainerConfig {
                image: image.to_string(),
                tcp_ports: vec![80],
            },
        )
        .unwrap();

        let container = stack.get(handle).unwrap().default_container().clone();
        assert_eq!(container.name(), container_id(image));

        let Token::Ref(log_group_id) = container.logging().log_group.clone() else {
            panic!("log group should be a reference");
        };
        let path = &stack.construct(log_group_id).unwrap().path;
        assert_eq!(path, "taskdef/containerpublicecrawsnginxnginx125/LogGroup");
        assert_eq!(path.split('/').count(), 3);
    }

    #[test]
    fn test_failed_task_definition_adds_nothing() {
        let mut stack = Stack::new("test", Environment::default());
        build_task_definition(&mut stack, "taskdef", &task_config(), &container_config(vec![80]))
            .unwrap();
        let before = stack.len();

        let duplicate = build_task_definition(
            &mut stack,
            "taskdef",
            &task_config(),
            &container_config(vec![80]),
        );
        assert!(matches!(duplicate, Err(ComposeError::DuplicateId(path)) if path == "taskdef"));

        let empty = build_task_definition(&mut stack, "", &task_config(), &container_config(vec![]));
        assert!(matches!(empty, Err(ComposeError::EmptyId)));
        assert_eq!(stack.len(), before);
    }

    #[test]
    fn test_roles_and_execution_policy() {
        let mut stack = Stack::new("test", Environment::default());
        build_task_definition(&mut stack, "taskdef", &task_config(), &container_config(vec![]))
            .unwrap();

        assert_eq!(stack.count_of("AWS::IAM::Role"), 2);
        assert_eq!(stack.count_of("AWS::IAM::Policy"), 1);
    }

    #[test]
    fn test_container_id_is_deterministic() {
        assert_eq!(container_id("httpd"), "container-httpd");
        assert_eq!(container_id("httpd"), container_id("httpd"));
        assert_eq!(
            container_id("public.ecr.aws/nginx/nginx:1.25"),
            "container-public.ecr.aws/nginx/nginx:1.25"
        );
    }
}
