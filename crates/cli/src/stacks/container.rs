//! The container stack: a cluster in the looked-up network running one
//! Fargate service

use super::StackDefinition;
use crate::config::{AppConfig, ContainerStackSettings};
use anyhow::Result;
use stack_lib::{
    build_cluster, build_load_balanced_service, build_service, build_task_definition,
    lookup_network, set_service_scaling, ContainerConfig, LoadBalancedServiceConfig,
    NetworkProvider, ServiceConfig, Stack, TaskConfig,
};
use tracing::info;

pub const CONTAINER_STACK: StackDefinition = StackDefinition {
    name: "my-container-infrastructure",
    description: "ECS cluster and Fargate service in an existing network",
    compose,
};

fn compose(stack: &mut Stack, config: &AppConfig, provider: &dyn NetworkProvider) -> Result<()> {
    let settings: &ContainerStackSettings = &config.container_stack;
    let network = lookup_network(stack, provider, &config.network_query())?;
    let cluster = build_cluster(stack, &settings.cluster_id, &network)?;

    let task_definition = build_task_definition(
        stack,
        &format!("taskdef-{}", settings.family),
        &TaskConfig {
            cpu: settings.cpu,
            memory_limit_mib: settings.memory_limit_mib,
            family: settings.family.clone(),
        },
        &ContainerConfig {
            image: settings.image.clone(),
            tcp_ports: settings.tcp_ports.clone(),
        },
    )?;

    let service_id = format!("service-{}", settings.family);
    let service = if settings.load_balanced {
        build_load_balanced_service(
            stack,
            &service_id,
            cluster,
            task_definition,
            &LoadBalancedServiceConfig {
                listener_port: settings.port,
                desired_count: settings.desired_count,
                public_endpoint: settings.public_endpoint,
                service_name: settings.service_name.clone(),
            },
        )?
        .service()
    } else {
        build_service(
            stack,
            &service_id,
            cluster,
            task_definition,
            &ServiceConfig {
                port: settings.port,
                desired_count: settings.desired_count,
                assign_public_ip: Some(settings.assign_public_ip),
                service_name: settings.service_name.clone(),
            },
        )?
    };

    if let Some(scaling) = &settings.scaling {
        set_service_scaling(stack, service, scaling)?;
    }

    info!(
        stack = %stack.name(),
        constructs = stack.len(),
        load_balanced = settings.load_balanced,
        "Composed container stack"
    );
    Ok(())
}
