//! Fargate services
//!
//! Two variants share the same sizing and attachment rules:
//! - [`build_service`] exposes the task directly through a dedicated
//!   security group open to any source on one port.
//! - [`build_load_balanced_service`] puts an application load balancer in
//!   front of the task.
//!
//! Both always enable the deployment circuit breaker with rollback.

use crate::cluster::ClusterRef;
use crate::context::{Handle, Stack};
use crate::error::ComposeError;
use crate::load_balancer::{
    ListenerDescriptor, ListenerRef, LoadBalancerDescriptor, LoadBalancerRef, Scheme,
    TargetGroupDescriptor, TargetGroupRef,
};
use crate::models::{LoadBalancedServiceConfig, ServiceConfig};
use crate::network::SubnetSelection;
use crate::scaling::ScalableTargetRef;
use crate::security_group::{IngressRule, Peer, SecurityGroupDescriptor, SecurityGroupRef};
use crate::synth::logical_id::logical_id;
use crate::task_definition::TaskDefinitionRef;
use crate::token::Token;
use tracing::info;

pub type ServiceRef = Handle<ServiceDescriptor>;

/// Grace period before load balancer health checks count against new tasks
const HEALTH_CHECK_GRACE_PERIOD_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchType {
    Fargate,
}

impl LaunchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchType::Fargate => "FARGATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentCircuitBreaker {
    pub enable: bool,
    pub rollback: bool,
}

impl DeploymentCircuitBreaker {
    /// Failed deployments roll back automatically
    pub const ROLLBACK: Self = Self {
        enable: true,
        rollback: true,
    };
}

/// Registration of a service container with a target group
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerTarget {
    pub container_name: String,
    pub container_port: u16,
    pub target_group: Token,
}

/// A running, scaled instantiation of a task definition on a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    cluster: ClusterRef,
    task_definition: TaskDefinitionRef,
    desired_count: u32,
    exposure_port: u16,
    assign_public_ip: bool,
    service_name: Option<String>,
    security_groups: Vec<SecurityGroupRef>,
    subnets: Vec<Token>,
    circuit_breaker: DeploymentCircuitBreaker,
    load_balancers: Vec<LoadBalancerTarget>,
    health_check_grace_period_secs: Option<u32>,
    scaling: Option<ScalableTargetRef>,
}

impl ServiceDescriptor {
    pub fn cluster(&self) -> ClusterRef {
        self.cluster
    }

    pub fn task_definition(&self) -> TaskDefinitionRef {
        self.task_definition
    }

    pub fn desired_count(&self) -> u32 {
        self.desired_count
    }

    /// Port the service is reached on: the ingress port, or the listener port
    pub fn exposure_port(&self) -> u16 {
        self.exposure_port
    }

    pub fn assign_public_ip(&self) -> bool {
        self.assign_public_ip
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn launch_type(&self) -> LaunchType {
        LaunchType::Fargate
    }

    pub fn security_groups(&self) -> &[SecurityGroupRef] {
        &self.security_groups
    }

    pub fn subnets(&self) -> &[Token] {
        &self.subnets
    }

    pub fn circuit_breaker(&self) -> DeploymentCircuitBreaker {
        self.circuit_breaker
    }

    pub fn load_balancers(&self) -> &[LoadBalancerTarget] {
        &self.load_balancers
    }

    pub fn health_check_grace_period_secs(&self) -> Option<u32> {
        self.health_check_grace_period_secs
    }

    /// Scalable target attached by the scaling configurator
    pub fn scaling(&self) -> Option<ScalableTargetRef> {
        self.scaling
    }

    pub(crate) fn attach_scaling(&mut self, target: ScalableTargetRef) {
        self.scaling = Some(target);
    }
}

/// Add a service reachable on `config.port` from any address
pub fn build_service(
    stack: &mut Stack,
    id: &str,
    cluster: ClusterRef,
    task_definition: TaskDefinitionRef,
    config: &ServiceConfig,
) -> Result<ServiceRef, ComposeError> {
    let network = stack.get(cluster)?.network().clone();
    stack.get(task_definition)?;
    let group_id = format!("{}-security-group", id);
    stack.ensure_available(&[id, group_id.as_str()])?;

    let assign_public_ip = config.assign_public_ip.unwrap_or(false);
    let selection = if assign_public_ip {
        SubnetSelection::Public
    } else {
        SubnetSelection::Default
    };
    let subnets = network.select_subnets(selection, id)?;

    let description = format!("{}/{}", stack.name(), group_id);
    let security_group = stack.add(
        group_id,
        SecurityGroupDescriptor {
            description,
            vpc: network.vpc_id().clone(),
            ingress: vec![IngressRule::tcp(Peer::AnyIpv4, config.port)],
        },
    )?;

    let service = stack.add(
        id,
        ServiceDescriptor {
            cluster,
            task_definition,
            desired_count: config.desired_count,
            exposure_port: config.port,
            assign_public_ip,
            service_name: config.service_name.clone(),
            security_groups: vec![security_group],
            subnets,
            circuit_breaker: DeploymentCircuitBreaker::ROLLBACK,
            load_balancers: Vec::new(),
            health_check_grace_period_secs: None,
            scaling: None,
        },
    )?;

    info!(
        stack = %stack.name(),
        id = %id,
        port = config.port,
        desired_count = config.desired_count,
        assign_public_ip = assign_public_ip,
        "Added service"
    );
    Ok(service)
}

/// A service fronted by an application load balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadBalancedService {
    service: ServiceRef,
    load_balancer: LoadBalancerRef,
    listener: ListenerRef,
    target_group: TargetGroupRef,
}

impl LoadBalancedService {
    /// The underlying service, e.g. for attaching scaling
    pub fn service(&self) -> ServiceRef {
        self.service
    }

    pub fn load_balancer(&self) -> LoadBalancerRef {
        self.load_balancer
    }

    pub fn listener(&self) -> ListenerRef {
        self.listener
    }

    pub fn target_group(&self) -> TargetGroupRef {
        self.target_group
    }
}

/// Add a service behind an application load balancer listening on `config.listener_port`
pub fn build_load_balanced_service(
    stack: &mut Stack,
    id: &str,
    cluster: ClusterRef,
    task_definition: TaskDefinitionRef,
    config: &LoadBalancedServiceConfig,
) -> Result<LoadBalancedService, ComposeError> {
    // Only child paths are registered, so the bare id is never checked by the stack
    if id.is_empty() {
        return Err(ComposeError::EmptyId);
    }
    let network = stack.get(cluster)?.network().clone();
    let container = stack.get(task_definition)?.default_container().clone();
    let container_port = match container.port_mappings().first() {
        Some(mapping) => mapping.container_port,
        None => {
            return Err(ComposeError::NoContainerPort {
                task_definition: stack.path_of(task_definition)?.to_string(),
            })
        }
    };

    let public = config.public_endpoint.unwrap_or(true);
    let scheme = Scheme::for_endpoint(public);
    let lb_path = format!("{}/LB", id);
    let lb_subnets = network.select_subnets(
        if public {
            SubnetSelection::Public
        } else {
            SubnetSelection::Default
        },
        &lb_path,
    )?;
    let service_path = format!("{}/Service", id);
    let service_subnets = network.select_subnets(SubnetSelection::Default, &service_path)?;

    let lb_group_path = format!("{}/SecurityGroup", lb_path);
    let target_group_path = format!("{}/PublicListener/ECSGroup", lb_path);
    let listener_path = format!("{}/PublicListener", lb_path);
    let service_group_path = format!("{}/SecurityGroup", service_path);
    stack.ensure_available(&[
        lb_group_path.as_str(),
        lb_path.as_str(),
        target_group_path.as_str(),
        listener_path.as_str(),
        service_group_path.as_str(),
        service_path.as_str(),
    ])?;
    let dns_output = logical_id(&format!("{}/LoadBalancerDNS", id));
    let url_output = logical_id(&format!("{}/ServiceURL", id));
    stack.ensure_output_available(&dns_output)?;
    stack.ensure_output_available(&url_output)?;

    let lb_group_description = format!("{}/{}", stack.name(), lb_group_path);
    let lb_group = stack.add(
        lb_group_path,
        SecurityGroupDescriptor {
            description: lb_group_description,
            vpc: network.vpc_id().clone(),
            ingress: vec![IngressRule::tcp(Peer::AnyIpv4, config.listener_port)],
        },
    )?;
    let load_balancer = stack.add(
        lb_path.clone(),
        LoadBalancerDescriptor {
            scheme,
            subnets: lb_subnets,
            security_groups: vec![lb_group.attr("GroupId")],
        },
    )?;
    let target_group = stack.add(
        target_group_path,
        TargetGroupDescriptor {
            port: container_port,
            vpc: network.vpc_id().clone(),
        },
    )?;
    let listener = stack.add(
        listener_path,
        ListenerDescriptor {
            load_balancer: load_balancer.to_ref(),
            port: config.listener_port,
            default_target_group: target_group.to_ref(),
        },
    )?;

    let service_group_description = format!("{}/{}", stack.name(), service_group_path);
    let service_group = stack.add(
        service_group_path,
        SecurityGroupDescriptor {
            description: service_group_description,
            vpc: network.vpc_id().clone(),
            ingress: vec![IngressRule::tcp(
                Peer::Group(lb_group.attr("GroupId")),
                container_port,
            )],
        },
    )?;

    let service = stack.add_with_dependencies(
        service_path,
        ServiceDescriptor {
            cluster,
            task_definition,
            desired_count: config.desired_count,
            exposure_port: config.listener_port,
            assign_public_ip: false,
            service_name: config.service_name.clone(),
            security_groups: vec![service_group],
            subnets: service_subnets,
            circuit_breaker: DeploymentCircuitBreaker::ROLLBACK,
            load_balancers: vec![LoadBalancerTarget {
                container_name: container.name().to_string(),
                container_port,
                target_group: target_group.to_ref(),
            }],
            health_check_grace_period_secs: Some(HEALTH_CHECK_GRACE_PERIOD_SECS),
            scaling: None,
        },
        vec![listener.id(), target_group.id()],
    )?;

    let dns_name = load_balancer.attr("DNSName");
    stack.add_output(dns_output, dns_name.clone(), None)?;
    stack.add_output(
        url_output,
        Token::Join(vec![Token::literal("http://"), dns_name]),
        None,
    )?;

    info!(
        stack = %stack.name(),
        id = %id,
        listener_port = config.listener_port,
        container_port = container_port,
        scheme = scheme.as_str(),
        desired_count = config.desired_count,
        "Added load-balanced service"
    );
    Ok(LoadBalancedService {
        service,
        load_balancer,
        listener,
        target_group,
    })
}
