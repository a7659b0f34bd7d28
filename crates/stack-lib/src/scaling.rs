//! Service autoscaling
//!
//! Registers the service's desired count as a scalable dimension and
//! attaches independent CPU and memory target-tracking policies. The
//! autoscaling engine reconciles the two signals; no ordering between them
//! is expressed here.

use crate::context::{Handle, Stack};
use crate::error::ComposeError;
use crate::models::ServiceScalingConfig;
use crate::service::ServiceRef;
use crate::token::{Pseudo, Token};
use tracing::info;

pub type ScalableTargetRef = Handle<ScalableTargetDescriptor>;
pub type ScalingPolicyRef = Handle<ScalingPolicyDescriptor>;

pub const ECS_DESIRED_COUNT_DIMENSION: &str = "ecs:service:DesiredCount";
pub const ECS_SERVICE_NAMESPACE: &str = "ecs";

const ECS_AUTOSCALING_ROLE: &str = "role/aws-service-role/ecs.application-autoscaling.amazonaws.com/AWSServiceRoleForApplicationAutoScaling_ECSService";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedMetric {
    EcsServiceAverageCpuUtilization,
    EcsServiceAverageMemoryUtilization,
}

impl PredefinedMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredefinedMetric::EcsServiceAverageCpuUtilization => "ECSServiceAverageCPUUtilization",
            PredefinedMetric::EcsServiceAverageMemoryUtilization => {
                "ECSServiceAverageMemoryUtilization"
            }
        }
    }
}

/// Capacity bounds registered for a service's desired count
#[derive(Debug, Clone, PartialEq)]
pub struct ScalableTargetDescriptor {
    pub service: ServiceRef,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// `service/<cluster>/<service name>`
    pub resource_id: Token,
    pub role_arn: Token,
}

impl ScalableTargetDescriptor {
    pub fn scalable_dimension(&self) -> &'static str {
        ECS_DESIRED_COUNT_DIMENSION
    }

    pub fn service_namespace(&self) -> &'static str {
        ECS_SERVICE_NAMESPACE
    }
}

/// Target-tracking policy holding a predefined metric near `target_value`
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingPolicyDescriptor {
    pub target: ScalableTargetRef,
    pub metric: PredefinedMetric,
    pub target_value: f64,
}

/// Attach CPU and memory target tracking to `service`, bounded by `config`
pub fn set_service_scaling(
    stack: &mut Stack,
    service: ServiceRef,
    config: &ServiceScalingConfig,
) -> Result<(), ComposeError> {
    let descriptor = stack.get(service)?;
    let service_path = stack.path_of(service)?.to_string();
    if descriptor.scaling().is_some() {
        return Err(ComposeError::ScalingAlreadyConfigured {
            service: service_path,
        });
    }
    let cluster = descriptor.cluster();

    let target_path = format!("{}/TaskCount/Target", service_path);
    let cpu_path = format!("{}/CpuScaling", target_path);
    let memory_path = format!("{}/MemoryScaling", target_path);
    stack.ensure_available(&[
        target_path.as_str(),
        cpu_path.as_str(),
        memory_path.as_str(),
    ])?;

    let target = stack.add(
        target_path.clone(),
        ScalableTargetDescriptor {
            service,
            min_capacity: config.min_count,
            max_capacity: config.max_count,
            resource_id: Token::Join(vec![
                Token::literal("service/"),
                cluster.to_ref(),
                Token::literal("/"),
                service.attr("Name"),
            ]),
            role_arn: Token::Join(vec![
                Token::literal("arn:"),
                Token::Pseudo(Pseudo::Partition),
                Token::literal(":iam::"),
                Token::Pseudo(Pseudo::AccountId),
                Token::literal(":"),
                Token::literal(ECS_AUTOSCALING_ROLE),
            ]),
        },
    )?;

    stack.add(
        cpu_path,
        ScalingPolicyDescriptor {
            target,
            metric: PredefinedMetric::EcsServiceAverageCpuUtilization,
            target_value: config.cpu_target.percent,
        },
    )?;
    stack.add(
        memory_path,
        ScalingPolicyDescriptor {
            target,
            metric: PredefinedMetric::EcsServiceAverageMemoryUtilization,
            target_value: config.memory_target.percent,
        },
    )?;

    stack.get_mut(service)?.attach_scaling(target);

    info!(
        stack = %stack.name(),
        service = %service_path,
        min = config.min_count,
        max = config.max_count,
        cpu_percent = config.cpu_target.percent,
        memory_percent = config.memory_target.percent,
        "Configured service scaling"
    );
    Ok(())
}
