//! Configuration records for stack composition

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sizing and identity for one task definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// CPU units (1024 = one vCPU)
    pub cpu: u32,
    pub memory_limit_mib: u32,
    /// Task family, also used as the log stream prefix
    pub family: String,
}

/// One container image and the TCP ports it exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Registry-qualified image reference, e.g. `httpd` or `public.ecr.aws/nginx/nginx:1.25`
    pub image: String,
    #[serde(default)]
    pub tcp_ports: Vec<u16>,
}

/// Exposure parameters for a service without a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Port opened to any source on the service's security group
    pub port: u16,
    pub desired_count: u32,
    /// Defaults to disabled
    #[serde(default)]
    pub assign_public_ip: Option<bool>,
    #[serde(default)]
    pub service_name: Option<String>,
}

/// Exposure parameters for a service behind an application load balancer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadBalancedServiceConfig {
    pub listener_port: u16,
    pub desired_count: u32,
    /// Internet-facing when unset or true, internal when false
    #[serde(default)]
    pub public_endpoint: Option<bool>,
    #[serde(default)]
    pub service_name: Option<String>,
}

/// Target utilization percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingThreshold {
    pub percent: f64,
}

impl ScalingThreshold {
    pub fn percent(percent: f64) -> Self {
        Self { percent }
    }
}

/// Bounds and utilization targets for service autoscaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceScalingConfig {
    pub min_count: u32,
    pub max_count: u32,
    pub cpu_target: ScalingThreshold,
    pub memory_target: ScalingThreshold,
}

/// EC2 instance family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceClass {
    Burstable2,
    Burstable3,
    Burstable3Amd,
    Burstable4Graviton,
    Standard5,
    Compute5,
    Memory5,
}

impl InstanceClass {
    fn prefix(&self) -> &'static str {
        match self {
            InstanceClass::Burstable2 => "t2",
            InstanceClass::Burstable3 => "t3",
            InstanceClass::Burstable3Amd => "t3a",
            InstanceClass::Burstable4Graviton => "t4g",
            InstanceClass::Standard5 => "m5",
            InstanceClass::Compute5 => "c5",
            InstanceClass::Memory5 => "r5",
        }
    }
}

/// EC2 instance size within a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceSize {
    Nano,
    Micro,
    Small,
    Medium,
    Large,
    Xlarge,
    Xlarge2,
}

impl InstanceSize {
    fn suffix(&self) -> &'static str {
        match self {
            InstanceSize::Nano => "nano",
            InstanceSize::Micro => "micro",
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
            InstanceSize::Xlarge => "xlarge",
            InstanceSize::Xlarge2 => "2xlarge",
        }
    }
}

/// Concrete instance type such as `t2.micro`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl InstanceType {
    pub fn of(class: InstanceClass, size: InstanceSize) -> Self {
        Self { class, size }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class.prefix(), self.size.suffix())
    }
}

/// Source of the AMI an instance boots from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineImage {
    /// Latest Amazon Linux (HVM, x86_64, gp2) resolved through SSM
    LatestAmazonLinux,
    /// Latest Amazon Linux 2 resolved through SSM
    LatestAmazonLinux2,
    /// Fixed AMI id
    Ami(String),
}

impl MachineImage {
    /// SSM parameter name holding the image id, if resolved at deploy time
    pub fn ssm_parameter(&self) -> Option<&'static str> {
        match self {
            MachineImage::LatestAmazonLinux => {
                Some("/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2")
            }
            MachineImage::LatestAmazonLinux2 => {
                Some("/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2")
            }
            MachineImage::Ami(_) => None,
        }
    }
}

/// Settings for a single EC2 instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
}
