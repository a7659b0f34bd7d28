//! Composition library for container-hosting AWS stacks
//!
//! This crate provides:
//! - Configuration records for tasks, containers, services and scaling
//! - An explicit construction context that owns every descriptor
//! - Builders for networks, clusters, task definitions, services,
//!   autoscaling and EC2 instances
//! - Synthesis of the descriptor graph into CloudFormation templates
//! - Composition metrics and structured logging

pub mod cluster;
pub mod context;
pub mod error;
pub mod iam;
pub mod instance;
pub mod load_balancer;
pub mod logs;
pub mod models;
pub mod network;
pub mod observability;
pub mod scaling;
pub mod security_group;
pub mod service;
pub mod synth;
pub mod task_definition;
pub mod token;

pub use cluster::{build_cluster, ClusterDescriptor};
pub use context::{ConstructId, Environment, Handle, Stack};
pub use error::{ComposeError, LookupError, SynthError};
pub use instance::build_instance;
pub use models::*;
pub use network::{
    create_network, lookup_network, NetworkAttributes, NetworkProps, NetworkProvider,
    NetworkQuery, NetworkRef, StaticNetworkProvider,
};
pub use observability::CompositionMetrics;
pub use scaling::set_service_scaling;
pub use service::{build_load_balanced_service, build_service, LoadBalancedService};
pub use synth::{synthesize, CloudAssembly, Template};
pub use task_definition::build_task_definition;
pub use token::Token;

pub use cluster::ClusterRef;
pub use service::ServiceRef;
pub use task_definition::TaskDefinitionRef;
