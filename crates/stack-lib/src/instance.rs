//! Single EC2 instances

use crate::context::{Handle, Parameter, Stack};
use crate::error::ComposeError;
use crate::iam::{InstanceProfileDescriptor, RoleDescriptor};
use crate::models::{InstanceConfig, InstanceType, MachineImage};
use crate::network::{NetworkRef, SubnetSelection};
use crate::security_group::SecurityGroupDescriptor;
use crate::synth::logical_id::sanitize;
use crate::token::Token;
use tracing::info;

pub type InstanceRef = Handle<InstanceDescriptor>;

const EC2_PRINCIPAL: &str = "ec2.amazonaws.com";
const IMAGE_ID_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDescriptor {
    pub instance_type: InstanceType,
    pub image_id: Token,
    pub subnet: Token,
    pub availability_zone: Option<Token>,
    pub security_groups: Vec<Token>,
    pub instance_profile: Token,
    pub user_data: Token,
}

/// Add an instance placed in the first default-selected subnet of `network`
pub fn build_instance(
    stack: &mut Stack,
    id: &str,
    network: &NetworkRef,
    config: &InstanceConfig,
) -> Result<InstanceRef, ComposeError> {
    stack.ensure_network(network)?;
    let group_path = format!("{}/InstanceSecurityGroup", id);
    let role_path = format!("{}/InstanceRole", id);
    let profile_path = format!("{}/InstanceProfile", id);
    stack.ensure_available(&[
        id,
        group_path.as_str(),
        role_path.as_str(),
        profile_path.as_str(),
    ])?;

    let subnets = network.select_subnets(SubnetSelection::Default, id)?;
    let subnet = subnets[0].clone();
    // Subnet groups are laid out one subnet per zone, in zone order
    let availability_zone = network.availability_zone(0).cloned();

    let image_id = match &config.machine_image {
        MachineImage::Ami(ami) => Token::literal(ami),
        image => {
            let ssm_path = image.ssm_parameter().unwrap_or_default();
            let name = format!("SsmParameterValue{}Parameter", sanitize(ssm_path));
            stack.add_parameter(
                name.clone(),
                Parameter {
                    param_type: IMAGE_ID_PARAMETER_TYPE.to_string(),
                    default: Some(ssm_path.to_string()),
                },
            )?;
            Token::Parameter(name)
        }
    };

    let group_description = format!("{}/{}", stack.name(), group_path);
    let group = stack.add(
        group_path,
        SecurityGroupDescriptor {
            description: group_description,
            vpc: network.vpc_id().clone(),
            ingress: Vec::new(),
        },
    )?;
    let role = stack.add(role_path, RoleDescriptor::for_service(EC2_PRINCIPAL))?;
    let profile = stack.add(
        profile_path,
        InstanceProfileDescriptor { roles: vec![role] },
    )?;

    let instance = stack.add_with_dependencies(
        id,
        InstanceDescriptor {
            instance_type: config.instance_type,
            image_id,
            subnet,
            availability_zone,
            security_groups: vec![group.attr("GroupId")],
            instance_profile: profile.to_ref(),
            user_data: Token::Base64(Box::new(Token::literal("#!/bin/bash"))),
        },
        vec![role.id()],
    )?;

    info!(
        stack = %stack.name(),
        id = %id,
        instance_type = %config.instance_type,
        "Added instance"
    );
    Ok(instance)
}
