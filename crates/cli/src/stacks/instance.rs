//! The instance stack: one burstable EC2 instance in the looked-up network

use super::StackDefinition;
use crate::config::AppConfig;
use anyhow::Result;
use stack_lib::{
    build_instance, lookup_network, InstanceClass, InstanceConfig, InstanceSize, InstanceType,
    MachineImage, NetworkProvider, Stack,
};

pub const INSTANCE_STACK: StackDefinition = StackDefinition {
    name: "my-stack",
    description: "Single t2.micro instance on the latest Amazon Linux",
    compose,
};

fn compose(stack: &mut Stack, config: &AppConfig, provider: &dyn NetworkProvider) -> Result<()> {
    let network = lookup_network(stack, provider, &config.network_query())?;
    build_instance(
        stack,
        "my-ec2",
        &network,
        &InstanceConfig {
            instance_type: InstanceType::of(InstanceClass::Burstable2, InstanceSize::Micro),
            machine_image: MachineImage::LatestAmazonLinux,
        },
    )?;
    Ok(())
}
