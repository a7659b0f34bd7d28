//! Lowering descriptors into CloudFormation resources

use super::logical_id::logical_id;
use super::{Template, TemplateOutput, TemplateParameter, TemplateResource};
use crate::context::{ConstructId, Resource, Stack};
use crate::error::ComposeError;
use crate::iam::RoleRef;
use crate::network::SubnetKind;
use crate::security_group::Peer;
use crate::token::{Pseudo, Token};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const POLICY_VERSION: &str = "2012-10-17";

struct Lowering<'a> {
    stack: &'a Stack,
    logical_ids: Vec<String>,
}

impl<'a> Lowering<'a> {
    fn new(stack: &'a Stack) -> Self {
        Self {
            stack,
            logical_ids: stack
                .constructs()
                .map(|(_, construct)| logical_id(&construct.path))
                .collect(),
        }
    }

    fn logical(&self, id: ConstructId) -> Result<&str, ComposeError> {
        self.stack.construct(id)?;
        Ok(&self.logical_ids[id.index()])
    }

    fn token(&self, token: &Token) -> Result<Value, ComposeError> {
        Ok(match token {
            Token::Literal(value) => Value::String(value.clone()),
            Token::Ref(id) => json!({ "Ref": self.logical(*id)? }),
            Token::Attr(id, attribute) => json!({ "Fn::GetAtt": [self.logical(*id)?, attribute] }),
            Token::Parameter(name) => json!({ "Ref": name }),
            Token::Pseudo(pseudo) => json!({ "Ref": pseudo.name() }),
            Token::AvailabilityZone(index) => {
                json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] })
            }
            Token::Join(parts) => json!({ "Fn::Join": ["", self.tokens(parts)?] }),
            Token::Base64(inner) => json!({ "Fn::Base64": self.token(inner)? }),
        })
    }

    fn tokens(&self, tokens: &[Token]) -> Result<Vec<Value>, ComposeError> {
        tokens.iter().map(|token| self.token(token)).collect()
    }

    fn role_refs(&self, roles: &[RoleRef]) -> Result<Vec<Value>, ComposeError> {
        roles.iter().map(|role| self.token(&role.to_ref())).collect()
    }

    fn name_tag(&self, path: &str) -> Value {
        json!([{ "Key": "Name", "Value": format!("{}/{}", self.stack.name(), path) }])
    }

    fn region(&self) -> Value {
        match &self.stack.env().region {
            Some(region) => Value::String(region.clone()),
            None => json!({ "Ref": Pseudo::Region.name() }),
        }
    }

    fn properties(&self, index: usize, path: &str, resource: &Resource) -> Result<Value, ComposeError> {
        let own_id = &self.logical_ids[index];

        Ok(match resource {
            Resource::Vpc(vpc) => json!({
                "CidrBlock": vpc.cidr_block,
                "EnableDnsHostnames": vpc.enable_dns_hostnames,
                "EnableDnsSupport": vpc.enable_dns_support,
                "InstanceTenancy": "default",
                "Tags": self.name_tag(path),
            }),
            Resource::Subnet(subnet) => {
                let (label, public) = match subnet.kind {
                    SubnetKind::Public => ("Public", true),
                    SubnetKind::Isolated => ("Isolated", false),
                };
                json!({
                    "AvailabilityZone": self.token(&subnet.availability_zone)?,
                    "CidrBlock": subnet.cidr_block,
                    "MapPublicIpOnLaunch": public,
                    "Tags": [
                        { "Key": "Name", "Value": format!("{}/{}", self.stack.name(), path) },
                        { "Key": "subnet-type", "Value": label },
                    ],
                    "VpcId": self.token(&subnet.vpc)?,
                })
            }
            Resource::InternetGateway(_) => json!({ "Tags": self.name_tag(path) }),
            Resource::GatewayAttachment(attachment) => json!({
                "InternetGatewayId": self.token(&attachment.internet_gateway)?,
                "VpcId": self.token(&attachment.vpc)?,
            }),
            Resource::RouteTable(table) => json!({
                "Tags": self.name_tag(path),
                "VpcId": self.token(&table.vpc)?,
            }),
            Resource::Route(route) => json!({
                "DestinationCidrBlock": route.destination_cidr,
                "GatewayId": self.token(&route.gateway)?,
                "RouteTableId": self.token(&route.route_table)?,
            }),
            Resource::SubnetRouteTableAssociation(association) => json!({
                "RouteTableId": self.token(&association.route_table)?,
                "SubnetId": self.token(&association.subnet)?,
            }),
            Resource::SecurityGroup(group) => {
                let mut properties = Map::new();
                properties.insert("GroupDescription".into(), json!(group.description));
                properties.insert(
                    "SecurityGroupEgress".into(),
                    json!([{
                        "CidrIp": "0.0.0.0/0",
                        "Description": "Allow all outbound traffic by default",
                        "IpProtocol": "-1",
                    }]),
                );
                if !group.ingress.is_empty() {
                    let mut rules = Vec::with_capacity(group.ingress.len());
                    for rule in &group.ingress {
                        let mut entry = json!({
                            "Description": rule.description,
                            "FromPort": rule.port,
                            "IpProtocol": "tcp",
                            "ToPort": rule.port,
                        });
                        match &rule.peer {
                            Peer::AnyIpv4 => entry["CidrIp"] = json!("0.0.0.0/0"),
                            Peer::Group(source) => {
                                entry["SourceSecurityGroupId"] = self.token(source)?
                            }
                        }
                        rules.push(entry);
                    }
                    properties.insert("SecurityGroupIngress".into(), Value::Array(rules));
                }
                properties.insert("VpcId".into(), self.token(&group.vpc)?);
                Value::Object(properties)
            }
            Resource::Instance(instance) => {
                let mut properties = json!({
                    "IamInstanceProfile": self.token(&instance.instance_profile)?,
                    "ImageId": self.token(&instance.image_id)?,
                    "InstanceType": instance.instance_type.to_string(),
                    "SecurityGroupIds": self.tokens(&instance.security_groups)?,
                    "SubnetId": self.token(&instance.subnet)?,
                    "Tags": self.name_tag(path),
                    "UserData": self.token(&instance.user_data)?,
                });
                if let Some(zone) = &instance.availability_zone {
                    properties["AvailabilityZone"] = self.token(zone)?;
                }
                properties
            }
            Resource::Role(role) => json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": role.assumed_by },
                    }],
                    "Version": POLICY_VERSION,
                },
            }),
            Resource::Policy(policy) => {
                let mut statements = Vec::with_capacity(policy.statements.len());
                for statement in &policy.statements {
                    let resources = self.tokens(&statement.resources)?;
                    statements.push(json!({
                        "Action": one_or_many(statement.actions.iter().map(|a| json!(a)).collect()),
                        "Effect": "Allow",
                        "Resource": one_or_many(resources),
                    }));
                }
                json!({
                    "PolicyDocument": { "Statement": statements, "Version": POLICY_VERSION },
                    "PolicyName": own_id,
                    "Roles": self.role_refs(&policy.roles)?,
                })
            }
            Resource::InstanceProfile(profile) => json!({
                "Roles": self.role_refs(&profile.roles)?,
            }),
            Resource::LogGroup(log_group) => json!({
                "RetentionInDays": log_group.retention.days(),
            }),
            Resource::Cluster(_) => json!({}),
            Resource::TaskDefinition(task_definition) => {
                let container = task_definition.default_container();
                let mut definition = json!({
                    "Essential": container.essential(),
                    "Image": container.image(),
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": self.token(&container.logging().log_group)?,
                            "awslogs-stream-prefix": container.logging().stream_prefix,
                            "awslogs-region": self.region(),
                        },
                    },
                    "Name": container.name(),
                });
                if !container.port_mappings().is_empty() {
                    definition["PortMappings"] = container
                        .port_mappings()
                        .iter()
                        .map(|mapping| {
                            json!({
                                "ContainerPort": mapping.container_port,
                                "Protocol": mapping.protocol.as_str(),
                            })
                        })
                        .collect();
                }
                json!({
                    "ContainerDefinitions": [definition],
                    "Cpu": task_definition.cpu().to_string(),
                    "ExecutionRoleArn": self.token(&task_definition.execution_role().attr("Arn"))?,
                    "Family": task_definition.family(),
                    "Memory": task_definition.memory_limit_mib().to_string(),
                    "NetworkMode": task_definition.network_mode(),
                    "RequiresCompatibilities": ["FARGATE"],
                    "TaskRoleArn": self.token(&task_definition.task_role().attr("Arn"))?,
                })
            }
            Resource::Service(service) => {
                let breaker = service.circuit_breaker();
                let public_ip = if service.assign_public_ip() {
                    "ENABLED"
                } else {
                    "DISABLED"
                };
                let mut security_groups = Vec::with_capacity(service.security_groups().len());
                for group in service.security_groups() {
                    security_groups.push(self.token(&group.attr("GroupId"))?);
                }
                let mut properties = json!({
                    "Cluster": self.token(&service.cluster().to_ref())?,
                    "DeploymentConfiguration": {
                        "DeploymentCircuitBreaker": {
                            "Enable": breaker.enable,
                            "Rollback": breaker.rollback,
                        },
                        "MaximumPercent": 200,
                        "MinimumHealthyPercent": 50,
                    },
                    "DesiredCount": service.desired_count(),
                    "EnableECSManagedTags": false,
                    "LaunchType": service.launch_type().as_str(),
                    "NetworkConfiguration": {
                        "AwsvpcConfiguration": {
                            "AssignPublicIp": public_ip,
                            "SecurityGroups": security_groups,
                            "Subnets": self.tokens(service.subnets())?,
                        },
                    },
                    "TaskDefinition": self.token(&service.task_definition().to_ref())?,
                });
                if let Some(name) = service.service_name() {
                    properties["ServiceName"] = json!(name);
                }
                if let Some(grace) = service.health_check_grace_period_secs() {
                    properties["HealthCheckGracePeriodSeconds"] = json!(grace);
                }
                if !service.load_balancers().is_empty() {
                    let mut targets = Vec::with_capacity(service.load_balancers().len());
                    for target in service.load_balancers() {
                        targets.push(json!({
                            "ContainerName": target.container_name,
                            "ContainerPort": target.container_port,
                            "TargetGroupArn": self.token(&target.target_group)?,
                        }));
                    }
                    properties["LoadBalancers"] = Value::Array(targets);
                }
                properties
            }
            Resource::LoadBalancer(load_balancer) => json!({
                "LoadBalancerAttributes": [
                    { "Key": "deletion_protection.enabled", "Value": "false" },
                ],
                "Scheme": load_balancer.scheme.as_str(),
                "SecurityGroups": self.tokens(&load_balancer.security_groups)?,
                "Subnets": self.tokens(&load_balancer.subnets)?,
                "Type": "application",
            }),
            Resource::Listener(listener) => json!({
                "DefaultActions": [{
                    "TargetGroupArn": self.token(&listener.default_target_group)?,
                    "Type": "forward",
                }],
                "LoadBalancerArn": self.token(&listener.load_balancer)?,
                "Port": listener.port,
                "Protocol": "HTTP",
            }),
            Resource::TargetGroup(target_group) => json!({
                "Port": target_group.port,
                "Protocol": "HTTP",
                "TargetGroupAttributes": [
                    { "Key": "stickiness.enabled", "Value": "false" },
                ],
                "TargetType": "ip",
                "VpcId": self.token(&target_group.vpc)?,
            }),
            Resource::ScalableTarget(target) => json!({
                "MaxCapacity": target.max_capacity,
                "MinCapacity": target.min_capacity,
                "ResourceId": self.token(&target.resource_id)?,
                "RoleARN": self.token(&target.role_arn)?,
                "ScalableDimension": target.scalable_dimension(),
                "ServiceNamespace": target.service_namespace(),
            }),
            Resource::ScalingPolicy(policy) => json!({
                "PolicyName": own_id,
                "PolicyType": "TargetTrackingScaling",
                "ScalingTargetId": self.token(&policy.target.to_ref())?,
                "TargetTrackingScalingPolicyConfiguration": {
                    "PredefinedMetricSpecification": {
                        "PredefinedMetricType": policy.metric.as_str(),
                    },
                    "TargetValue": policy.target_value,
                },
            }),
        })
    }
}

/// IAM accepts a bare value where a list has one element
fn one_or_many(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

/// Lower every construct, parameter and output of `stack`
pub(super) fn lower(stack: &Stack) -> Result<Template, ComposeError> {
    let lowering = Lowering::new(stack);
    let mut resources = BTreeMap::new();

    for (id, construct) in stack.constructs() {
        let logical = lowering.logical_ids[id.index()].clone();
        let mut depends_on = Vec::with_capacity(construct.depends_on.len());
        for dependency in &construct.depends_on {
            depends_on.push(lowering.logical(*dependency)?.to_string());
        }
        depends_on.sort();

        let retain = matches!(construct.resource, Resource::LogGroup(_));
        resources.insert(
            logical,
            TemplateResource {
                resource_type: construct.resource.cfn_type().to_string(),
                properties: lowering.properties(id.index(), &construct.path, &construct.resource)?,
                depends_on,
                update_replace_policy: retain.then(|| "Retain".to_string()),
                deletion_policy: retain.then(|| "Retain".to_string()),
                metadata: json!({ "infra:path": format!("{}/{}", stack.name(), construct.path) }),
            },
        );
    }

    let parameters = stack
        .parameters()
        .iter()
        .map(|(name, parameter)| {
            (
                name.clone(),
                TemplateParameter {
                    param_type: parameter.param_type.clone(),
                    default: parameter.default.clone(),
                },
            )
        })
        .collect();

    let mut outputs = BTreeMap::new();
    for (key, output) in stack.outputs() {
        outputs.insert(
            key.clone(),
            TemplateOutput {
                description: output.description.clone(),
                value: lowering.token(&output.value)?,
            },
        );
    }

    Ok(Template {
        parameters,
        resources,
        outputs,
    })
}
