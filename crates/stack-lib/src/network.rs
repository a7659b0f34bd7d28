//! Network resolution
//!
//! A stack resolves exactly one network, either by looking up an existing
//! VPC through a [`NetworkProvider`] or by provisioning a new one with
//! [`create_network`]. The resulting [`NetworkRef`] is immutable and is
//! cloned into every descriptor that is scoped to the network.

use crate::context::Stack;
use crate::error::{ComposeError, LookupError};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

/// Handle to the isolated network a stack deploys into
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRef {
    vpc_id: Token,
    availability_zones: Vec<Token>,
    public_subnets: Vec<Token>,
    private_subnets: Vec<Token>,
}

/// Which subnets a resource should be placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetSelection {
    /// Public subnets only
    Public,
    /// Private subnets, falling back to public ones when the network has none
    Default,
}

impl NetworkRef {
    pub fn vpc_id(&self) -> &Token {
        &self.vpc_id
    }

    pub fn availability_zones(&self) -> &[Token] {
        &self.availability_zones
    }

    pub fn public_subnets(&self) -> &[Token] {
        &self.public_subnets
    }

    pub fn private_subnets(&self) -> &[Token] {
        &self.private_subnets
    }

    /// Subnets matching `selection`, or `NoSubnets` naming the construct being placed
    pub fn select_subnets(
        &self,
        selection: SubnetSelection,
        path: &str,
    ) -> Result<Vec<Token>, ComposeError> {
        let (group, subnets) = match selection {
            SubnetSelection::Public => ("public", &self.public_subnets),
            SubnetSelection::Default if !self.private_subnets.is_empty() => {
                ("private", &self.private_subnets)
            }
            SubnetSelection::Default => ("public", &self.public_subnets),
        };
        if subnets.is_empty() {
            return Err(ComposeError::NoSubnets {
                group,
                path: path.to_string(),
            });
        }
        Ok(subnets.clone())
    }

    /// Availability zone hosting the `index`th subnet of either group
    pub fn availability_zone(&self, index: usize) -> Option<&Token> {
        self.availability_zones.get(index)
    }
}

/// Criteria for looking up an existing network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkQuery {
    /// The account's default VPC
    Default,
    /// The VPC whose `Name` tag matches
    Named(String),
}

impl NetworkQuery {
    /// Named lookup when a selector is given, otherwise the default network
    pub fn from_selector(name: Option<&str>) -> Self {
        match name {
            Some(name) if !name.is_empty() => NetworkQuery::Named(name.to_string()),
            _ => NetworkQuery::Default,
        }
    }

    fn matches(&self, network: &NetworkAttributes) -> bool {
        match self {
            NetworkQuery::Default => network.is_default,
            NetworkQuery::Named(name) => network.name.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for NetworkQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkQuery::Default => write!(f, "is_default=true"),
            NetworkQuery::Named(name) => write!(f, "name={}", name),
        }
    }
}

/// Attributes of an existing network as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttributes {
    pub vpc_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub availability_zones: Vec<String>,
    #[serde(default)]
    pub public_subnet_ids: Vec<String>,
    #[serde(default)]
    pub private_subnet_ids: Vec<String>,
}

/// External collaborator that resolves network lookups
pub trait NetworkProvider {
    fn lookup(&self, query: &NetworkQuery) -> Result<NetworkAttributes, LookupError>;
}

/// Provider backed by a fixed list of known networks
#[derive(Debug, Clone, Default)]
pub struct StaticNetworkProvider {
    networks: Vec<NetworkAttributes>,
}

#[derive(Deserialize)]
struct NetworkContext {
    #[serde(default)]
    networks: Vec<NetworkAttributes>,
}

impl StaticNetworkProvider {
    pub fn new(networks: Vec<NetworkAttributes>) -> Self {
        Self { networks }
    }

    /// Parse a context document of the form `{"networks": [...]}`
    pub fn from_json(json: &str) -> Result<Self, LookupError> {
        let context: NetworkContext = serde_json::from_str(json)?;
        Ok(Self::new(context.networks))
    }

    /// Load a context document from disk
    pub fn from_context_file(path: &Path) -> Result<Self, LookupError> {
        let content = std::fs::read_to_string(path).map_err(|source| LookupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn networks(&self) -> &[NetworkAttributes] {
        &self.networks
    }
}

impl NetworkProvider for StaticNetworkProvider {
    fn lookup(&self, query: &NetworkQuery) -> Result<NetworkAttributes, LookupError> {
        let mut matches = self.networks.iter().filter(|network| query.matches(network));
        let first = matches.next().ok_or_else(|| LookupError::NotFound {
            query: query.to_string(),
        })?;
        let extra = matches.count();
        if extra > 0 {
            return Err(LookupError::Ambiguous {
                query: query.to_string(),
                count: extra + 1,
            });
        }
        Ok(first.clone())
    }
}

/// Resolve an existing network and pin it to the stack
pub fn lookup_network(
    stack: &mut Stack,
    provider: &dyn NetworkProvider,
    query: &NetworkQuery,
) -> Result<NetworkRef, ComposeError> {
    stack.ensure_network_unresolved()?;
    let attributes = provider.lookup(query)?;

    let network = NetworkRef {
        vpc_id: Token::literal(&attributes.vpc_id),
        availability_zones: attributes
            .availability_zones
            .iter()
            .map(Token::literal)
            .collect(),
        public_subnets: attributes
            .public_subnet_ids
            .iter()
            .map(Token::literal)
            .collect(),
        private_subnets: attributes
            .private_subnet_ids
            .iter()
            .map(Token::literal)
            .collect(),
    };
    stack.pin_network(network.clone())?;

    info!(
        stack = %stack.name(),
        query = %query,
        vpc_id = %attributes.vpc_id,
        public_subnets = attributes.public_subnet_ids.len(),
        private_subnets = attributes.private_subnet_ids.len(),
        "Resolved network"
    );
    Ok(network)
}

/// Settings for a newly provisioned network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProps {
    pub cidr: String,
    pub max_azs: usize,
}

impl Default for NetworkProps {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VpcDescriptor {
    pub cidr_block: String,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetKind {
    Public,
    Isolated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubnetDescriptor {
    pub vpc: Token,
    pub cidr_block: String,
    pub availability_zone: Token,
    pub kind: SubnetKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternetGatewayDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayAttachmentDescriptor {
    pub vpc: Token,
    pub internet_gateway: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteTableDescriptor {
    pub vpc: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub route_table: Token,
    pub destination_cidr: String,
    pub gateway: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubnetRouteTableAssociationDescriptor {
    pub subnet: Token,
    pub route_table: Token,
}

/// Carve `count` consecutive /24 blocks out of a VPC range
fn carve_subnets(cidr: &str, count: usize) -> Result<Vec<String>, ComposeError> {
    let invalid = || ComposeError::InvalidCidr(cidr.to_string());
    let (address, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let address: Ipv4Addr = address.parse().map_err(|_| invalid())?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 24 {
        return Err(invalid());
    }
    let capacity = 1usize << (24 - prefix);
    if count > capacity {
        return Err(invalid());
    }

    let base = u32::from(address) & u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    Ok((0..count as u32)
        .map(|i| format!("{}/24", Ipv4Addr::from(base + (i << 8))))
        .collect())
}

fn subnet_path(id: &str, kind: SubnetKind, az: usize) -> String {
    let label = match kind {
        SubnetKind::Public => "PublicSubnet",
        SubnetKind::Isolated => "PrivateSubnet",
    };
    format!("{}/{}{}", id, label, az + 1)
}

/// Every construct path `create_network` registers under `id`
fn network_paths(id: &str, max_azs: usize) -> Vec<String> {
    let mut paths = vec![id.to_string(), format!("{}/IGW", id), format!("{}/VPCGW", id)];
    for az in 0..max_azs {
        for kind in [SubnetKind::Public, SubnetKind::Isolated] {
            let subnet = subnet_path(id, kind, az);
            paths.push(format!("{}/RouteTable", subnet));
            paths.push(format!("{}/RouteTableAssociation", subnet));
            if kind == SubnetKind::Public {
                paths.push(format!("{}/DefaultRoute", subnet));
            }
            paths.push(subnet);
        }
    }
    paths
}

/// Provision a new VPC with one public and one isolated subnet per availability zone
pub fn create_network(
    stack: &mut Stack,
    id: &str,
    props: &NetworkProps,
) -> Result<NetworkRef, ComposeError> {
    stack.ensure_network_unresolved()?;
    let blocks = carve_subnets(&props.cidr, props.max_azs * 2)?;
    stack.ensure_available(&network_paths(id, props.max_azs))?;

    let vpc = stack.add(
        id,
        VpcDescriptor {
            cidr_block: props.cidr.clone(),
            enable_dns_hostnames: true,
            enable_dns_support: true,
        },
    )?;
    let igw = stack.add(format!("{}/IGW", id), InternetGatewayDescriptor)?;
    let attachment = stack.add(
        format!("{}/VPCGW", id),
        GatewayAttachmentDescriptor {
            vpc: vpc.to_ref(),
            internet_gateway: igw.to_ref(),
        },
    )?;

    let mut availability_zones = Vec::with_capacity(props.max_azs);
    let mut public_subnets = Vec::with_capacity(props.max_azs);
    let mut private_subnets = Vec::with_capacity(props.max_azs);

    for az in 0..props.max_azs {
        let zone = Token::AvailabilityZone(az);
        availability_zones.push(zone.clone());

        for (kind, block) in [
            (SubnetKind::Public, &blocks[az]),
            (SubnetKind::Isolated, &blocks[props.max_azs + az]),
        ] {
            let subnet_path = subnet_path(id, kind, az);

            let subnet = stack.add(
                subnet_path.clone(),
                SubnetDescriptor {
                    vpc: vpc.to_ref(),
                    cidr_block: block.clone(),
                    availability_zone: zone.clone(),
                    kind,
                },
            )?;
            let route_table = stack.add(
                format!("{}/RouteTable", subnet_path),
                RouteTableDescriptor { vpc: vpc.to_ref() },
            )?;
            stack.add(
                format!("{}/RouteTableAssociation", subnet_path),
                SubnetRouteTableAssociationDescriptor {
                    subnet: subnet.to_ref(),
                    route_table: route_table.to_ref(),
                },
            )?;

            match kind {
                SubnetKind::Public => {
                    stack.add_with_dependencies(
                        format!("{}/DefaultRoute", subnet_path),
                        RouteDescriptor {
                            route_table: route_table.to_ref(),
                            destination_cidr: "0.0.0.0/0".to_string(),
                            gateway: igw.to_ref(),
                        },
                        vec![attachment.id()],
                    )?;
                    public_subnets.push(subnet.to_ref());
                }
                SubnetKind::Isolated => private_subnets.push(subnet.to_ref()),
            }
        }
    }

    let network = NetworkRef {
        vpc_id: vpc.to_ref(),
        availability_zones,
        public_subnets,
        private_subnets,
    };
    stack.pin_network(network.clone())?;

    info!(
        stack = %stack.name(),
        id = %id,
        cidr = %props.cidr,
        availability_zones = props.max_azs,
        "Provisioned network"
    );
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;

    fn default_vpc() -> NetworkAttributes {
        NetworkAttributes {
            vpc_id: "vpc-default".to_string(),
            name: None,
            is_default: true,
            availability_zones: vec!["eu-west-1a".to_string(), "eu-west-1b".to_string()],
            public_subnet_ids: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            private_subnet_ids: Vec::new(),
        }
    }

    fn named_vpc(name: &str) -> NetworkAttributes {
        NetworkAttributes {
            vpc_id: format!("vpc-{}", name),
            name: Some(name.to_string()),
            is_default: false,
            availability_zones: vec!["eu-west-1a".to_string()],
            public_subnet_ids: vec![format!("subnet-{}-public", name)],
            private_subnet_ids: vec![format!("subnet-{}-private", name)],
        }
    }

    #[test]
    fn test_lookup_default_network() {
        let provider = StaticNetworkProvider::new(vec![default_vpc(), named_vpc("prod")]);
        let mut stack = Stack::new("test", Environment::default());

        let network = lookup_network(&mut stack, &provider, &NetworkQuery::Default).unwrap();

        assert_eq!(network.vpc_id(), &Token::literal("vpc-default"));
        assert_eq!(network.public_subnets().len(), 2);
        assert_eq!(stack.network(), Some(&network));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_lookup_by_name() {
        let provider = StaticNetworkProvider::new(vec![default_vpc(), named_vpc("prod")]);
        let mut stack = Stack::new("test", Environment::default());

        let network =
            lookup_network(&mut stack, &provider, &NetworkQuery::Named("prod".into())).unwrap();
        assert_eq!(network.vpc_id(), &Token::literal("vpc-prod"));
    }

    #[test]
    fn test_lookup_not_found_propagates() {
        let provider = StaticNetworkProvider::new(vec![default_vpc()]);
        let mut stack = Stack::new("test", Environment::default());

        let err = lookup_network(&mut stack, &provider, &NetworkQuery::Named("missing".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Lookup(LookupError::NotFound { ref query }) if query == "name=missing"
        ));
        assert!(stack.network().is_none());
    }

    #[test]
    fn test_lookup_ambiguous() {
        let provider = StaticNetworkProvider::new(vec![named_vpc("dup"), named_vpc("dup")]);
        let mut stack = Stack::new("test", Environment::default());

        let err =
            lookup_network(&mut stack, &provider, &NetworkQuery::Named("dup".into())).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Lookup(LookupError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_only_one_network_per_stack() {
        let provider = StaticNetworkProvider::new(vec![default_vpc()]);
        let mut stack = Stack::new("test", Environment::default());
        lookup_network(&mut stack, &provider, &NetworkQuery::Default).unwrap();

        assert!(matches!(
            lookup_network(&mut stack, &provider, &NetworkQuery::Default),
            Err(ComposeError::NetworkAlreadyResolved { .. })
        ));
        assert!(matches!(
            create_network(&mut stack, "vpc", &NetworkProps::default()),
            Err(ComposeError::NetworkAlreadyResolved { .. })
        ));
    }

    #[test]
    fn test_context_file_parsing() {
        let json = r#"{
            "networks": [
                {"vpc_id": "vpc-1", "is_default": true, "public_subnet_ids": ["subnet-1"]}
            ]
        }"#;
        let provider = StaticNetworkProvider::from_json(json).unwrap();
        assert_eq!(provider.networks().len(), 1);
        assert!(provider.networks()[0].private_subnet_ids.is_empty());
    }

    #[test]
    fn test_selector_defaults_to_default_network() {
        assert_eq!(NetworkQuery::from_selector(None), NetworkQuery::Default);
        assert_eq!(NetworkQuery::from_selector(Some("")), NetworkQuery::Default);
        assert_eq!(
            NetworkQuery::from_selector(Some("prod")),
            NetworkQuery::Named("prod".into())
        );
    }

    #[test]
    fn test_create_network_layout() {
        let mut stack = Stack::new("test", Environment::default());
        let network = create_network(&mut stack, "vpc", &NetworkProps::default()).unwrap();

        assert_eq!(stack.count_of("AWS::EC2::VPC"), 1);
        assert_eq!(stack.count_of("AWS::EC2::Subnet"), 4);
        assert_eq!(stack.count_of("AWS::EC2::RouteTable"), 4);
        assert_eq!(stack.count_of("AWS::EC2::Route"), 2);
        assert_eq!(stack.count_of("AWS::EC2::InternetGateway"), 1);
        assert_eq!(network.public_subnets().len(), 2);
        assert_eq!(network.private_subnets().len(), 2);
        assert!(matches!(network.vpc_id(), Token::Ref(_)));
    }

    #[test]
    fn test_failed_network_adds_nothing() {
        let mut stack = Stack::new("test", Environment::default());
        stack
            .add(
                "vpc/PrivateSubnet2/RouteTable",
                crate::logs::LogGroupDescriptor {
                    retention: crate::logs::RetentionDays::OneDay,
                },
            )
            .unwrap();

        let err = create_network(&mut stack, "vpc", &NetworkProps::default()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::DuplicateId(path) if path == "vpc/PrivateSubnet2/RouteTable"
        ));
        assert_eq!(stack.len(), 1);
        assert!(stack.network().is_none());

        assert!(matches!(
            create_network(&mut stack, "", &NetworkProps::default()),
            Err(ComposeError::EmptyId)
        ));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_network_paths_match_registrations() {
        let mut stack = Stack::new("test", Environment::default());
        create_network(&mut stack, "vpc", &NetworkProps::default()).unwrap();

        let mut registered: Vec<&str> = stack
            .constructs()
            .map(|(_, construct)| construct.path.as_str())
            .collect();
        registered.sort_unstable();
        let mut expected = network_paths("vpc", NetworkProps::default().max_azs);
        expected.sort_unstable();
        assert_eq!(registered, expected);
    }

    #[test]
    fn test_carve_subnets() {
        let blocks = carve_subnets("10.0.0.0/16", 4).unwrap();
        assert_eq!(
            blocks,
            vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"]
        );

        assert!(carve_subnets("10.0.0.0/25", 1).is_err());
        assert!(carve_subnets("10.0.0.0/24", 2).is_err());
        assert!(carve_subnets("not-a-cidr", 1).is_err());
    }

    #[test]
    fn test_default_selection_falls_back_to_public() {
        let provider = StaticNetworkProvider::new(vec![default_vpc()]);
        let mut stack = Stack::new("test", Environment::default());
        let network = lookup_network(&mut stack, &provider, &NetworkQuery::Default).unwrap();

        let subnets = network
            .select_subnets(SubnetSelection::Default, "svc")
            .unwrap();
        assert_eq!(subnets, network.public_subnets().to_vec());
    }

    #[test]
    fn test_public_selection_requires_public_subnets() {
        let network = NetworkRef {
            vpc_id: Token::literal("vpc-1"),
            availability_zones: Vec::new(),
            public_subnets: Vec::new(),
            private_subnets: vec![Token::literal("subnet-private")],
        };
        let err = network
            .select_subnets(SubnetSelection::Public, "svc")
            .unwrap_err();
        assert!(matches!(err, ComposeError::NoSubnets { group: "public", .. }));
    }
}
