//! Construction context
//!
//! A [`Stack`] owns every descriptor registered during composition. Builders
//! receive it by `&mut` and hand back typed [`Handle`]s; nothing is global,
//! so a composition pass is reproducible and testable on its own.
//!
//! The context is append-only. Constructs are never removed or replaced.

use crate::cluster::ClusterDescriptor;
use crate::error::ComposeError;
use crate::iam::{InstanceProfileDescriptor, PolicyDescriptor, RoleDescriptor};
use crate::instance::InstanceDescriptor;
use crate::load_balancer::{ListenerDescriptor, LoadBalancerDescriptor, TargetGroupDescriptor};
use crate::logs::LogGroupDescriptor;
use crate::network::{
    GatewayAttachmentDescriptor, InternetGatewayDescriptor, NetworkRef, RouteDescriptor,
    RouteTableDescriptor, SubnetDescriptor, SubnetRouteTableAssociationDescriptor, VpcDescriptor,
};
use crate::observability::CompositionMetrics;
use crate::scaling::{ScalableTargetDescriptor, ScalingPolicyDescriptor};
use crate::security_group::SecurityGroupDescriptor;
use crate::service::ServiceDescriptor;
use crate::task_definition::TaskDefinitionDescriptor;
use crate::token::Token;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_STACK_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Target account and region of a stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }
}

/// Untyped identity of a registered construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstructId {
    stack: u64,
    index: usize,
}

impl ConstructId {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Typed identity of a registered construct.
///
/// Two handles are equal only if they name the same construct in the same
/// stack, which is how descriptor references are compared.
pub struct Handle<T> {
    id: ConstructId,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(id: ConstructId) -> Self {
        Self {
            id,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> ConstructId {
        self.id
    }

    /// `Ref` to this construct
    pub fn to_ref(&self) -> Token {
        Token::Ref(self.id)
    }

    /// `Fn::GetAtt` on this construct
    pub fn attr(&self, name: &'static str) -> Token {
        Token::Attr(self.id, name)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

/// A descriptor kind that can be stored in a stack
pub trait Kind: Sized {
    /// CloudFormation resource type the descriptor renders to
    const CFN_TYPE: &'static str;

    fn into_resource(self) -> Resource;
    fn from_resource(resource: &Resource) -> Option<&Self>;
    fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self>;
}

macro_rules! resource_kinds {
    ($($variant:ident($ty:ty) => $cfn:literal),* $(,)?) => {
        /// Every descriptor kind a stack can hold
        #[derive(Debug, Clone, PartialEq)]
        pub enum Resource {
            $($variant($ty)),*
        }

        impl Resource {
            pub fn cfn_type(&self) -> &'static str {
                match self {
                    $(Resource::$variant(_) => $cfn),*
                }
            }
        }

        $(
            impl Kind for $ty {
                const CFN_TYPE: &'static str = $cfn;

                fn into_resource(self) -> Resource {
                    Resource::$variant(self)
                }

                fn from_resource(resource: &Resource) -> Option<&Self> {
                    match resource {
                        Resource::$variant(descriptor) => Some(descriptor),
                        _ => None,
                    }
                }

                fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self> {
                    match resource {
                        Resource::$variant(descriptor) => Some(descriptor),
                        _ => None,
                    }
                }
            }
        )*
    };
}

resource_kinds! {
    Vpc(VpcDescriptor) => "AWS::EC2::VPC",
    Subnet(SubnetDescriptor) => "AWS::EC2::Subnet",
    InternetGateway(InternetGatewayDescriptor) => "AWS::EC2::InternetGateway",
    GatewayAttachment(GatewayAttachmentDescriptor) => "AWS::EC2::VPCGatewayAttachment",
    RouteTable(RouteTableDescriptor) => "AWS::EC2::RouteTable",
    Route(RouteDescriptor) => "AWS::EC2::Route",
    SubnetRouteTableAssociation(SubnetRouteTableAssociationDescriptor) => "AWS::EC2::SubnetRouteTableAssociation",
    SecurityGroup(SecurityGroupDescriptor) => "AWS::EC2::SecurityGroup",
    Instance(InstanceDescriptor) => "AWS::EC2::Instance",
    Role(RoleDescriptor) => "AWS::IAM::Role",
    Policy(PolicyDescriptor) => "AWS::IAM::Policy",
    InstanceProfile(InstanceProfileDescriptor) => "AWS::IAM::InstanceProfile",
    LogGroup(LogGroupDescriptor) => "AWS::Logs::LogGroup",
    Cluster(ClusterDescriptor) => "AWS::ECS::Cluster",
    TaskDefinition(TaskDefinitionDescriptor) => "AWS::ECS::TaskDefinition",
    Service(ServiceDescriptor) => "AWS::ECS::Service",
    LoadBalancer(LoadBalancerDescriptor) => "AWS::ElasticLoadBalancingV2::LoadBalancer",
    Listener(ListenerDescriptor) => "AWS::ElasticLoadBalancingV2::Listener",
    TargetGroup(TargetGroupDescriptor) => "AWS::ElasticLoadBalancingV2::TargetGroup",
    ScalableTarget(ScalableTargetDescriptor) => "AWS::ApplicationAutoScaling::ScalableTarget",
    ScalingPolicy(ScalingPolicyDescriptor) => "AWS::ApplicationAutoScaling::ScalingPolicy",
}

/// A registered descriptor and its position in the construct tree
#[derive(Debug, Clone, PartialEq)]
pub struct Construct {
    /// Caller-supplied identifier, `/`-separated for nested constructs
    pub path: String,
    pub resource: Resource,
    pub depends_on: Vec<ConstructId>,
}

/// Template parameter resolved by the deployment engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub param_type: String,
    pub default: Option<String>,
}

/// Stack output exported after deployment
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Token,
    pub description: Option<String>,
}

/// Construction context for one deployable stack
#[derive(Debug)]
pub struct Stack {
    token: u64,
    name: String,
    env: Environment,
    constructs: Vec<Construct>,
    paths: HashSet<String>,
    network: Option<NetworkRef>,
    parameters: BTreeMap<String, Parameter>,
    outputs: BTreeMap<String, Output>,
    metrics: CompositionMetrics,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: Environment) -> Self {
        Self {
            token: NEXT_STACK_TOKEN.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            env,
            constructs: Vec::new(),
            paths: HashSet::new(),
            network: None,
            parameters: BTreeMap::new(),
            outputs: BTreeMap::new(),
            metrics: CompositionMetrics::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Register a descriptor under a path unique in this stack
    pub fn add<T: Kind>(
        &mut self,
        path: impl Into<String>,
        descriptor: T,
    ) -> Result<Handle<T>, ComposeError> {
        self.add_with_dependencies(path, descriptor, Vec::new())
    }

    /// Register a descriptor that must be created after `depends_on`
    pub fn add_with_dependencies<T: Kind>(
        &mut self,
        path: impl Into<String>,
        descriptor: T,
        depends_on: Vec<ConstructId>,
    ) -> Result<Handle<T>, ComposeError> {
        let path = path.into();
        if path.is_empty() {
            return Err(ComposeError::EmptyId);
        }
        if self.paths.contains(&path) {
            return Err(ComposeError::DuplicateId(path));
        }
        for dependency in &depends_on {
            self.check_owned(*dependency)?;
        }

        let id = ConstructId {
            stack: self.token,
            index: self.constructs.len(),
        };
        debug!(
            stack = %self.name,
            path = %path,
            resource_type = T::CFN_TYPE,
            "Registered construct"
        );
        self.metrics.inc_resources_registered(T::CFN_TYPE);

        self.paths.insert(path.clone());
        self.constructs.push(Construct {
            path,
            resource: descriptor.into_resource(),
            depends_on,
        });
        Ok(Handle::new(id))
    }

    /// Check that every path a builder is about to register is free, so a
    /// failing builder leaves the stack untouched
    pub(crate) fn ensure_available<S: AsRef<str>>(
        &self,
        paths: &[S],
    ) -> Result<(), ComposeError> {
        let mut pending = HashSet::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            if path.is_empty() {
                return Err(ComposeError::EmptyId);
            }
            if self.paths.contains(path) || !pending.insert(path) {
                return Err(ComposeError::DuplicateId(path.to_string()));
            }
        }
        Ok(())
    }

    /// Resolve a handle to its descriptor
    pub fn get<T: Kind>(&self, handle: Handle<T>) -> Result<&T, ComposeError> {
        let construct = self.construct(handle.id())?;
        T::from_resource(&construct.resource).ok_or_else(|| ComposeError::KindMismatch {
            path: construct.path.clone(),
            expected: T::CFN_TYPE,
        })
    }

    pub(crate) fn get_mut<T: Kind>(&mut self, handle: Handle<T>) -> Result<&mut T, ComposeError> {
        self.check_owned(handle.id())?;
        let construct = &mut self.constructs[handle.id().index];
        let path = construct.path.clone();
        T::from_resource_mut(&mut construct.resource).ok_or(ComposeError::KindMismatch {
            path,
            expected: T::CFN_TYPE,
        })
    }

    /// Look up any construct by identity
    pub fn construct(&self, id: ConstructId) -> Result<&Construct, ComposeError> {
        self.check_owned(id)?;
        Ok(&self.constructs[id.index])
    }

    /// Path of the construct behind a handle
    pub fn path_of<T>(&self, handle: Handle<T>) -> Result<&str, ComposeError> {
        self.construct(handle.id()).map(|construct| construct.path.as_str())
    }

    /// All constructs in registration order
    pub fn constructs(&self) -> impl Iterator<Item = (ConstructId, &Construct)> {
        let token = self.token;
        self.constructs
            .iter()
            .enumerate()
            .map(move |(index, construct)| (ConstructId { stack: token, index }, construct))
    }

    pub fn len(&self) -> usize {
        self.constructs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructs.is_empty()
    }

    /// Number of constructs rendering to a CloudFormation type
    pub fn count_of(&self, cfn_type: &str) -> usize {
        self.constructs
            .iter()
            .filter(|construct| construct.resource.cfn_type() == cfn_type)
            .count()
    }

    /// The network pinned to this stack, if resolved
    pub fn network(&self) -> Option<&NetworkRef> {
        self.network.as_ref()
    }

    pub(crate) fn pin_network(&mut self, network: NetworkRef) -> Result<(), ComposeError> {
        if self.network.is_some() {
            return Err(ComposeError::NetworkAlreadyResolved {
                stack: self.name.clone(),
            });
        }
        self.network = Some(network);
        Ok(())
    }

    /// Reject networks other than the one pinned to this stack
    pub(crate) fn ensure_network(&self, network: &NetworkRef) -> Result<(), ComposeError> {
        if self.network.as_ref() != Some(network) {
            return Err(ComposeError::NetworkNotResolved {
                stack: self.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_network_unresolved(&self) -> Result<(), ComposeError> {
        if self.network.is_some() {
            return Err(ComposeError::NetworkAlreadyResolved {
                stack: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Declare a template parameter. Re-declaring an identical parameter is a no-op.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), ComposeError> {
        let name = name.into();
        match self.parameters.get(&name) {
            Some(existing) if *existing == parameter => Ok(()),
            Some(_) => Err(ComposeError::ConflictingParameter(name)),
            None => {
                self.parameters.insert(name, parameter);
                Ok(())
            }
        }
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub(crate) fn ensure_output_available(&self, key: &str) -> Result<(), ComposeError> {
        if self.outputs.contains_key(key) {
            return Err(ComposeError::DuplicateOutput(key.to_string()));
        }
        Ok(())
    }

    pub fn add_output(
        &mut self,
        key: impl Into<String>,
        value: Token,
        description: Option<String>,
    ) -> Result<(), ComposeError> {
        let key = key.into();
        self.ensure_output_available(&key)?;
        self.outputs.insert(key, Output { value, description });
        Ok(())
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    fn check_owned(&self, id: ConstructId) -> Result<(), ComposeError> {
        if id.stack != self.token || id.index >= self.constructs.len() {
            return Err(ComposeError::ForeignReference {
                stack: self.name.clone(),
            });
        }
        Ok(())
    }
}
