//! IAM roles, inline policies and instance profiles

use crate::context::Handle;
use crate::token::Token;

pub type RoleRef = Handle<RoleDescriptor>;

/// Role assumable by an AWS service principal
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDescriptor {
    /// e.g. `ecs-tasks.amazonaws.com`
    pub assumed_by: String,
}

impl RoleDescriptor {
    pub fn for_service(principal: impl Into<String>) -> Self {
        Self {
            assumed_by: principal.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Token>,
}

impl PolicyStatement {
    pub fn allow<I, S>(actions: I, resources: Vec<Token>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources,
        }
    }
}

/// Inline policy attached to one or more roles
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDescriptor {
    pub roles: Vec<RoleRef>,
    pub statements: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceProfileDescriptor {
    pub roles: Vec<RoleRef>,
}
