//! Application load balancer pieces

use crate::context::Handle;
use crate::token::Token;

pub type LoadBalancerRef = Handle<LoadBalancerDescriptor>;
pub type ListenerRef = Handle<ListenerDescriptor>;
pub type TargetGroupRef = Handle<TargetGroupDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    InternetFacing,
    Internal,
}

impl Scheme {
    /// `internet-facing` for public endpoints, `internal` otherwise
    pub fn for_endpoint(public: bool) -> Self {
        if public {
            Scheme::InternetFacing
        } else {
            Scheme::Internal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::InternetFacing => "internet-facing",
            Scheme::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerDescriptor {
    pub scheme: Scheme,
    pub subnets: Vec<Token>,
    pub security_groups: Vec<Token>,
}

/// IP-addressed target group, as required by `awsvpc` tasks
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGroupDescriptor {
    pub port: u16,
    pub vpc: Token,
}

/// HTTP listener forwarding everything to one target group
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerDescriptor {
    pub load_balancer: Token,
    pub port: u16,
    pub default_target_group: Token,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_for_endpoint() {
        assert_eq!(Scheme::for_endpoint(true).as_str(), "internet-facing");
        assert_eq!(Scheme::for_endpoint(false).as_str(), "internal");
    }
}
