//! Access-control groups

use crate::context::Handle;
use crate::token::Token;

pub type SecurityGroupRef = Handle<SecurityGroupDescriptor>;

/// Source of ingress traffic
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    /// Any IPv4 address
    AnyIpv4,
    /// Members of another security group
    Group(Token),
}

/// Inbound TCP rule
#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    pub peer: Peer,
    pub port: u16,
    pub description: String,
}

impl IngressRule {
    pub fn tcp(peer: Peer, port: u16) -> Self {
        let description = match &peer {
            Peer::AnyIpv4 => format!("from 0.0.0.0/0:{}", port),
            Peer::Group(_) => format!("from group:{}", port),
        };
        Self {
            peer,
            port,
            description,
        }
    }
}

/// Ingress rule set scoped to one network. Egress is always open.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroupDescriptor {
    pub description: String,
    pub vpc: Token,
    pub ingress: Vec<IngressRule>,
}
