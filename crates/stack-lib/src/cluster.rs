//! ECS clusters

use crate::context::{Handle, Stack};
use crate::error::ComposeError;
use crate::network::NetworkRef;
use tracing::info;

pub type ClusterRef = Handle<ClusterDescriptor>;

/// Logical grouping of Fargate capacity inside one network
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDescriptor {
    network: NetworkRef,
}

impl ClusterDescriptor {
    /// The network the cluster was created in
    pub fn network(&self) -> &NetworkRef {
        &self.network
    }
}

/// Add a cluster bound to the network already resolved in `stack`
pub fn build_cluster(
    stack: &mut Stack,
    id: &str,
    network: &NetworkRef,
) -> Result<ClusterRef, ComposeError> {
    stack.ensure_network(network)?;
    let cluster = stack.add(
        id,
        ClusterDescriptor {
            network: network.clone(),
        },
    )?;
    info!(stack = %stack.name(), id = %id, "Added cluster");
    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use crate::network::{create_network, NetworkProps};

    #[test]
    fn test_cluster_uses_existing_network() {
        let mut stack = Stack::new("test", Environment::default());
        let network = create_network(&mut stack, "vpc", &NetworkProps::default()).unwrap();

        let cluster = build_cluster(&mut stack, "test-cluster", &network).unwrap();

        assert_eq!(stack.count_of("AWS::ECS::Cluster"), 1);
        assert_eq!(stack.get(cluster).unwrap().network(), &network);
    }

    #[test]
    fn test_cluster_rejects_network_of_another_stack() {
        let mut first = Stack::new("first", Environment::default());
        let mut second = Stack::new("second", Environment::default());
        let first_network = create_network(&mut first, "vpc", &NetworkProps::default()).unwrap();
        create_network(&mut second, "vpc", &NetworkProps::default()).unwrap();
        let before = second.len();

        let err = build_cluster(&mut second, "cluster", &first_network).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::NetworkNotResolved { stack } if stack == "second"
        ));
        assert_eq!(second.len(), before);
    }

    #[test]
    fn test_cluster_requires_resolved_network() {
        let mut first = Stack::new("first", Environment::default());
        let network = create_network(&mut first, "vpc", &NetworkProps::default()).unwrap();
        let mut unresolved = Stack::new("unresolved", Environment::default());

        assert!(matches!(
            build_cluster(&mut unresolved, "cluster", &network),
            Err(ComposeError::NetworkNotResolved { .. })
        ));
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_cluster_id_must_be_unique() {
        let mut stack = Stack::new("test", Environment::default());
        let network = create_network(&mut stack, "vpc", &NetworkProps::default()).unwrap();
        build_cluster(&mut stack, "cluster", &network).unwrap();

        assert!(matches!(
            build_cluster(&mut stack, "cluster", &network),
            Err(ComposeError::DuplicateId(_))
        ));
    }
}
