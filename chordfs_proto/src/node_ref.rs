use crate::chord::NodeInfo;
use crate::id::{hash, Id};
use std::fmt;

/// Immutable snapshot of a peer. The identifier is derived from the RPC
/// address and cached so ring comparisons never rehash.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeRef {
    id: Id,
    address: String,
    public_key: Vec<u8>,
    transfer_address: String,
}

impl NodeRef {
    pub fn new(
        address: impl Into<String>,
        public_key: Vec<u8>,
        transfer_address: impl Into<String>,
    ) -> Self {
        let address = address.into();
        NodeRef {
            id: hash(address.as_bytes()),
            address,
            public_key,
            transfer_address: transfer_address.into(),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// PEM certificate of the peer's transfer endpoint, empty without TLS.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn transfer_address(&self) -> &str {
        &self.transfer_address
    }

    pub fn same_node(&self, other: &NodeRef) -> bool {
        self.address == other.address
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id.short())
            .field("address", &self.address)
            .field("transfer_address", &self.transfer_address)
            .finish()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id.short(), self.address)
    }
}

impl From<NodeInfo> for NodeRef {
    fn from(info: NodeInfo) -> Self {
        NodeRef::new(info.address, info.public_key, info.transfer_address)
    }
}

impl From<&NodeRef> for NodeInfo {
    fn from(node: &NodeRef) -> Self {
        NodeInfo {
            address: node.address.clone(),
            public_key: node.public_key.clone(),
            transfer_address: node.transfer_address.clone(),
        }
    }
}

impl From<NodeRef> for NodeInfo {
    fn from(node: NodeRef) -> Self {
        NodeInfo {
            address: node.address,
            public_key: node.public_key,
            transfer_address: node.transfer_address,
        }
    }
}
