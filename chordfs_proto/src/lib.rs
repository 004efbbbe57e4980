pub mod chord {
    tonic::include_proto!("chord");
}

pub mod id;
pub mod node_ref;

pub use id::{between, hash, Id, IdError, ID_BITS, ID_BYTES};
pub use node_ref::NodeRef;
