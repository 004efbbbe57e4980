pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod local_store;
pub mod maintenance;
pub mod node;
pub mod server;
pub mod service;
pub mod shell;
pub mod storage;
pub mod transfer;

pub use config::Config;
pub use error::{ChordError, Result};
pub use node::{Node, NodeState};
pub use storage::{placement_targets, Placement};
