use chordfs_proto::ID_BITS;

pub const DEFAULT_SUCCESSORS: usize = 3;
pub const MAX_SUCCESSORS: usize = 32;
pub const DEFAULT_REPLICAS: usize = 3;
pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_TRANSFER_PORT: u16 = 5000;
pub const LOCALHOST: &str = "127.0.0.1";

// Intervals
pub const STABILIZE_INTERVAL_MS: u64 = 1000;
pub const FIX_FINGERS_INTERVAL_MS: u64 = 500;
pub const CHECK_PREDECESSOR_INTERVAL_MS: u64 = 1000;
pub const MIN_INTERVAL_MS: u64 = 1;
pub const MAX_INTERVAL_MS: u64 = 60_000;

// Outbound RPCs
pub const RPC_TIMEOUT_MS: u64 = 2000;
pub const MAX_FILE_BYTES: usize = 64 * 1024 * 1024;

/// A lookup forwarded more often than this is abandoned.
pub const MAX_LOOKUP_HOPS: u32 = 2 * ID_BITS;
