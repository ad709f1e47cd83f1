use ethers::types::{H256, U256};

/// Number of block confirmations a state change (deposit, secret reveal,
/// closing event) must accumulate before the dispatcher treats it as final.
pub const DEFAULT_CONFIRMATIONS: u64 = 10;

/// Per-channel cap on the number of simultaneously pending locks (Merkle
/// tree width). Mirrors the on-chain contract's own limit.
pub const MAXIMUM_PENDING_TRANSFERS: u32 = 160;

/// Largest representable on-chain amount; every arithmetic mutation that
/// would exceed this is rejected rather than wrapped.
pub const UINT256_MAX: U256 = U256::MAX;

/// Root of a Merkle tree with zero leaves.
pub const EMPTY_ROOT: H256 = H256::zero();
