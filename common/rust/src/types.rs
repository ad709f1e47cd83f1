use serde::{Deserialize, Serialize};

/// Suggested bounds for channel parameters a caller may pick at channel-open
/// time. These are operator-facing defaults, never the protocol constants in
/// `netchannel_core::constants` — those stay compile-time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDefaults {
    pub min_reveal_timeout: u64,
    pub max_reveal_timeout: u64,
    pub min_settle_timeout: u64,
    pub max_settle_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub ws_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, errors: Vec::new(), warnings: Vec::new() }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self { is_valid: false, errors: vec![reason.into()], warnings: Vec::new() }
    }
}
