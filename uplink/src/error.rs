use thiserror::Error;

use crate::gateway::GatewayError;

/// Failures surfaced by uplink operations. Every variant names the account
/// or channel it concerns so batch reports stay attributable.
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("account {address} does not exist on {server}; fund it before configuring an uplink")]
    AccountNotFound { address: String, server: String },
    #[error("insufficient balance to open a channel; at least {min_drops} drops are required")]
    InsufficientBalance { min_drops: u64 },
    #[error("submission for channel {channel_id} failed: {cause}")]
    Submission { channel_id: String, cause: String },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
