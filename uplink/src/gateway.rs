use async_trait::async_trait;
use thiserror::Error;

/// Offset between the XRP Ledger epoch (2000-01-01T00:00:00Z) and the Unix
/// epoch, in seconds. Channel expirations on the wire are relative to the
/// ledger epoch.
pub const RIPPLE_EPOCH_OFFSET: u64 = 0x386D_4380;

#[derive(Clone, Debug, PartialEq)]
pub struct AccountInfo {
    pub balance_drops: u64,
    /// Number of objects the account owns on-ledger, each of which locks up
    /// one reserve increment.
    pub owner_count: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReserveInfo {
    pub base_drops: u64,
    pub increment_drops: u64,
}

/// A payment channel as reported by the ledger. Always fetched fresh, never
/// cached across operations.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub channel_id: String,
    pub destination: String,
    pub amount_drops: u64,
    pub balance_drops: u64,
    /// Seconds since the ledger epoch, if the channel has been asked to
    /// close.
    pub expiration: Option<u32>,
}

/// Transactions the uplink submits against its account.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerTx {
    ChannelClaim { channel_id: String, close: bool },
    ChannelFund { channel_id: String, amount_drops: u64 },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("account not found")]
    AccountNotFound,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ledger rpc error: {0}")]
    Rpc(String),
}

/// Access to one rippled server. Implementations must distinguish a missing
/// account from every other failure, so callers can wrap it into a domain
/// error instead of leaking the raw signal.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn connect(&self) -> Result<(), GatewayError>;
    async fn account_info(&self, address: &str) -> Result<AccountInfo, GatewayError>;
    async fn server_info(&self) -> Result<ReserveInfo, GatewayError>;
    async fn channels(&self, address: &str) -> Result<Vec<Channel>, GatewayError>;
    async fn subscribe(&self, address: &str) -> Result<(), GatewayError>;
    async fn submit(&self, account: &str, secret: &str, tx: LedgerTx) -> Result<(), GatewayError>;
    /// Deterministic address derivation from a seed. Protocol-specific, so it
    /// lives with the ledger capability rather than the uplink core.
    async fn derive_address(&self, secret: &str) -> Result<String, GatewayError>;
    fn endpoint(&self) -> &str;
}
