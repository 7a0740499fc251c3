use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::UplinkError,
    gateway::{LedgerGateway, LedgerTx},
};

/// Drops used to fund a freshly-opened outgoing channel. The account
/// validator reserves room for this amount before configuration proceeds.
pub const OUTGOING_CHANNEL_DEFAULT_AMOUNT: u64 = 1_000_000;

/// The peer-facing settlement capability. The uplink only needs to connect
/// it and push value in; how the peer accounts for the deposit is its
/// business.
#[async_trait]
pub trait SettlementPlugin: Send + Sync {
    async fn connect(&self) -> Result<(), UplinkError>;
    async fn send_money(&self, drops: u64) -> Result<(), UplinkError>;
}

/// Settlement plugin that deposits by funding the outgoing payment channel
/// on-ledger.
pub struct ChannelFundingPlugin {
    gateway: Arc<dyn LedgerGateway>,
    address: String,
    secret: String,
    channel_id: String,
}

impl ChannelFundingPlugin {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        address: &str,
        secret: &str,
        channel_id: &str,
    ) -> Self {
        Self {
            gateway,
            address: address.to_owned(),
            secret: secret.to_owned(),
            channel_id: channel_id.to_owned(),
        }
    }
}

#[async_trait]
impl SettlementPlugin for ChannelFundingPlugin {
    async fn connect(&self) -> Result<(), UplinkError> {
        Ok(self.gateway.connect().await?)
    }

    async fn send_money(&self, drops: u64) -> Result<(), UplinkError> {
        self.gateway
            .submit(
                &self.address,
                &self.secret,
                LedgerTx::ChannelFund {
                    channel_id: self.channel_id.clone(),
                    amount_drops: drops,
                },
            )
            .await
            .map_err(|err| UplinkError::Submission {
                channel_id: self.channel_id.clone(),
                cause: err.to_string(),
            })?;
        info!(channel = %self.channel_id, drops, "outgoing channel funded");
        Ok(())
    }
}
