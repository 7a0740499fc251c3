use tracing::debug;

use crate::{
    error::UplinkError,
    gateway::{GatewayError, LedgerGateway},
    plugin::OUTGOING_CHANNEL_DEFAULT_AMOUNT,
};

/// Drops left aside for transaction fees.
const FEE_MARGIN_DROPS: u64 = 1;

/// Check that `address` can fund one more payment channel.
///
/// Advisory only, but it must run before any channel-creating configuration
/// is persisted. The testnet path skips it entirely since faucet accounts
/// self-fund after creation.
pub async fn validate(gateway: &dyn LedgerGateway, address: &str) -> Result<(), UplinkError> {
    let info = match gateway.account_info(address).await {
        Err(GatewayError::AccountNotFound) => {
            return Err(UplinkError::AccountNotFound {
                address: address.to_owned(),
                server: gateway.endpoint().to_owned(),
            });
        }
        other => other,
    }?;
    let reserve = gateway.server_info().await?;

    // Base reserve, one increment per object already owned, one increment
    // for the channel about to be created, the channel's initial funding and
    // a fee margin.
    let min_drops = reserve.base_drops
        + reserve.increment_drops * u64::from(info.owner_count)
        + reserve.increment_drops
        + OUTGOING_CHANNEL_DEFAULT_AMOUNT
        + FEE_MARGIN_DROPS;

    if info.balance_drops < min_drops {
        return Err(UplinkError::InsufficientBalance {
            min_drops,
        });
    }
    debug!(
        balance = info.balance_drops,
        min_drops, "account can fund a new channel"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AccountInfo, ReserveInfo, tests::MockGateway};

    fn gateway(balance_drops: u64) -> MockGateway {
        MockGateway {
            account: Some(AccountInfo {
                balance_drops,
                owner_count: 3,
            }),
            reserve: ReserveInfo {
                base_drops: 20,
                increment_drops: 5,
            },
            ..Default::default()
        }
    }

    // base 20 + 5 * 3 owned + 5 new channel + 1_000_000 funding + 1 fee
    const MIN: u64 = 1_000_041;

    #[tokio::test]
    async fn rejects_balance_below_minimum() {
        let gateway = gateway(MIN - 1);
        let err = validate(&gateway, "rAlice").await.unwrap_err();
        match err {
            UplinkError::InsufficientBalance { min_drops } => assert_eq!(min_drops, MIN),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn accepts_balance_at_minimum() {
        let gateway = gateway(MIN);
        validate(&gateway, "rAlice").await.unwrap();
    }

    #[tokio::test]
    async fn missing_account_names_address_and_server() {
        let gateway = MockGateway {
            account: None,
            ..Default::default()
        };
        let err = validate(&gateway, "rNobody").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rNobody"));
        assert!(message.contains("mock://ledger"));
    }
}
