use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::warn;

use crate::{
    error::UplinkError,
    gateway::{Channel, LedgerGateway, RIPPLE_EPOCH_OFFSET},
    plugin::SettlementPlugin,
    submitter::Submitter,
};

/// Orchestrates the uplink operations against one account.
pub struct Controller {
    gateway: Arc<dyn LedgerGateway>,
    address: String,
}

pub struct Report {
    pub balance_drops: u64,
    /// Balance minus the reserve currently locked by owned objects.
    pub available_drops: u64,
    pub rows: Vec<ReportRow>,
}

pub struct ReportRow {
    pub index: usize,
    pub channel_id: String,
    pub destination: String,
    pub amount: String,
    pub balance: String,
    pub expiration: String,
}

impl Controller {
    pub fn new(gateway: Arc<dyn LedgerGateway>, address: &str) -> Self {
        Self {
            gateway,
            address: address.to_owned(),
        }
    }

    pub async fn channels(&self) -> Result<Vec<Channel>, UplinkError> {
        Ok(self.gateway.channels(&self.address).await?)
    }

    /// Live snapshot of the account's channels and spendable balance.
    pub async fn report(&self) -> Result<Report, UplinkError> {
        let channels = self.gateway.channels(&self.address).await?;
        let info = self.gateway.account_info(&self.address).await?;
        let reserve = self.gateway.server_info().await?;

        let reserved =
            reserve.base_drops + reserve.increment_drops * u64::from(info.owner_count);
        let now = unix_now();
        let rows = channels
            .iter()
            .enumerate()
            .map(|(index, channel)| ReportRow {
                index,
                channel_id: channel.channel_id.clone(),
                destination: channel.destination.clone(),
                amount: format_drops(channel.amount_drops),
                balance: format_drops(channel.balance_drops),
                expiration: expiration_label(channel.expiration, now),
            })
            .collect();

        Ok(Report {
            balance_drops: info.balance_drops,
            available_drops: info.balance_drops.saturating_sub(reserved),
            rows,
        })
    }

    /// Close every selected channel, folding per-channel outcomes. One
    /// channel's failure never prevents attempts on the rest; the caller
    /// reports the accumulated failures once the batch is done.
    pub async fn cleanup(
        &self,
        submitter: &Submitter,
        selected: &[Channel],
    ) -> Vec<(Channel, Result<(), UplinkError>)> {
        let mut outcomes = Vec::with_capacity(selected.len());
        for channel in selected {
            let result = submitter.submit_claim(&channel.channel_id, true).await;
            if let Err(err) = &result {
                warn!(channel = %channel.channel_id, %err, "close failed");
            }
            outcomes.push((channel.clone(), result));
        }
        outcomes
    }

    /// Deposit `drops` into the settlement plugin's balance.
    pub async fn topup(
        &self,
        plugin: &dyn SettlementPlugin,
        drops: u64,
    ) -> Result<(), UplinkError> {
        plugin.connect().await?;
        plugin.send_money(drops).await
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Group digits with thousands separators: 1234567 becomes "1,234,567".
pub fn format_drops(drops: u64) -> String {
    let digits = drops.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Human label for a channel expiration. No expiration renders empty, a
/// past-due one renders "ready to close", a future one renders a relative
/// duration.
pub fn expiration_label(expiration: Option<u32>, now_unix: u64) -> String {
    let Some(expiration) = expiration.filter(|e| *e != 0) else {
        return String::new();
    };
    let expires_at = u64::from(expiration) + RIPPLE_EPOCH_OFFSET;
    if expires_at <= now_unix {
        return "ready to close".to_owned();
    }
    format_duration(expires_at - now_unix)
}

fn format_duration(secs: u64) -> String {
    const HOUR: u64 = 3_600;
    const DAY: u64 = 24 * HOUR;

    let days = secs / DAY;
    let hours = secs % DAY / HOUR;
    let minutes = secs % HOUR / 60;
    let seconds = secs % 60;
    let label = if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    };
    format!("in {label}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::{
        AccountInfo, LedgerTx, ReserveInfo,
        tests::{MockGateway, channel},
    };

    #[test]
    fn drops_format_with_separators() {
        assert_eq!(format_drops(0), "0");
        assert_eq!(format_drops(999), "999");
        assert_eq!(format_drops(1_000), "1,000");
        assert_eq!(format_drops(1_234_567), "1,234,567");
        assert_eq!(format_drops(1_000_000_000), "1,000,000,000");
    }

    #[test]
    fn expiration_labels() {
        let now = 1_700_000_000;
        assert_eq!(expiration_label(None, now), "");
        assert_eq!(expiration_label(Some(0), now), "");

        let past = (now - RIPPLE_EPOCH_OFFSET - 60) as u32;
        assert_eq!(expiration_label(Some(past), now), "ready to close");

        let future = (now - RIPPLE_EPOCH_OFFSET + 90) as u32;
        assert_eq!(expiration_label(Some(future), now), "in 1m 30s");

        let far = (now - RIPPLE_EPOCH_OFFSET + 2 * 86_400 + 3 * 3_600) as u32;
        assert_eq!(expiration_label(Some(far), now), "in 2d 3h");
    }

    #[tokio::test]
    async fn report_computes_available_balance() {
        let gateway = Arc::new(MockGateway {
            account: Some(AccountInfo {
                balance_drops: 50_000_000,
                owner_count: 2,
            }),
            reserve: ReserveInfo {
                base_drops: 10_000_000,
                increment_drops: 2_000_000,
            },
            channels: vec![channel("A1"), channel("B2")],
            ..Default::default()
        });
        let controller = Controller::new(gateway, "rAlice");

        let report = controller.report().await.unwrap();
        assert_eq!(report.balance_drops, 50_000_000);
        // 50 XRP minus 10 base and 2 * 2 increments.
        assert_eq!(report.available_drops, 36_000_000);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].index, 0);
        assert_eq!(report.rows[1].channel_id, "B2");
        assert_eq!(report.rows[0].amount, "1,000,000");
        assert_eq!(report.rows[0].expiration, "");
    }

    #[tokio::test]
    async fn cleanup_attempts_every_channel_despite_failures() {
        let gateway = Arc::new(MockGateway {
            failing: vec!["B2".to_owned()],
            ..Default::default()
        });
        let controller = Controller::new(gateway.clone(), "rAlice");
        let submitter = Submitter::new(gateway.clone(), "rAlice", "seed");

        let selected = vec![channel("A1"), channel("B2"), channel("C3")];
        let outcomes = controller.cleanup(&submitter, &selected).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].1.is_ok());
        assert!(outcomes[1].1.is_err());
        assert!(outcomes[2].1.is_ok());
        assert_eq!(outcomes.iter().filter(|(_, r)| r.is_err()).count(), 1);

        // The two successful closes reached the ledger as close claims.
        let submitted = gateway.submitted.lock().unwrap();
        assert_eq!(
            *submitted,
            vec![
                LedgerTx::ChannelClaim {
                    channel_id: "A1".to_owned(),
                    close: true,
                },
                LedgerTx::ChannelClaim {
                    channel_id: "C3".to_owned(),
                    close: true,
                },
            ]
        );
    }
}
