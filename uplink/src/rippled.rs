use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use crate::gateway::{AccountInfo, Channel, GatewayError, LedgerGateway, LedgerTx, ReserveInfo};

/// `tfClose` flag of PaymentChannelClaim.
const TF_CLOSE: u32 = 0x0002_0000;

/// LedgerGateway implementation speaking rippled's HTTP JSON-RPC. One POST
/// per command; rippled signs and autofills submitted transactions, so the
/// serialized submitter is what keeps sequence numbers race-free.
pub struct XrplClient {
    endpoint: String,
    client: Client,
}

impl XrplClient {
    pub fn new(endpoint: &str) -> Result<Self, GatewayError> {
        Url::parse(endpoint)
            .map_err(|err| GatewayError::Rpc(format!("invalid ledger endpoint {endpoint}: {err}")))?;
        Ok(Self {
            endpoint: endpoint.to_owned(),
            client: Client::builder().user_agent("xrpl-uplink").build()?,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        trace!(method, "ledger rpc call");
        let body: Value = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "method": method, "params": [params] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        interpret_response(body)
    }
}

/// Unwrap a rippled response envelope, turning its `actNotFound` error code
/// into the distinguishable missing-account signal.
fn interpret_response(body: Value) -> Result<Value, GatewayError> {
    let result = body.get("result").cloned().unwrap_or(Value::Null);
    match result.get("status").and_then(Value::as_str) {
        Some("success") => Ok(result),
        _ => {
            let code = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            if code == "actNotFound" {
                return Err(GatewayError::AccountNotFound);
            }
            let message = result
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or(code);
            Err(GatewayError::Rpc(message.to_owned()))
        }
    }
}

fn parse_drops(raw: &str) -> Result<u64, GatewayError> {
    raw.parse()
        .map_err(|_| GatewayError::Rpc(format!("ledger returned a non-numeric drop amount: {raw}")))
}

fn xrp_to_drops(xrp: f64) -> u64 {
    (xrp * 1_000_000.0).round() as u64
}

#[async_trait]
impl LedgerGateway for XrplClient {
    async fn connect(&self) -> Result<(), GatewayError> {
        self.server_info().await?;
        debug!(endpoint = %self.endpoint, "ledger reachable");
        Ok(())
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, GatewayError> {
        #[derive(Deserialize)]
        struct AccountData {
            #[serde(rename = "Balance")]
            balance: String,
            #[serde(rename = "OwnerCount")]
            owner_count: u32,
        }

        let result = self
            .call(
                "account_info",
                json!({ "account": address, "ledger_index": "validated" }),
            )
            .await?;
        let data: AccountData =
            serde_json::from_value(result.get("account_data").cloned().unwrap_or(Value::Null))
                .map_err(|err| GatewayError::Rpc(format!("malformed account_info: {err}")))?;
        Ok(AccountInfo {
            balance_drops: parse_drops(&data.balance)?,
            owner_count: data.owner_count,
        })
    }

    async fn server_info(&self) -> Result<ReserveInfo, GatewayError> {
        #[derive(Deserialize)]
        struct ValidatedLedger {
            reserve_base_xrp: f64,
            reserve_inc_xrp: f64,
        }

        let result = self.call("server_info", json!({})).await?;
        let ledger: ValidatedLedger = serde_json::from_value(
            result
                .pointer("/info/validated_ledger")
                .cloned()
                .unwrap_or(Value::Null),
        )
        .map_err(|err| GatewayError::Rpc(format!("malformed server_info: {err}")))?;
        Ok(ReserveInfo {
            base_drops: xrp_to_drops(ledger.reserve_base_xrp),
            increment_drops: xrp_to_drops(ledger.reserve_inc_xrp),
        })
    }

    async fn channels(&self, address: &str) -> Result<Vec<Channel>, GatewayError> {
        #[derive(Deserialize)]
        struct RawChannel {
            channel_id: String,
            destination_account: String,
            amount: String,
            balance: String,
            #[serde(default)]
            expiration: Option<u32>,
        }
        #[derive(Deserialize)]
        struct RawChannels {
            #[serde(default)]
            channels: Vec<RawChannel>,
        }

        let result = self
            .call("account_channels", json!({ "account": address }))
            .await?;
        let raw: RawChannels = serde_json::from_value(result)
            .map_err(|err| GatewayError::Rpc(format!("malformed account_channels: {err}")))?;
        raw.channels
            .into_iter()
            .map(|c| {
                Ok(Channel {
                    amount_drops: parse_drops(&c.amount)?,
                    balance_drops: parse_drops(&c.balance)?,
                    channel_id: c.channel_id,
                    destination: c.destination_account,
                    expiration: c.expiration,
                })
            })
            .collect()
    }

    async fn subscribe(&self, address: &str) -> Result<(), GatewayError> {
        self.call("subscribe", json!({ "accounts": [address] }))
            .await?;
        debug!(account = address, "subscribed to account stream");
        Ok(())
    }

    async fn submit(&self, account: &str, secret: &str, tx: LedgerTx) -> Result<(), GatewayError> {
        let tx_json = match tx {
            LedgerTx::ChannelClaim { channel_id, close } => {
                let mut tx_json = json!({
                    "TransactionType": "PaymentChannelClaim",
                    "Account": account,
                    "Channel": channel_id,
                });
                if close {
                    tx_json["Flags"] = json!(TF_CLOSE);
                }
                tx_json
            }
            LedgerTx::ChannelFund {
                channel_id,
                amount_drops,
            } => json!({
                "TransactionType": "PaymentChannelFund",
                "Account": account,
                "Channel": channel_id,
                "Amount": amount_drops.to_string(),
            }),
        };

        let result = self
            .call("submit", json!({ "secret": secret, "tx_json": tx_json }))
            .await?;
        let engine = result
            .get("engine_result")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if !engine.starts_with("tes") {
            let message = result
                .get("engine_result_message")
                .and_then(Value::as_str)
                .unwrap_or("");
            return Err(GatewayError::Rpc(format!("{engine} {message}").trim().to_owned()));
        }
        Ok(())
    }

    async fn derive_address(&self, secret: &str) -> Result<String, GatewayError> {
        let result = self.call("wallet_propose", json!({ "seed": secret })).await?;
        result
            .get("account_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Rpc("wallet_propose returned no account_id".to_owned()))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_unwraps_the_result() {
        let body = json!({ "result": { "status": "success", "info": { "build_version": "2.0.0" } } });
        let result = interpret_response(body).unwrap();
        assert_eq!(result.pointer("/info/build_version").unwrap(), "2.0.0");
    }

    #[test]
    fn act_not_found_maps_to_the_missing_account_signal() {
        let body = json!({ "result": {
            "status": "error",
            "error": "actNotFound",
            "error_message": "Account not found.",
        }});
        assert!(matches!(
            interpret_response(body),
            Err(GatewayError::AccountNotFound)
        ));
    }

    #[test]
    fn other_errors_carry_the_server_message() {
        let body = json!({ "result": {
            "status": "error",
            "error": "invalidParams",
            "error_message": "Missing field 'account'.",
        }});
        match interpret_response(body) {
            Err(GatewayError::Rpc(message)) => assert_eq!(message, "Missing field 'account'."),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reserve_conversion_rounds_to_drops() {
        assert_eq!(xrp_to_drops(10.0), 10_000_000);
        assert_eq!(xrp_to_drops(0.2), 200_000);
    }

    #[test]
    fn drop_amounts_must_be_numeric() {
        assert_eq!(parse_drops("1000000").unwrap(), 1_000_000);
        assert!(parse_drops("1.5").is_err());
    }
}
