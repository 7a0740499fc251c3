use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_FAUCET_URL: &str = "https://faucet.altnet.rippletest.net/accounts";

/// Time the test ledger needs before a freshly-funded account shows up in
/// account queries. Callers must wait this long before validation or
/// reserve checks.
pub const SETTLE_DELAY: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Funded {
    pub address: String,
    pub secret: String,
}

#[derive(Deserialize)]
struct FaucetResponse {
    account: FaucetAccount,
}

#[derive(Deserialize)]
struct FaucetAccount {
    #[serde(alias = "classicAddress")]
    address: String,
    secret: String,
}

/// Ask the test-ledger faucet for a funded account.
pub async fn acquire(faucet_url: &str) -> Result<Funded> {
    let response: FaucetResponse = Client::builder()
        .user_agent("xrpl-uplink")
        .build()?
        .post(faucet_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    info!(address = %response.account.address, "faucet account created");
    Ok(Funded {
        address: response.account.address,
        secret: response.account.secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_faucet_payload() {
        let raw = r#"{
            "account": {
                "xAddress": "XVHjW9kDJUBCmEx4WwwMyj5SQRQaKfzbV2EvJxeZkdQH9Wq",
                "classicAddress": "rJb5KsHsDHF1YS5B5DU6QCkH5NsPaKQTcy",
                "secret": "snoPBrXtMeMyMHUVTgbuqAfg1SUTb"
            },
            "amount": 1000,
            "balance": 1000
        }"#;
        let parsed: FaucetResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.account.address, "rJb5KsHsDHF1YS5B5DU6QCkH5NsPaKQTcy");
        assert_eq!(parsed.account.secret, "snoPBrXtMeMyMHUVTgbuqAfg1SUTb");
    }

    #[test]
    fn accepts_the_plain_address_field() {
        let raw = r#"{ "account": {
            "address": "rJb5KsHsDHF1YS5B5DU6QCkH5NsPaKQTcy",
            "secret": "snoPBrXtMeMyMHUVTgbuqAfg1SUTb"
        }}"#;
        let parsed: FaucetResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.account.address, "rJb5KsHsDHF1YS5B5DU6QCkH5NsPaKQTcy");
    }
}
