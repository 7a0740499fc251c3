use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::info;
use url::Url;

use crate::{credentials, faucet, gateway::LedgerGateway, validator};

pub const DEFAULT_XRP_SERVER: &str = "https://s1.ripple.com:51234";
pub const TESTNET_XRP_SERVER: &str = "https://s.altnet.rippletest.net:51234";

/// The durable artifact this tool produces and later consumes. The schema is
/// fixed; a round-trip through the persisted form must be exact.
///
/// Scalar fields come before the nested tables so the TOML serializer never
/// has to emit a value after a table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UplinkConfig {
    pub relation: String,
    pub plugin: String,
    pub asset_code: String,
    pub asset_scale: u8,
    pub send_routes: bool,
    pub receive_routes: bool,
    pub balance: BalanceBounds,
    pub options: PluginOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BalanceBounds {
    pub minimum: String,
    pub maximum: String,
    pub settle_threshold: String,
    pub settle_to: String,
}

impl Default for BalanceBounds {
    fn default() -> Self {
        Self {
            minimum: "-Infinity".to_owned(),
            maximum: "1000000".to_owned(),
            settle_threshold: "-5000000".to_owned(),
            settle_to: "0".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PluginOptions {
    /// BTP URI embedding the derived credential. Recomputing it from
    /// (parent host, channel name, secret) always reproduces this value.
    pub server: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub xrp_server: String,
}

/// One configuration field the interactive flow gathers. The core only ever
/// consumes the resulting `ConfigParams`; the prompt engine iterates this
/// fixed list.
pub struct Field {
    pub name: &'static str,
    pub prompt: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub skipped_on_testnet: bool,
    pub validate: fn(&str) -> Result<(), &'static str>,
}

fn non_empty(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("a value is required");
    }
    Ok(())
}

fn seed_or_empty(value: &str) -> Result<(), &'static str> {
    if !value.is_empty() && !value.starts_with('s') {
        return Err("XRP seeds start with 's'");
    }
    Ok(())
}

fn endpoint_url(value: &str) -> Result<(), &'static str> {
    Url::parse(value).map_err(|_| "not a valid URL")?;
    Ok(())
}

fn anything(_value: &str) -> Result<(), &'static str> {
    Ok(())
}

pub const CONFIG_FIELDS: &[Field] = &[
    Field {
        name: "parent_host",
        prompt: "BTP host of your parent connector",
        default: "",
        secret: false,
        skipped_on_testnet: false,
        validate: non_empty,
    },
    Field {
        name: "name",
        prompt: "Name to assign to this channel",
        default: "",
        secret: false,
        skipped_on_testnet: false,
        validate: anything,
    },
    Field {
        name: "secret",
        prompt: "XRP secret (seed)",
        default: "",
        secret: true,
        skipped_on_testnet: true,
        validate: seed_or_empty,
    },
    Field {
        name: "address",
        prompt: "XRP address (leave blank to derive it from the secret)",
        default: "",
        secret: false,
        skipped_on_testnet: true,
        validate: anything,
    },
    Field {
        name: "xrp_server",
        prompt: "rippled server",
        default: DEFAULT_XRP_SERVER,
        secret: false,
        skipped_on_testnet: false,
        validate: endpoint_url,
    },
];

/// Inputs to configuration building, however they were gathered.
#[derive(Clone, Debug)]
pub struct ConfigParams {
    pub parent_host: String,
    pub name: String,
    pub secret: Option<String>,
    pub address: Option<String>,
    pub xrp_server: String,
    pub testnet: bool,
}

/// Assemble a complete uplink configuration.
///
/// Outside testnet mode the account must pass validation before anything is
/// persisted; the faucet path self-funds after account creation, so it skips
/// the check.
pub async fn build_config(
    gateway: &dyn LedgerGateway,
    params: ConfigParams,
) -> Result<UplinkConfig> {
    let (address, secret) = if params.testnet {
        let funded = faucet::acquire(faucet::DEFAULT_FAUCET_URL).await?;
        // The test ledger needs a moment before the new account is queryable.
        tokio::time::sleep(faucet::SETTLE_DELAY).await;
        (Some(funded.address), funded.secret)
    } else {
        let secret = params
            .secret
            .context("an XRP secret is required outside testnet mode")?;
        let address = match params.address {
            Some(address) if !address.is_empty() => address,
            _ => gateway.derive_address(&secret).await?,
        };
        validator::validate(gateway, &address).await?;
        (Some(address), secret)
    };

    let channel_secret = credentials::derive_secret(&params.parent_host, &params.name, &secret);
    let server = credentials::btp_uri(&params.parent_host, &params.name, &channel_secret);

    Ok(UplinkConfig {
        relation: "parent".to_owned(),
        plugin: "xrp-asym-client".to_owned(),
        asset_code: "XRP".to_owned(),
        asset_scale: 6,
        send_routes: false,
        receive_routes: false,
        balance: BalanceBounds::default(),
        options: PluginOptions {
            server,
            secret,
            address,
            xrp_server: params.xrp_server,
        },
    })
}

impl UplinkConfig {
    pub async fn save(&self, path: &Path) -> Result<()> {
        let mut fh = File::create(path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        fh.write_all(toml::to_string_pretty(self)?.as_bytes())
            .await?;
        info!(path = %path.display(), "uplink configuration written");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(toml::from_str(&raw)?)
    }
}
