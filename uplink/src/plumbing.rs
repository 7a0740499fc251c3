use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use colored::Colorize;

/// Code for all the uplink commands, so you can invoke them from your own
/// programs.
use crate::{
    config::{self, CONFIG_FIELDS, ConfigParams, UplinkConfig},
    gateway::LedgerGateway,
    plugin::ChannelFundingPlugin,
    rippled::XrplClient,
    submitter::Submitter,
    uplink::{Controller, expiration_label, format_drops, unix_now},
};

/// Build and persist the uplink configuration. With no `params`, the fixed
/// field list is gathered interactively.
pub async fn configure(path: &Path, params: Option<ConfigParams>) -> Result<()> {
    let mut params = match params {
        Some(params) => params,
        None => gather_params()?,
    };
    if params.testnet && params.xrp_server == config::DEFAULT_XRP_SERVER {
        params.xrp_server = config::TESTNET_XRP_SERVER.to_owned();
    }

    let gateway = XrplClient::new(&params.xrp_server)?;
    if !params.testnet {
        gateway.connect().await?;
    }

    let config = config::build_config(&gateway, params).await?;
    config.save(path).await?;
    println!("💾 Uplink configuration: {}", path.display());
    Ok(())
}

/// Report the uplink's channels and spendable balance.
pub async fn info(path: &Path) -> Result<()> {
    let config = UplinkConfig::load(path).await?;
    let (gateway, address) = open_gateway(&config)?;
    let controller = Controller::new(gateway, &address);
    let report = controller.report().await?;

    println!("{}", format!("Channels for {address}").bold());
    if report.rows.is_empty() {
        println!("  (none)");
    }
    for row in &report.rows {
        println!(
            "  {:>3}  {}  {}  {:>16}  {:>16}  {}",
            row.index,
            row.channel_id,
            row.destination,
            row.amount,
            row.balance,
            row.expiration.as_str().yellow(),
        );
    }
    println!(
        "Balance: {} drops ({} available)",
        format_drops(report.balance_drops).green(),
        format_drops(report.available_drops),
    );
    Ok(())
}

/// Close a chosen subset of the account's channels, reporting per-channel
/// outcomes after the whole batch ran.
pub async fn cleanup(path: &Path) -> Result<()> {
    let config = UplinkConfig::load(path).await?;
    let (gateway, address) = open_gateway(&config)?;
    let controller = Controller::new(gateway.clone(), &address);

    let channels = controller.channels().await?;
    if channels.is_empty() {
        println!("No channels to clean up.");
        return Ok(());
    }

    let now = unix_now();
    let mut select = cliclack::multiselect("Select channels to close").required(false);
    for (index, channel) in channels.iter().enumerate() {
        let id = channel.channel_id.get(..8).unwrap_or(&channel.channel_id);
        let label = format!("{id}… -> {}", channel.destination);
        let expiry = expiration_label(channel.expiration, now);
        let hint = if expiry.is_empty() {
            format!("{} drops", format_drops(channel.balance_drops))
        } else {
            format!("{} drops, {expiry}", format_drops(channel.balance_drops))
        };
        select = select.item(index, label, hint);
    }
    let picked = select.interact()?;
    let selected: Vec<_> = picked.into_iter().map(|i| channels[i].clone()).collect();
    if selected.is_empty() {
        println!("Nothing selected.");
        return Ok(());
    }

    let submitter = Submitter::new(gateway, &address, &config.options.secret);
    let outcomes = controller.cleanup(&submitter, &selected).await;

    let closed = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
    for (channel, result) in &outcomes {
        if let Err(err) = result {
            println!("  {} {}: {err}", "✗".red(), channel.channel_id);
        }
    }
    println!("{closed} of {} channels closed", outcomes.len());
    Ok(())
}

/// Deposit more drops into the uplink balance via the settlement plugin.
pub async fn topup(path: &Path, drops: u64) -> Result<()> {
    let config = UplinkConfig::load(path).await?;
    let (gateway, address) = open_gateway(&config)?;
    let controller = Controller::new(gateway.clone(), &address);

    let channels = controller.channels().await?;
    let channel = channels
        .first()
        .context("no outgoing channel exists yet; connect the uplink first")?;

    let plugin = ChannelFundingPlugin::new(
        gateway,
        &address,
        &config.options.secret,
        &channel.channel_id,
    );
    controller.topup(&plugin, drops).await?;
    println!("💸 Deposited {} drops", format_drops(drops));
    Ok(())
}

fn open_gateway(config: &UplinkConfig) -> Result<(Arc<XrplClient>, String)> {
    let gateway = Arc::new(XrplClient::new(&config.options.xrp_server)?);
    let address = config
        .options
        .address
        .clone()
        .context("configuration has no XRP address")?;
    Ok((gateway, address))
}

fn gather_params() -> Result<ConfigParams> {
    cliclack::intro("Configure the XRPL uplink")?;
    let testnet = cliclack::confirm("Use the XRP test ledger? (accounts are funded automatically)")
        .initial_value(false)
        .interact()?;

    let mut answers: BTreeMap<&'static str, String> = BTreeMap::new();
    for field in CONFIG_FIELDS {
        if testnet && field.skipped_on_testnet {
            continue;
        }
        let value = if field.secret {
            cliclack::password(field.prompt).mask('▪').interact()?
        } else {
            let optional = (field.validate)("").is_ok();
            let mut input = cliclack::input(field.prompt).required(!optional);
            if !field.default.is_empty() {
                input = input.default_input(field.default);
            }
            input.interact::<String>()?
        };
        if let Err(reason) = (field.validate)(&value) {
            bail!("{}: {reason}", field.prompt);
        }
        answers.insert(field.name, value);
    }
    cliclack::outro("Validating the account and writing the configuration")?;

    let take = |name: &str| answers.get(name).cloned().unwrap_or_default();
    let optional = |name: &str| answers.get(name).cloned().filter(|v| !v.is_empty());
    Ok(ConfigParams {
        parent_host: take("parent_host"),
        name: take("name"),
        secret: optional("secret"),
        address: optional("address"),
        xrp_server: take("xrp_server"),
        testnet,
    })
}
