use anyhow::{Context, Result, anyhow, bail};
use clap::{Arg, ArgMatches, Command};
use safe_delegator::{
    Address, ChainId, ChainRegistry, Delegate, DelegateError, MessageSigner, SafeAddress,
    SafeServiceClient, ServiceConfig,
};
use tracing::{info, warn};

use crate::signer::{LocalKeySigner, PRIVATE_KEY_ENV};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("Unsupported output format '{other}'"),
        }
    }
}

fn available_chains(registry: &ChainRegistry) -> Vec<String> {
    registry
        .chains()
        .map(|entry| format!("{} ({})", entry.name, entry.chain_id))
        .collect()
}

fn parse_chain(registry: &ChainRegistry, chain: &str) -> Result<ChainId> {
    registry.find(chain).ok_or_else(|| {
        anyhow!(
            "Unknown chain '{chain}'. Available: {}",
            available_chains(registry).join(", ")
        )
    })
}

fn load_config(matches: &ArgMatches) -> Result<ServiceConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default_config(),
    };
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.timeout_secs = *timeout;
    }
    Ok(config)
}

fn address_arg(matches: &ArgMatches, name: &str) -> Result<Address> {
    matches
        .get_one::<String>(name)
        .map(Address::new)
        .ok_or_else(|| anyhow!("--{name} is required"))
}

/// Finds `safe` among the Safes `owner` controls
async fn find_owned_safe(
    client: &SafeServiceClient,
    chain_id: ChainId,
    owner: &Address,
    safe: &Address,
) -> Result<SafeAddress> {
    client
        .list_owner_safes(chain_id, owner)
        .await?
        .into_iter()
        .find(|candidate| candidate == safe)
        .ok_or_else(|| anyhow!("{safe} is not a Safe owned by {owner} on chain {chain_id}"))
}

fn print_safes(safes: &[SafeAddress], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(safes)?),
        OutputFormat::Text if safes.is_empty() => println!("No Safes found"),
        OutputFormat::Text => {
            for safe in safes {
                println!("{safe}");
            }
        }
    }
    Ok(())
}

fn print_delegates(delegates: &[Delegate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(delegates)?),
        OutputFormat::Text if delegates.is_empty() => println!("No delegates"),
        OutputFormat::Text => {
            for delegate in delegates {
                println!("{} ({})", delegate.address, delegate.label);
            }
        }
    }
    Ok(())
}

/// Reports a cancelled authorization as a no-op; passes other errors on
fn handle_mutation<T>(result: Result<T, DelegateError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_cancellation() => {
            warn!("Cancelled: {err}");
            if matches!(err, DelegateError::NoSigner) {
                eprintln!("Set {PRIVATE_KEY_ENV} to sign delegate changes");
            }
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// The delegator is the signer's address unless given explicitly
fn resolve_delegator(matches: &ArgMatches, signer: Option<&LocalKeySigner>) -> Result<Address> {
    match (matches.get_one::<String>("delegator"), signer) {
        (Some(explicit), _) => Ok(Address::new(explicit)),
        (None, Some(signer)) => Ok(signer.address().clone()),
        (None, None) => bail!("--delegator is required when {PRIVATE_KEY_ENV} is not set"),
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let client_config = config.into_client_config()?;
    let chain_id = parse_chain(
        &client_config.registry,
        matches
            .get_one::<String>("chain")
            .context("Chain has default value")?,
    )?;
    let format = OutputFormat::parse(
        matches
            .get_one::<String>("output")
            .context("Output format has default value")?,
    )?;
    let client = SafeServiceClient::new(client_config)?;

    match matches.subcommand() {
        Some(("safes", sub)) => {
            let owner = address_arg(sub, "owner")?;
            let safes = client.list_owner_safes(chain_id, &owner).await?;
            info!("Found {} Safes for {owner}", safes.len());
            print_safes(&safes, format)
        }
        Some(("delegates", sub)) => {
            let delegator = address_arg(sub, "delegator")?;
            let safe = address_arg(sub, "safe")?;
            let safe = find_owned_safe(&client, chain_id, &delegator, &safe).await?;
            let delegates = client.list_delegates(chain_id, &safe, &delegator).await?;
            print_delegates(&delegates, format)
        }
        Some(("add", sub)) => {
            let signer = LocalKeySigner::from_env()?;
            let delegator = resolve_delegator(sub, signer.as_ref())?;
            let safe = address_arg(sub, "safe")?;
            let delegate = address_arg(sub, "delegate")?;
            let label = sub
                .get_one::<String>("label")
                .context("--label is required")?;

            let safe = find_owned_safe(&client, chain_id, &delegator, &safe).await?;
            let result = client
                .add_delegate_and_reload(
                    chain_id,
                    &safe,
                    &delegator,
                    &delegate,
                    label,
                    signer.as_ref().map(|s| s as &dyn MessageSigner),
                )
                .await;
            if let Some(delegates) = handle_mutation(result)? {
                info!("Added delegate {delegate} to {safe}");
                print_delegates(&delegates, format)?;
            }
            Ok(())
        }
        Some(("remove", sub)) => {
            let signer = LocalKeySigner::from_env()?;
            let delegator = resolve_delegator(sub, signer.as_ref())?;
            let delegate = address_arg(sub, "delegate")?;
            let signer = signer.as_ref().map(|s| s as &dyn MessageSigner);

            match sub.get_one::<String>("safe") {
                Some(safe) => {
                    let safe =
                        find_owned_safe(&client, chain_id, &delegator, &Address::new(safe))
                            .await?;
                    let result = client
                        .remove_delegate_and_reload(chain_id, &safe, &delegator, &delegate, signer)
                        .await;
                    if let Some(delegates) = handle_mutation(result)? {
                        info!("Removed delegate {delegate}");
                        print_delegates(&delegates, format)?;
                    }
                }
                None => {
                    let result = client
                        .remove_delegate(chain_id, &delegator, &delegate, signer)
                        .await;
                    if handle_mutation(result)?.is_some() {
                        info!("Removed delegate {delegate}");
                    }
                }
            }
            Ok(())
        }
        Some(("message", sub)) => {
            let delegate = address_arg(sub, "delegate")?;
            let authorizer = client.authorizer();
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "delegate": delegate,
                        "window": authorizer.current_window(),
                        "message": authorizer.message_for(&delegate),
                    })
                ),
                OutputFormat::Text => println!("{}", authorizer.message_for(&delegate)),
            }
            Ok(())
        }
        _ => bail!("No subcommand given"),
    }
}

fn delegator_arg() -> Arg {
    Arg::new("delegator")
        .long("delegator")
        .value_name("ADDRESS")
        .help(format!(
            "Delegator address (defaults to the address of {PRIVATE_KEY_ENV})"
        ))
}

/// app cli
pub struct Cli;
impl Cli {
    pub fn command() -> Command {
        let chain_help = format!(
            "Chain name or ID ({})",
            available_chains(&ChainRegistry::default()).join(", ")
        );

        Command::new("safe-delegator")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Lists your Safes and manages their delegates")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                Arg::new("chain")
                    .short('c')
                    .long("chain")
                    .value_name("CHAIN")
                    .help(chain_help)
                    .default_value("mainnet")
                    .global(true),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_name("FILE")
                    .help("TOML file with chain service URLs")
                    .global(true),
            )
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .value_name("SECONDS")
                    .help("Per-request timeout")
                    .value_parser(clap::value_parser!(u64))
                    .global(true),
            )
            .arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FORMAT")
                    .help("Output format")
                    .value_parser(["text", "json"])
                    .default_value("text")
                    .global(true),
            )
            .subcommand(
                Command::new("safes").about("List the Safes an owner controls").arg(
                    Arg::new("owner")
                        .long("owner")
                        .value_name("ADDRESS")
                        .required(true),
                ),
            )
            .subcommand(
                Command::new("delegates")
                    .about("List the delegates of a Safe")
                    .arg(
                        Arg::new("safe")
                            .long("safe")
                            .value_name("ADDRESS")
                            .required(true),
                    )
                    .arg(delegator_arg().required(true)),
            )
            .subcommand(
                Command::new("add")
                    .about("Add or relabel a delegate")
                    .arg(
                        Arg::new("safe")
                            .long("safe")
                            .value_name("ADDRESS")
                            .required(true),
                    )
                    .arg(
                        Arg::new("delegate")
                            .long("delegate")
                            .value_name("ADDRESS")
                            .required(true),
                    )
                    .arg(
                        Arg::new("label")
                            .long("label")
                            .value_name("TEXT")
                            .required(true),
                    )
                    .arg(delegator_arg()),
            )
            .subcommand(
                Command::new("remove")
                    .about("Remove a delegate")
                    .arg(
                        Arg::new("delegate")
                            .long("delegate")
                            .value_name("ADDRESS")
                            .required(true),
                    )
                    .arg(
                        Arg::new("safe")
                            .long("safe")
                            .value_name("ADDRESS")
                            .help("Safe whose delegate list is printed afterwards"),
                    )
                    .arg(delegator_arg()),
            )
            .subcommand(
                Command::new("message")
                    .about("Print the message that authorizes a delegate this hour")
                    .arg(
                        Arg::new("delegate")
                            .long("delegate")
                            .value_name("ADDRESS")
                            .required(true),
                    ),
            )
    }

    /// start the delegator cli
    pub async fn execute() -> Result<()> {
        let matches = Self::command().get_matches();
        run(&matches).await
    }
}
