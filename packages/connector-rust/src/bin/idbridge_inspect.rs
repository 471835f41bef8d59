//! Offline inspection tool: validates a connector configuration, decodes
//! fixed-width records and shows how predicates translate.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use idbridge_connector::{ChangeRequestBuilder, ConnectorConfig, SchemaCatalog};
use idbridge_core::{compact, Attribute, EntityKind, Predicate};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idbridge-inspect")]
#[command(about = "Inspect idbridge connector configuration and codecs", long_about = None)]
struct Args {
    /// Connector configuration file (JSON). Defaults apply when omitted.
    #[arg(long, env = "IDBRIDGE_CONFIG")]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long, env = "IDBRIDGE_LOG_JSON", default_value_t = false)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse every table definition, resolve the destination and print the
    /// resulting schemas.
    CheckConfig,
    /// Decode one fixed-width record of a configured table.
    DecodeRecord {
        #[arg(long)]
        table: String,
        #[arg(long)]
        record: String,
    },
    /// Translate a JSON predicate into the native filter model.
    Translate {
        #[arg(long)]
        predicate: String,
        #[arg(long, value_enum, default_value_t = Kind::Account)]
        kind: Kind,
    },
    /// Parse a compact `name|from|to` value.
    Compact {
        #[arg(long)]
        value: String,
    },
    /// Build the change request for a JSON attribute list.
    ChangeRequest {
        #[arg(long)]
        account: String,
        #[arg(long)]
        attributes: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Account,
    Table,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Account => EntityKind::Account,
            Kind::Table => EntityKind::Table,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ConnectorConfig> {
    let Some(path) = path else {
        return Ok(ConnectorConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(ConnectorConfig::from_json(&json)?)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);
    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::CheckConfig => {
            let catalog = SchemaCatalog::from_config(&config)?;
            let registry = config.registry();
            let destination = config.active_destination(&registry)?;
            info!(
                tables = catalog.tables().len(),
                destinations = registry.len(),
                destination = destination.as_ref().map_or("-", |d| d.name.as_str()),
                "configuration is valid"
            );
            print_json(&catalog.tables())?;
        }
        Command::DecodeRecord { table, record } => {
            let catalog = SchemaCatalog::from_config(&config)?;
            let schema = catalog
                .table(&table)
                .with_context(|| format!("unknown table: {table}"))?;
            print_json(&schema.decode(&record)?)?;
        }
        Command::Translate { predicate, kind } => {
            let predicate: Predicate =
                serde_json::from_str(&predicate).context("parsing predicate")?;
            let model = config
                .translator()
                .translate(&predicate, kind.into(), &config.allow_list());
            match model {
                Some(model) => {
                    print_json(&model)?;
                    print_json(&model.selection_rows())?;
                }
                None => info!("predicate has no native form; it is evaluated in memory"),
            }
        }
        Command::Compact { value } => {
            print_json(&compact::parse(&value)?)?;
        }
        Command::ChangeRequest {
            account,
            attributes,
        } => {
            let attributes: Vec<Attribute> =
                serde_json::from_str(&attributes).context("parsing attributes")?;
            let request = ChangeRequestBuilder::new(&config).build(&account, &attributes)?;
            print_json(&request)?;
            print_json(&request.change_flags())?;
        }
    }
    Ok(())
}
