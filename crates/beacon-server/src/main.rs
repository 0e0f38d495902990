mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon_adapters::parser::{AlertmanagerParser, ManualParser};
use beacon_adapters::persistence::sqlite::SqliteDb;
use beacon_app::incident_service::IncidentService;
use beacon_app::ingest_service::IngestService;
use beacon_core::alert::Status;
use beacon_core::ids::IncidentId;
use beacon_core::service::{ServiceKey, ServiceUpdate, TagSource};
use beacon_ports::outbound::{AlertSourceParser, IncidentQuery};
use beacon_ports::types::{IncidentFilter, ManualAlert};

use crate::config::Config;

const DEFAULT_CONFIG: &str = "beacon.toml";

#[derive(Parser)]
#[command(name = "beacon", version, about = "Alert incident lifecycle engine")]
struct Cli {
    /// Path to config file
    #[arg(long, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overrides `database.url`
    #[arg(long, env = "BEACON_DATABASE_URL")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Alertmanager,
    Manual,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one webhook delivery from a file, or stdin.
    Ingest {
        #[arg(long, value_enum, default_value_t = Format::Alertmanager)]
        format: Format,
        /// Payload file; `-` or nothing reads stdin.
        file: Option<PathBuf>,
    },
    /// Raise a manual alert.
    Alert {
        #[arg(long, default_value = "")]
        namespace: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        instance: Option<String>,
        #[arg(long, default_value = "warning")]
        severity: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        external_id: Option<String>,
    },
    /// Acknowledge a firing incident.
    Ack {
        id: String,
        #[arg(long)]
        by: String,
    },
    /// Resolve an incident by id.
    Resolve {
        id: String,
        #[arg(long)]
        by: String,
        /// End time (RFC 3339), defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// List incidents, newest first.
    Incidents {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        fingerprint: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        per_page: u32,
    },
    /// Show an incident and its event log.
    Show { id: String },
    /// Show a service record.
    Service { namespace: String, service: String },
    /// Merge metadata into a service record.
    ServiceUpdate {
        namespace: String,
        service: String,
        #[arg(long, default_value = "operator")]
        source: String,
        /// Tag asserted by this source; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Treat the given tags as this source's complete set, retracting
        /// the ones it no longer reports.
        #[arg(long)]
        replace_tags: bool,
        #[arg(long)]
        environment: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        component_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "beacon=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path, true)?,
        None => Config::load(Path::new(DEFAULT_CONFIG), false)?,
    };
    if let Some(url) = cli.database {
        config.database.url = url;
        config.validate()?;
    }

    let db = SqliteDb::new(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("opening {}", config.database.url))?;
    tracing::debug!(database = config.database.url.as_str(), "store opened");
    let now = Utc::now();

    match cli.command {
        Command::Ingest { format, file } => {
            let payload = read_payload(file).await?;
            let parser: &dyn AlertSourceParser = match format {
                Format::Alertmanager => &AlertmanagerParser,
                Format::Manual => &ManualParser,
            };
            let ingest = IngestService::from_config(db, &config.engine);
            print(&ingest.ingest_payload(parser, &payload, now).await?)
        }
        Command::Alert {
            namespace,
            service,
            instance,
            severity,
            message,
            source,
            external_id,
        } => {
            let alert = ManualAlert {
                namespace,
                service,
                instance,
                severity,
                message,
                source,
                external_id,
            };
            let ingest = IngestService::from_config(db, &config.engine);
            print(&ingest.submit_manual(alert, now).await?)
        }
        Command::Ack { id, by } => {
            let id = IncidentId::parse(&id)?;
            print(&IncidentService::new(db).acknowledge(&id, &by, now).await?)
        }
        Command::Resolve { id, by, at } => {
            let id = IncidentId::parse(&id)?;
            print(&IncidentService::new(db).resolve_by_id(&id, &by, at, now).await?)
        }
        Command::Incidents {
            status,
            namespace,
            service,
            fingerprint,
            page,
            per_page,
        } => {
            let filter = IncidentFilter {
                status: status.as_deref().map(str::parse::<Status>).transpose()?,
                namespace,
                service,
                fingerprint,
                page,
                per_page,
            };
            print(&db.list_incidents(&filter).await?)
        }
        Command::Show { id } => {
            let id = IncidentId::parse(&id)?;
            let incident = db
                .get_incident(&id)
                .await?
                .with_context(|| format!("incident {id} not found"))?;
            let events = db.events_for(&id).await?;
            print(&serde_json::json!({ "incident": incident, "events": events }))
        }
        Command::Service { namespace, service } => {
            let key = ServiceKey::new(namespace, service)?;
            let record = db
                .get_service(&key)
                .await?
                .with_context(|| format!("service {key} not found"))?;
            print(&record)
        }
        Command::ServiceUpdate {
            namespace,
            service,
            source,
            tags,
            replace_tags,
            environment,
            team,
            component_type,
        } => {
            let key = ServiceKey::new(namespace, service)?;
            let update = ServiceUpdate {
                source: source.parse::<TagSource>()?,
                tags: (replace_tags || !tags.is_empty()).then(|| tags.into_iter().collect()),
                environment,
                team,
                component_type,
            };
            let ingest = IngestService::from_config(db, &config.engine);
            print(&ingest.merge_service(&key, &update, now).await?)
        }
    }
}

async fn read_payload(file: Option<PathBuf>) -> anyhow::Result<Vec<u8>> {
    match file {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        _ => {
            let mut payload = Vec::new();
            tokio::io::stdin().read_to_end(&mut payload).await?;
            Ok(payload)
        }
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
