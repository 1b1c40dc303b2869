//! One-shot listing query against the configured database
//!
//! Runs a single participants/events/logs listing through the pool, cache and query engine and
//! prints the JSON envelope (or the validation error body) to stdout. Logs go to stderr.
//!
//! Usage:
//!   certadmin-query events -p search="rust workshop" -p event_status=upcoming -p limit=5

use anyhow::Context;
use clap::Parser;
use serde_json::Value as JsonValue;

use certadmin::db::{PgConnector, QueryEngine};
use certadmin::models::{EventRow, ListingRow, LogRow, ParticipantRow, Resource};
use certadmin::{logging, Config};

#[derive(Parser, Debug)]
#[clap(name = "certadmin-query")]
#[clap(about = "Run one admin listing query and print the result envelope")]
struct Args {
    /// Resource to list: participants, events or logs
    resource: Resource,

    /// Request parameter as key=value (repeatable), e.g. -p sort_by=name -p page=2
    #[clap(short = 'p', long = "param")]
    params: Vec<String>,

    /// Database connection URL (overrides CERTADMIN__DATABASE__URL)
    #[clap(short, long)]
    database_url: Option<String>,
}

fn parse_param(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("parameter '{raw}' is not key=value"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

async fn list<R: ListingRow>(
    engine: &QueryEngine<PgConnector>,
    params: &[(String, String)],
) -> certadmin::Result<JsonValue> {
    let envelope = engine.list::<R>(params).await?;
    serde_json::to_value(envelope)
        .map_err(|e| certadmin::Error::Internal(format!("failed to encode envelope: {e}")))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    config.validate().context("Invalid configuration")?;

    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    let params = args
        .params
        .iter()
        .map(|p| parse_param(p))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let connector =
        PgConnector::from_config(&config.database).context("Invalid database URL")?;
    let engine = QueryEngine::from_config(connector, &config);

    tracing::info!(
        resource = %args.resource,
        params = params.len(),
        "Running listing query"
    );

    let result = match args.resource {
        Resource::Participants => list::<ParticipantRow>(&engine, &params).await,
        Resource::Events => list::<EventRow>(&engine, &params).await,
        Resource::Logs => list::<LogRow>(&engine, &params).await,
    };
    engine.pool().close();

    match result {
        Ok(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.to_body())?);
            Err(anyhow::anyhow!(err).context(format!("{} listing failed", args.resource)))
        }
    }
}
