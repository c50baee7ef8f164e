mod config;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use runledger_client::{BatchOutcome, Client, ClientError, RunCreated};
use runledger_core::{CreateRun, RunId};
use serde_json::json;
use tracing::info;

use crate::config::{CliConfig, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = CliConfig::parse();
    info!("api: {}", cli.url);
    let client = Client::new(cli.client_config()).context("building client")?;

    if let Err(e) = run(&client, cli.command) {
        if let Some(client_err) = e.downcast_ref::<ClientError>() {
            eprintln!("{}", serde_json::to_string_pretty(&client_err.to_failure())?);
        }
        return Err(e);
    }
    Ok(())
}

fn run(client: &Client, command: Command) -> Result<()> {
    match command {
        Command::CreateRun {
            payload,
            attachments,
        } => {
            let run = read_payload(&payload)?;
            let created = client.create_run(&run, &attachments)?;
            print_created(&created)?;
            check_batch(created.attachments.as_ref())
        }
        Command::Attach { run_id, files } => {
            let outcome = client.upload_attachments(&RunId::new(run_id), &files)?;
            println!("{}", serde_json::to_string_pretty(&batch_json(&outcome))?);
            check_batch(Some(&outcome))
        }
        Command::Import { report } => {
            let created = client.import_openhtf_report(&report)?;
            print_created(&created)?;
            check_batch(created.attachments.as_ref())
        }
        Command::GetRun { run_id } => {
            let run = client.get_run(&RunId::new(run_id))?;
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
        Command::ListRuns { serial_number } => {
            let runs = client.list_runs(&serial_number)?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
            Ok(())
        }
        Command::DeleteRuns { run_ids } => {
            let ids: Vec<RunId> = run_ids.into_iter().map(RunId::new).collect();
            client.delete_runs(&ids)?;
            Ok(())
        }
    }
}

fn read_payload(path: &Path) -> Result<CreateRun> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading run payload {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing run payload {}", path.display()))
}

fn batch_json(outcome: &BatchOutcome) -> serde_json::Value {
    json!({
        "linked": outcome.linked.iter().map(|l| &l.name).collect::<Vec<_>>(),
        "skipped": outcome.skipped,
        "truncated": outcome.truncated,
        "failure": outcome.failure.as_ref().map(|e| e.to_string()),
    })
}

fn print_created(created: &RunCreated) -> Result<()> {
    let mut out = json!({
        "success": true,
        "id": created.id,
        "url": created.url,
        "message": created.message,
        "warnings": created.warnings,
    });
    if let Some(outcome) = &created.attachments {
        out["attachments"] = batch_json(outcome);
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// The run exists either way; a stopped batch still exits non-zero.
fn check_batch(outcome: Option<&BatchOutcome>) -> Result<()> {
    match outcome.and_then(|o| o.failure.as_ref()) {
        Some(failure) => bail!("attachment upload stopped: {failure}"),
        None => Ok(()),
    }
}
