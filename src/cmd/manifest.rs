//! Manifest commands — `list`, `current`, `upload`, `activate`.

use anyhow::{Context, Result};
use chrono::DateTime;
use std::path::Path;

use deploy_manifest::config::DeployConfig;
use deploy_manifest::lifecycle::{DeploySession, Lifecycle};
use deploy_manifest::manifest::RevisionListEntry;
use deploy_manifest::revision::{RevisionSource, resolve_revision_hash};

use super::super::Cli;

fn load_config(cli: &Cli, project_dir: &Path) -> Result<DeployConfig> {
    DeployConfig::with_cli_args(
        project_dir.to_path_buf(),
        cli.project.clone(),
        cli.dist_dir.clone(),
        cli.connection_string.clone(),
    )
    .context("Failed to load configuration")
}

pub async fn cmd_list(cli: &Cli, project_dir: &Path, limit: usize, json: bool) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let lifecycle = Lifecycle::configure(&config).await?;
    let mut session = DeploySession::from_config(&config);
    lifecycle.fetch_revisions(&mut session).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&session.revisions).context("Failed to serialize revisions")?
        );
        return Ok(());
    }

    if session.revisions.is_empty() {
        println!();
        println!("No revisions found for {}.", session.project);
        println!();
        return Ok(());
    }

    println!();
    println!("  {:<40} Uploaded", "Revision");
    println!("  {:<40} --------", "--------");
    for entry in session.revisions.iter().take(limit) {
        println!("{}", format_entry(entry));
    }
    if session.revisions.len() > limit {
        println!(
            "{}",
            console::style(format!(
                "  ... {} older revision(s) not shown",
                session.revisions.len() - limit
            ))
            .dim()
        );
    }
    println!();
    Ok(())
}

fn format_entry(entry: &RevisionListEntry) -> String {
    let uploaded = DateTime::from_timestamp_millis(entry.timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());
    if entry.active {
        format!(
            "{} {:<40} {} {}",
            console::style(">").green().bold(),
            entry.revision,
            uploaded,
            console::style("(active)").green()
        )
    } else {
        format!("  {:<40} {}", entry.revision, uploaded)
    }
}

pub async fn cmd_current(cli: &Cli, project_dir: &Path) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let lifecycle = Lifecycle::configure(&config).await?;
    match lifecycle.store().get_current(&config.project_name()).await? {
        Some(key) => println!("{}", key),
        None => println!("No active revision for {}", config.project_name()),
    }
    Ok(())
}

pub async fn cmd_upload(
    cli: &Cli,
    project_dir: &Path,
    revision: Option<String>,
    revision_key: Option<String>,
    revision_source: RevisionSource,
    activate: bool,
) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let lifecycle = Lifecycle::configure(&config).await?;

    let revision_key = match (&revision, revision_key) {
        (_, Some(hash)) => Some(hash),
        (Some(_), None) => None,
        (None, None) => {
            let artifact_path = config.dist_dir().join(config.artifact());
            Some(resolve_revision_hash(revision_source, &config.project_dir, &artifact_path).await?)
        }
    };
    let mut session = DeploySession::from_config(&config)
        .with_revision(revision)
        .with_revision_key(revision_key);

    println!("Uploading {} to the manifest...", config.artifact());
    lifecycle.upload(&mut session).await?;
    println!("{}", console::style(lifecycle.did_deploy(&session)?).green());

    if activate {
        run_activation(&lifecycle, &mut session).await?;
    }
    Ok(())
}

pub async fn cmd_activate(
    cli: &Cli,
    project_dir: &Path,
    revision: Option<String>,
    revision_key: Option<String>,
) -> Result<()> {
    if revision.is_none() && revision_key.is_none() {
        anyhow::bail!("Specify the revision to activate with --revision or --revision-key");
    }
    let config = load_config(cli, project_dir)?;
    let lifecycle = Lifecycle::configure(&config).await?;
    let mut session = DeploySession::from_config(&config)
        .with_revision(revision)
        .with_revision_key(revision_key);

    run_activation(&lifecycle, &mut session).await
}

async fn run_activation(
    lifecycle: &Lifecycle<deploy_manifest::table::LibsqlTable>,
    session: &mut DeploySession,
) -> Result<()> {
    lifecycle.will_activate(session).await?;
    lifecycle.activate(session).await?;
    println!("{}", console::style(lifecycle.did_activate(session)?).green());
    match &session.revision_data.previous_revision_key {
        Some(prev) => println!("Previous revision: {}", prev),
        None => println!("Previous revision: none"),
    }
    Ok(())
}
