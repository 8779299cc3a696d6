//! # teamboard
//!
//! Command-line client: runs scripted sessions against the in-memory remote
//! and prints what the client would show.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use teamboard_client::{ProjectForm, TaskForm, Workspace};
use teamboard_core::logging::{init_json_subscriber, init_subscriber};
use teamboard_core::{Credentials, Role, TaskStatus, User, UserId};
use teamboard_remote::MemoryRemote;
use teamboard_settings::{TeamboardSettings, load_settings_from_path, settings_path};
use teamboard_stores::SessionStatus;
use tracing::{info, warn};

const PASSWORD: &str = "teamboard";
const ADMIN_EMAIL: &str = "ada@example.com";
const MEMBER_EMAIL: &str = "ben@example.com";

/// Teamboard client.
#[derive(Parser, Debug)]
#[command(name = "teamboard", about = "Teamboard client against the in-memory remote")]
struct Cli {
    /// Settings file (defaults to `~/.teamboard/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log filter, overriding the settings file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a project and a task, finish the task, delete the project,
    /// and print the resulting state as JSON.
    Demo,
    /// Print guard decisions for each path, signed out, as a member and as an admin.
    Routes {
        /// Paths to check, e.g. `/users`.
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

/// A remote seeded with one admin and one member.
fn seeded_remote(settings: &TeamboardSettings) -> Result<Arc<MemoryRemote>> {
    let endpoint = &settings.remote.endpoint;
    if !endpoint.starts_with("memory://") {
        bail!("unsupported remote endpoint '{endpoint}': only memory:// is available");
    }
    let remote = Arc::new(MemoryRemote::new());
    for (id, name, role, email) in [
        ("u1", "Ada", Role::Admin, ADMIN_EMAIL),
        ("u2", "Ben", Role::Member, MEMBER_EMAIL),
    ] {
        remote.add_account(
            email,
            PASSWORD,
            User {
                id: UserId::from(id),
                name: name.into(),
                role,
                email: Some(email.into()),
            },
        );
    }
    info!(%endpoint, project = %settings.remote.project_id, "in-memory remote seeded");
    Ok(remote)
}

async fn demo(settings: &TeamboardSettings) -> Result<()> {
    let workspace = Workspace::new(seeded_remote(settings)?, settings);
    let _ = workspace.initialize().await?;
    let session = workspace
        .sign_in(&Credentials::new(ADMIN_EMAIL, PASSWORD))
        .await
        .context("sign-in failed")?;
    let today = Utc::now().date_naive();

    let mut project = ProjectForm::new();
    project.name = "P1".into();
    let p1 = project.submit()?.send(workspace.projects()).await?;

    let mut form = TaskForm::new(p1.clone(), None, Some(&session));
    form.title = "Design mockup".into();
    let t1 = form.submit(today)?.send(workspace.tasks()).await?;

    let task = workspace
        .tasks()
        .get(&t1)
        .context("created task missing from the store")?;
    let mut edit = TaskForm::edit(&task);
    edit.status = TaskStatus::Done;
    let _ = edit.submit(today)?.send(workspace.tasks()).await?;

    let policy = settings.policy.project_deletion;
    if let Err(err) = workspace.tasks().remove_project(&p1).await {
        warn!(error = %err, ?policy, "project deletion refused");
        let _ = workspace.report(&err);
    }

    let state = workspace.state();
    println!("{}", serde_json::to_string_pretty(&state)?);
    workspace.shutdown().await;
    Ok(())
}

async fn routes(settings: &TeamboardSettings, paths: &[String]) -> Result<()> {
    for (label, email) in [
        ("signed-out", None),
        ("member", Some(MEMBER_EMAIL)),
        ("admin", Some(ADMIN_EMAIL)),
    ] {
        let workspace = Workspace::new(seeded_remote(settings)?, settings);
        if workspace.initialize().await? != SessionStatus::SignedOut {
            bail!("fresh remote reported an existing session");
        }
        if let Some(email) = email {
            let _ = workspace
                .sign_in(&Credentials::new(email, PASSWORD))
                .await
                .with_context(|| format!("sign-in as {email} failed"))?;
        }
        for path in paths {
            println!("{label:<10}  {path:<24}  {}", workspace.guard().navigate(path));
        }
        workspace.shutdown().await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    if settings.logging.json {
        init_json_subscriber(level);
    } else {
        init_subscriber(level);
    }

    match cli.command {
        Command::Demo => demo(&settings).await,
        Command::Routes { paths } => routes(&settings, &paths).await,
    }
}
