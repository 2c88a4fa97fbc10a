use crate::{
    cli::globals::GlobalArgs,
    directory::{firebase::FirebaseClient, memory::MemoryDirectory, DirectoryConnector},
    taskwave,
    workflow::WorkflowConfig,
};
use anyhow::{Context, Result};
use std::{fmt, str::FromStr, sync::Arc};
use tracing::{info, warn};

/// Which account directory the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Firebase,
    /// In-process; everything is lost on restart.
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firebase" => Ok(Self::Firebase),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firebase => write!(f, "firebase"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend: Backend,
    /// Set when `backend` is [`Backend::Firebase`].
    pub globals: Option<GlobalArgs>,
    pub config: WorkflowConfig,
    pub frontend_origin: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the backend client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let connector = connector(args.backend, args.globals.as_ref())?;

    taskwave::new(args.port, connector, args.config, args.frontend_origin).await
}

fn connector(
    backend: Backend,
    globals: Option<&GlobalArgs>,
) -> Result<Arc<dyn DirectoryConnector>> {
    match backend {
        Backend::Firebase => {
            let globals = globals.context("missing backend settings")?;
            let client = FirebaseClient::new(globals.firebase_config())
                .context("Failed to build backend client")?;
            Ok(Arc::new(client))
        }
        Backend::Memory => {
            warn!("Using the in-memory backend, accounts are lost on restart");
            Ok(Arc::new(MemoryDirectory::new()))
        }
    }
}

fn log_startup_args(args: &Args) {
    let mut entries = vec![
        ("listen", format!("tcp:{}", args.port)),
        ("backend", args.backend.to_string()),
        (
            "min_password_length",
            args.config.min_password_length.to_string(),
        ),
        ("dashboard_url", args.config.dashboard_url.clone()),
        (
            "frontend_origin",
            args.frontend_origin
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        ),
    ];
    if let Some(globals) = &args.globals {
        entries.push(("project_id", globals.project_id.clone()));
        entries.push(("auth_url", globals.auth_url.clone()));
        entries.push(("firestore_url", globals.firestore_url.clone()));
        entries.push(("timeout", format!("{}s", globals.timeout.as_secs())));
    }

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
