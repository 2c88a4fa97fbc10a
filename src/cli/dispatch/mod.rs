use crate::{
    cli::{
        actions::{
            server::{Args, Backend},
            Action,
        },
        globals::GlobalArgs,
    },
    workflow::WorkflowConfig,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let backend = matches
        .get_one::<String>("backend")
        .map(String::as_str)
        .context("missing required argument: --backend")?
        .parse::<Backend>()
        .map_err(|e| anyhow!(e))?;

    let globals = match backend {
        Backend::Firebase => {
            let project_id = matches
                .get_one::<String>("project-id")
                .cloned()
                .context("missing required argument: --project-id")?;
            let api_key = matches
                .get_one::<String>("api-key")
                .cloned()
                .context("missing required argument: --api-key")?;

            let mut globals = GlobalArgs::new(project_id);
            globals.set_api_key(SecretString::from(api_key));
            if let Some(url) = matches.get_one::<String>("auth-url") {
                globals.auth_url.clone_from(url);
            }
            if let Some(url) = matches.get_one::<String>("firestore-url") {
                globals.firestore_url.clone_from(url);
            }
            if let Some(timeout) = matches.get_one::<u64>("timeout") {
                globals.timeout = Duration::from_secs(*timeout);
            }
            Some(globals)
        }
        Backend::Memory => None,
    };

    let config = WorkflowConfig {
        min_password_length: matches
            .get_one::<u16>("min-password-length")
            .copied()
            .map_or(crate::workflow::DEFAULT_MIN_PASSWORD_LENGTH, usize::from),
        dashboard_url: matches
            .get_one::<String>("dashboard-url")
            .cloned()
            .unwrap_or_else(|| crate::workflow::DEFAULT_DASHBOARD_URL.to_string()),
    };

    let frontend_origin = matches.get_one::<String>("frontend-origin").cloned();

    Ok(Action::Server(Args {
        port,
        backend,
        globals,
        config,
        frontend_origin,
    }))
}
