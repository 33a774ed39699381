mod cli;
mod play;
mod view;

use std::fmt;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lesson_core::model::{LessonId, Role, TopicId};
use services::api::demo_credentials;
use services::{
    ApiConfig, ApiError, AppServices, AttemptError, AuthError, CatalogError, Clock, Credentials,
    FailureAction, GuardOutcome,
};
use storage::repository::StorageError;

use crate::cli::{Cli, Command};

#[derive(Debug)]
enum CommandError {
    Api(ApiError),
    Auth(AuthError),
    Catalog(CatalogError),
    Attempt(AttemptError),
    Storage(StorageError),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Api(err) => write!(f, "{err}"),
            CommandError::Auth(err) => write!(f, "{err}"),
            CommandError::Catalog(err) => write!(f, "{err}"),
            CommandError::Attempt(err) => write!(f, "{err}"),
            CommandError::Storage(err) => write!(f, "{err}"),
            CommandError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl CommandError {
    fn api(&self) -> Option<&ApiError> {
        match self {
            CommandError::Api(err)
            | CommandError::Auth(AuthError::Api(err))
            | CommandError::Catalog(CatalogError::Api(err))
            | CommandError::Attempt(
                AttemptError::Api(err) | AttemptError::Catalog(CatalogError::Api(err)),
            ) => Some(err),
            _ => None,
        }
    }
}

macro_rules! command_error_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for CommandError {
            fn from(err: $ty) -> Self {
                CommandError::$variant(err)
            }
        })*
    };
}

command_error_from!(
    Api(ApiError),
    Auth(AuthError),
    Catalog(CatalogError),
    Attempt(AttemptError),
    Storage(StorageError),
);

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// sqlx will not create a missing database file by itself.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }
    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| CommandError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(CommandError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn build_services(cli: &Cli, clock: Clock) -> Result<AppServices, Box<dyn std::error::Error>> {
    if cli.offline {
        let services = AppServices::new_offline(cli.role, clock).await?;
        // The demo backend lives only as long as this process; sign in up front.
        if !matches!(cli.command, Command::Login { .. }) {
            services
                .auth()
                .login(services.api().as_ref(), &demo_credentials(cli.role))
                .await?;
        }
        return Ok(services);
    }

    let mut config = ApiConfig::from_env();
    if let Some(url) = &cli.api_url {
        config = ApiConfig::new(url.clone()).with_timeout(config.timeout);
    }
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;
    Ok(AppServices::new_http(config, &db_url, cli.role, clock).await?)
}

async fn execute(services: &AppServices, command: Command) -> Result<(), CommandError> {
    let role = services.role();
    match command {
        Command::Login { email, password } => {
            let profile = services
                .auth()
                .login(services.api().as_ref(), &Credentials::new(email, password))
                .await?;
            println!("Signed in as {} ({role})", view::profile_line(&profile));
            Ok(())
        }
        Command::Logout => {
            services.auth().logout(role).await?;
            println!("Signed out ({role})");
            Ok(())
        }
        other => {
            if let GuardOutcome::RedirectToLogin { path } = services.guard().check(role) {
                println!(
                    "Not signed in as {role} ({path}). Run `lingua --role {role} login --email <email>`."
                );
                return Ok(());
            }
            execute_signed_in(services, other).await
        }
    }
}

async fn execute_signed_in(services: &AppServices, command: Command) -> Result<(), CommandError> {
    let api = services.api();
    match command {
        Command::Whoami => {
            let profile = api.current_user().await?;
            println!("{}", view::profile_line(&profile));
        }
        Command::Topics { module, page, size } => {
            let viewer = api.current_user().await?;
            let listing = services
                .catalog()
                .topics(module.into(), page, size, &viewer)
                .await?;
            println!("{}", view::topic_page(&listing));
        }
        Command::Lessons { topic } => {
            let viewer = api.current_user().await?;
            let overview = services
                .catalog()
                .topic_overview(TopicId::new(topic), &viewer)
                .await?;
            println!("{} ({})", overview.topic.name, overview.topic.module);
            for row in &overview.lessons {
                println!("{}", view::lesson_row(row));
            }
        }
        Command::Play { lesson, topic } => {
            let viewer = api.current_user().await?;
            let opened = services
                .open_attempt(TopicId::new(topic), LessonId::new(lesson), &viewer)
                .await;
            let (attempt, events) = match opened {
                Err(AttemptError::Catalog(CatalogError::Locked(decision))) => {
                    println!("{}", decision.message());
                    return Ok(());
                }
                other => other?,
            };
            play::run(attempt, events).await?;
        }
        Command::Login { .. } | Command::Logout => {}
    }
    Ok(())
}

fn report(role: Role, action: &FailureAction) {
    match action {
        FailureAction::RedirectToLogin { path, .. } => {
            eprintln!("Your {role} session has expired ({path}). Please sign in again.");
        }
        FailureAction::RedirectHome { message, path } => {
            eprintln!("{message} (back to {path})");
        }
        FailureAction::ShowFieldErrors(fields) => {
            for (field, message) in fields.iter() {
                eprintln!("{field}: {message}");
            }
        }
        FailureAction::ShowRetryable(message) | FailureAction::ShowMessage(message) => {
            eprintln!("{message}");
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Clock::default();
    let services = build_services(&cli, clock).await?;
    let role = services.role();

    match execute(&services, cli.command).await {
        Ok(()) => Ok(()),
        Err(err) => match err.api() {
            Some(api_err) => {
                debug!(error = %api_err, "command failed");
                let action = services.auth().resolve_failure(role, api_err).await;
                report(role, &action);
                std::process::exit(1);
            }
            None => Err(err.into()),
        },
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/lingua.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/lingua.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/x.db"),
            "sqlite:///tmp/x.db"
        );
    }

    #[test]
    fn api_errors_are_found_through_wrappers() {
        let err = CommandError::Auth(AuthError::Api(ApiError::Unauthorized { role: Role::User }));
        assert!(matches!(err.api(), Some(ApiError::Unauthorized { .. })));
        let err = CommandError::InvalidDbUrl { raw: "x".into() };
        assert!(err.api().is_none());
    }
}
