use std::sync::Arc;

use clap::Parser;
use course_core::model::{ContentRef, SessionId};
use services::{
    ApiClient, ApiConfig, ApiError, Clock, ProgressError, ProgressTracker, SessionEvent,
    SessionManager,
};
use storage::repository::Storage;
use tokio::sync::broadcast::Receiver;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod args;

use args::{Cli, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug)]
struct NotLoggedIn;

impl std::fmt::Display for NotLoggedIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("not logged in; run `coursectl login` first")
    }
}

impl std::error::Error for NotLoggedIn {}

fn api_config(cli: &Cli) -> AppResult<ApiConfig> {
    match &cli.base_url {
        Some(url) => Ok(ApiConfig::new(url)?),
        None => Ok(ApiConfig::from_env()?),
    }
}

/// User-facing text for API failures; everything else prints as-is.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.user_message();
    }
    if let Some(ProgressError::Submit(api) | ProgressError::Api(api)) =
        err.downcast_ref::<ProgressError>()
    {
        return api.user_message();
    }
    err.to_string()
}

async fn run(cli: Cli) -> AppResult<()> {
    prepare_sqlite_file(&cli.db_url)?;
    let storage = Storage::sqlite(&cli.db_url).await?;
    let session = Arc::new(SessionManager::new(storage, Clock::default_clock()));
    let mut events = session.subscribe();
    let tab = session.register_tab().await;
    tracing::debug!(session_id = ?tab.as_ref().map(SessionId::as_str), "tab registered");

    let outcome = dispatch(&cli, &session).await;
    report_events(&mut events);
    outcome
}

async fn dispatch(cli: &Cli, session: &Arc<SessionManager>) -> AppResult<()> {
    match &cli.command {
        Command::Login { email, password } => {
            let client = ApiClient::new(api_config(cli)?, Arc::clone(session))?;
            let login = client.login(email, password).await?;
            let role = session
                .role()
                .await
                .map_or_else(|| "unknown role".to_owned(), |role| role.to_string());
            match login.user_id.or(session.user_id().await) {
                Some(id) => println!("Logged in as user {id} ({role})"),
                None => println!("Logged in ({role})"),
            }
            Ok(())
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out");
            Ok(())
        }
        Command::Status => {
            print_status(session).await;
            Ok(())
        }
        Command::Progress { course } => {
            let tracker = tracker_for(cli, session).await?;
            let progress = tracker.refresh_course(*course).await?;
            println!(
                "Course {course}: {progress} ({} items completed)",
                progress.completed_content_ids.len()
            );
            Ok(())
        }
        Command::Complete {
            course,
            section,
            content,
            kind,
        } => {
            let tracker = tracker_for(cli, session).await?;
            tracker.refresh_course(*course).await?;
            tracker.select_content(ContentRef::new(*course, *section, *content, (*kind).into()));
            if tracker.mark_current_complete().await? {
                println!("Content {content} marked as completed");
            } else {
                println!("Content {content} was already completed");
            }
            let progress = tracker.refresh_course(*course).await?;
            println!("Course {course}: {progress}");
            Ok(())
        }
    }
}

async fn tracker_for(cli: &Cli, session: &Arc<SessionManager>) -> AppResult<ProgressTracker> {
    if !session.is_authenticated().await {
        return Err(NotLoggedIn.into());
    }
    let client = ApiClient::new(api_config(cli)?, Arc::clone(session))?;
    Ok(ProgressTracker::for_session(Arc::new(client), session).await?)
}

async fn print_status(session: &SessionManager) {
    let session_id = session
        .session_id()
        .await
        .map_or_else(|| "none".to_owned(), |id| id.to_string());
    println!("session: {session_id}");

    let Some(token) = session.token().await else {
        println!("auth:    logged out");
        return;
    };
    let user = session
        .user_id()
        .await
        .map_or_else(|| "unknown".to_owned(), |id| id.to_string());
    let role = session
        .role()
        .await
        .map_or_else(|| "unknown".to_owned(), |role| role.to_string());
    let expires = token
        .claims()
        .ok()
        .and_then(|claims| claims.expires_at())
        .map_or_else(|| "unknown".to_owned(), |at| at.to_rfc3339());
    let state = if session.is_token_expired(token.as_str()) {
        "expired"
    } else {
        "valid"
    };
    println!("user:    {user}");
    println!("role:    {role}");
    println!("token:   {state} (expires {expires})");
}

fn report_events(events: &mut Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::LoginRequired { route } = event {
            eprintln!("Session expired; log in again ({route}).");
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> AppResult<()> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .ok_or_else(|| format!("invalid --db value: {db_url}"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(format!("invalid --db value: {db_url}").into());
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

/// Used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

fn default_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_LOG_FILTER)
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{}", describe(err.as_ref()));
        std::process::exit(2);
    }
}
