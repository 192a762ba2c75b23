use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use studio_auth::dashboard::{MemberRole, VideoUpload};
use studio_auth::{AuthError, AuthSession, ClientConfig, GuardDecision, LogNavigator, LoginCredentials, token};
use tracing_subscriber::EnvFilter;

const DEFAULT_SESSION_PATH: &str = ".studio/session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("not logged in; run `studio login` first")]
    NotLoggedIn,
}

#[derive(Parser, Debug)]
#[command(name = "studio", about = "Studio dashboard API client")]
struct Cli {
    /// API base URL; falls back to STUDIO_API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Session record file; falls back to STUDIO_SESSION_PATH, then `.studio/session.json`.
    #[arg(long)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STUDIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the current session and token expiry.
    Whoami,
    /// Exchange the refresh token for a new access token now.
    Refresh,
    /// Keep the session fresh in the foreground until interrupted.
    Watch,
    Analytics,
    Videos(VideosCommand),
    Bookings(BookingsCommand),
    Users {
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Evaluate the route guard for a path against the stored session.
    Guard { path: String },
}

#[derive(Args, Debug)]
struct VideosCommand {
    #[command(subcommand)]
    command: VideosSubcommand,
}

#[derive(Subcommand, Debug)]
enum VideosSubcommand {
    List,
    Show {
        id: u64,
    },
    Delete {
        id: u64,
    },
    Upload {
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Args, Debug)]
struct BookingsCommand {
    #[command(subcommand)]
    command: BookingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BookingsSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Cancel {
        id: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Student,
    Professor,
}

impl From<RoleArg> for MemberRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Student => Self::Student,
            RoleArg::Professor => Self::Professor,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env_with_base(cli.base_url)?;
    config.session_path = cli
        .session
        .or(config.session_path)
        .or_else(|| Some(PathBuf::from(DEFAULT_SESSION_PATH)));
    let session = AuthSession::from_config(config, Arc::new(LogNavigator))?;

    match cli.command {
        Command::Login { email, password } => run_login(&session, email, password).await,
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Guard { path } => {
            session.initialize().await;
            print_guard(&path, &session.guard(&path))
        }
        command => {
            if !session.initialize().await {
                return Err(CliError::NotLoggedIn);
            }
            run_authenticated(&session, command).await
        }
    }
}

async fn run_login(session: &AuthSession, email: String, password: String) -> Result<(), CliError> {
    let user = session.login(&LoginCredentials::new(email, password)).await?;
    print_json(&user)
}

async fn run_authenticated(session: &AuthSession, command: Command) -> Result<(), CliError> {
    let dashboard = session.dashboard();
    match command {
        Command::Whoami => print_whoami(session),
        Command::Refresh => {
            session.coordinator().refresh_current().await?;
            print_whoami(session)
        }
        Command::Watch => run_watch(session).await,
        Command::Analytics => print_json(&dashboard.analytics().await?),
        Command::Videos(videos) => match videos.command {
            VideosSubcommand::List => print_json(&dashboard.videos().await?),
            VideosSubcommand::Show { id } => print_json(&dashboard.video(id).await?),
            VideosSubcommand::Delete { id } => {
                dashboard.delete_video(id).await?;
                println!("deleted video {id}");
                Ok(())
            }
            VideosSubcommand::Upload { file, title, description } => {
                let bytes = tokio::fs::read(&file).await?;
                let file_name = file
                    .file_name()
                    .map_or_else(|| "video".to_owned(), |n| n.to_string_lossy().into_owned());
                let upload = VideoUpload { file_name, bytes, title, description };
                print_json(&dashboard.upload_video(&upload).await?)
            }
        },
        Command::Bookings(bookings) => match bookings.command {
            BookingsSubcommand::List { page } => print_json(&dashboard.bookings(page).await?),
            BookingsSubcommand::Cancel { id } => {
                dashboard.cancel_booking(id).await?;
                println!("cancelled booking {id}");
                Ok(())
            }
        },
        Command::Users { role, page } => print_json(&dashboard.members(role.into(), page).await?),
        Command::Login { .. } | Command::Logout | Command::Guard { .. } => Ok(()),
    }
}

async fn run_watch(session: &AuthSession) -> Result<(), CliError> {
    session.start_scheduler();
    let mut changes = session.store().subscribe();
    tracing::info!("watching session; ctrl-c to stop");
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                session.stop_scheduler();
                return Ok(());
            }
            res = changes.changed() => {
                if res.is_err() || !session.store().is_authenticated() {
                    session.stop_scheduler();
                    return Err(CliError::NotLoggedIn);
                }
                print_whoami(session)?;
            }
        }
    }
}

fn print_whoami(session: &AuthSession) -> Result<(), CliError> {
    let snapshot = session.store().snapshot();
    let expires_at = snapshot.access_token().and_then(token::expiration);
    let expired = snapshot.access_token().is_none_or(token::is_expired);
    print_json(&json!({
        "authenticated": snapshot.is_authenticated(),
        "user": snapshot.user,
        "access_expires_at": expires_at,
        "access_expired": expired,
    }))
}

fn print_guard(path: &str, decision: &GuardDecision) -> Result<(), CliError> {
    let value = match decision {
        GuardDecision::Allowed => json!({ "path": path, "decision": "allowed" }),
        GuardDecision::Redirected { to } => json!({ "path": path, "decision": "redirect", "to": to }),
    };
    print_json(&value)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
