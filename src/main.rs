//! Virsaa admin CLI - a keyboard-driven client for the Virsaa admin API.
//!
//! Commands map onto the dashboard's protected views: user lists and
//! content uploads, gated by the same route guard, plus the session
//! commands (login/logout/whoami).

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use virsaa_admin::models::{NewAudiobook, NewAuthor, NewEbook, UserFilter};
use virsaa_admin::{
    Admission, ApiClient, Config, CredentialStore, HttpTransport, Route, RouteGuard,
    SessionManager, Transport,
};

const USAGE: &str = "\
Usage: virsaa-admin <command>

Commands:
  login [email]                        Log in as an admin user
  logout                               Revoke and clear the session
  whoami                               Show the current session
  users <all|basic|premium>            List platform users
  authors                              List the author catalog
  upload-ebook <json> [cover] [pdf]    Upload an ebook (JSON payload file)
  upload-audiobook <json> [cover] [audio]  Upload an audiobook
  upload-author <json>                 Upload an author";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        println!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load().unwrap_or_default();
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&config.api_base_url).context("Failed to build HTTP client")?);
    let store = CredentialStore::new(config.store_dir()?)?;
    let session = Arc::new(SessionManager::new(transport.clone(), store));
    session.restore().await;
    let guard = RouteGuard::new(session.clone());
    let client = ApiClient::new(transport, session.clone());

    match command.as_str() {
        "login" => {
            let login = match args.get(2) {
                Some(login) => login.clone(),
                None => match config.last_login.clone() {
                    Some(last) => {
                        println!("Logging in as {}", last);
                        last
                    }
                    None => bail!("Usage: virsaa-admin login <email>"),
                },
            };
            let password = rpassword::prompt_password("Password: ")?;
            let user = session.login(&login, &password).await?;
            config.last_login = Some(login);
            if let Err(e) = config.save() {
                info!(error = %e, "Failed to save config");
            }
            println!("Logged in as {} ({})", user.username, user.email);
        }
        "logout" => {
            session.logout().await;
            println!("Logged out.");
        }
        "whoami" => match session.current_user().await {
            Some(user) => {
                let role = if user.is_superuser {
                    "superuser"
                } else if user.is_staff {
                    "staff"
                } else {
                    "user"
                };
                println!("{} <{}> ({})", user.username, user.email, role);
            }
            None => println!("Not logged in."),
        },
        "users" => {
            let filter = args
                .get(2)
                .and_then(|s| UserFilter::from_arg(s))
                .context("Usage: virsaa-admin users <all|basic|premium>")?;
            require_admission(&guard, Route::Users(filter)).await?;
            let users = client.fetch_users(filter).await?;
            println!(
                "{:<6} {:<24} {:<30} {:<10}",
                "ID", "NAME", "EMAIL", "PLAN"
            );
            for user in &users {
                println!(
                    "{:<6} {:<24} {:<30} {:<10}",
                    user.id,
                    user.display_name(),
                    user.email.as_deref().unwrap_or("-"),
                    user.membership_level.as_deref().unwrap_or("-"),
                );
            }
            println!("{} user(s)", users.len());
        }
        "upload-ebook" => {
            require_admission(&guard, Route::UploadEbooks).await?;
            let payload: NewEbook = read_payload(&args, 2)?;
            let cover = args.get(3).map(Path::new);
            let pdf = args.get(4).map(Path::new);
            if cover.is_some() || pdf.is_some() {
                client.create_ebook_with_files(&payload, cover, pdf).await?;
            } else {
                client.create_ebook(&payload).await?;
            }
            println!("Ebook uploaded successfully!");
        }
        "upload-audiobook" => {
            require_admission(&guard, Route::UploadAudiobooks).await?;
            let payload: NewAudiobook = read_payload(&args, 2)?;
            let cover = args.get(3).map(Path::new);
            let audio = args.get(4).map(Path::new);
            if cover.is_some() || audio.is_some() {
                client
                    .create_audiobook_with_files(&payload, cover, audio)
                    .await?;
            } else {
                client.create_audiobook(&payload).await?;
            }
            println!("Audiobook uploaded successfully!");
        }
        "upload-author" => {
            require_admission(&guard, Route::UploadAuthors).await?;
            let payload: NewAuthor = read_payload(&args, 2)?;
            client.create_author(&payload).await?;
            println!("Author uploaded successfully!");
        }
        "authors" => {
            require_admission(&guard, Route::Authors).await?;
            let authors = client.fetch_authors().await?;
            for author in &authors {
                println!("{:<6} {}", author.id, author.name);
            }
        }
        _ => {
            println!("{}", USAGE);
        }
    }

    Ok(())
}

/// Gate a protected command the way the dashboard gates a view.
async fn require_admission(guard: &RouteGuard, route: Route) -> Result<()> {
    match guard.admit(route).await {
        Admission::Granted => Ok(()),
        Admission::RedirectToLogin => {
            bail!("Not logged in. Run: virsaa-admin login <email>")
        }
    }
}

/// Read a JSON payload file for the upload commands.
fn read_payload<T: serde::de::DeserializeOwned>(args: &[String], index: usize) -> Result<T> {
    let path = args
        .get(index)
        .context("Missing JSON payload file argument")?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid JSON payload in {}", path))
}
