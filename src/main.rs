use std::sync::Arc;

use clap::Parser;
use session_gate::net::types::Credentials;
use session_gate::router::{RouteRecord, RouteTable};
use session_gate::{
    AuthGuard, AuthStore, ConfigError, GoTrueClient, GuardPaths, IdentityConfig, IdentityError, Router, RouterError,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("identity service error: {0}")]
    Identity(#[from] IdentityError),
    #[error("navigation error: {0}")]
    Router(#[from] RouterError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("usage: {0}")]
    Usage(&'static str),
}

#[derive(Parser, Debug)]
#[command(name = "session-gate", about = "Interactive auth-gated navigation against a GoTrue service")]
struct Cli {
    /// First location to navigate to.
    #[arg(long, env = "SESSION_GATE_START", default_value = "/")]
    start: String,
}

fn demo_routes() -> Result<RouteTable, RouterError> {
    RouteTable::new(vec![
        RouteRecord::new("/login").name("Login").view("LoginView").requires_auth(false),
        RouteRecord::new("/").name("Dashboard").view("DashboardView").requires_auth(true),
        RouteRecord::new("/admin").name("Admin").view("AdminView").requires_auth(true),
    ])
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = IdentityConfig::from_env()?;
    let client = Arc::new(GoTrueClient::new(&config)?);
    let store = Arc::new(AuthStore::new(client));
    let router = Router::new(demo_routes()?, AuthGuard::new(Arc::clone(&store), GuardPaths::default()));

    tracing::info!(url = %config.url, start = %cli.start, "session-gate ready");
    go(&router, &cli.start).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match run_command(&router, &store, &words).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

/// Returns `Ok(true)` when the loop should stop.
async fn run_command(router: &Router, store: &AuthStore, words: &[&str]) -> Result<bool, CliError> {
    match words {
        [] => {}
        ["quit" | "exit"] => return Ok(true),
        ["go", path] => go(router, path).await,
        ["login", email, password] => {
            let response = store.sign_in(&Credentials::new(*email, *password)).await?;
            println!("signed in as {}", response.user.map_or_else(|| "?".to_owned(), |u| u.id));
            reload(router).await;
        }
        ["signup", email, password] => {
            let response = store.sign_up(&Credentials::new(*email, *password)).await?;
            match response.user {
                Some(user) if response.session.is_some() => println!("registered and signed in as {}", user.id),
                Some(user) => println!("registered {}; confirm the e-mail before signing in", user.id),
                None => println!("registered"),
            }
            reload(router).await;
        }
        ["logout"] => {
            store.sign_out().await?;
            println!("signed out");
            reload(router).await;
        }
        ["passwd", new_password] => {
            store.update_password(new_password).await?;
            println!("password updated");
        }
        ["whoami"] => match store.user() {
            Some(user) => println!("{} <{}>", user.id, user.email.as_deref().unwrap_or("-")),
            None => println!("anonymous"),
        },
        ["refresh"] => {
            store.refresh().await;
            println!("authenticated: {}", store.is_authenticated());
        }
        ["go", ..] => return Err(CliError::Usage("go <path>")),
        ["login" | "signup", ..] => return Err(CliError::Usage("login|signup <email> <password>")),
        ["passwd", ..] => return Err(CliError::Usage("passwd <new-password>")),
        _ => return Err(CliError::Usage("go | login | signup | logout | passwd | whoami | refresh | quit")),
    }
    Ok(false)
}

async fn go(router: &Router, path: &str) {
    match router.push(path).await {
        Ok(nav) => match nav.redirected_from {
            Some(from) => println!("{from} -> {} ({})", nav.route.full_path, nav.route.view().unwrap_or("-")),
            None => println!("{} ({})", nav.route.full_path, nav.route.view().unwrap_or("-")),
        },
        Err(e) => eprintln!("error: {e}"),
    }
}

/// Re-run the guard on the current location after identity changes.
async fn reload(router: &Router) {
    if let Some(current) = router.current() {
        go(router, &current.full_path).await;
    }
}
