/**
 * Bamboo Auth CLI
 *
 * Small command-line front end over the auth adapters, handy for checking a
 * backend configuration and watching session changes from a terminal.
 */

#[cfg(feature = "cli")]
use bamboo_journal::auth::AuthRegistry;
#[cfg(feature = "cli")]
use bamboo_journal::shared::{AuthConfig, Credentials};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "bamboo-auth", about = "Session tools for the Bamboo Journal auth backends")]
struct Cli {
    /// TOML configuration file (defaults to the environment)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Command {
    /// Print session changes until Ctrl-C
    Watch,
    /// Sign in with email and password
    Login { email: String, password: String },
    /// Print the current user
    Whoami,
    /// Sign out of the current session
    Logout,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AuthConfig::from_file(path)?,
        None => AuthConfig::from_env()?,
    };
    let registry = AuthRegistry::new(config);
    let auth = registry.adapter()?;
    tracing::info!("[STARTUP] Using {} backend", auth.kind());

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            let subscription = auth.on_auth_state_change(|kind, session| {
                let who = session
                    .as_ref()
                    .map(|s| s.user.email.clone().unwrap_or_else(|| s.user.id.clone()))
                    .unwrap_or_else(|| "<signed out>".to_string());
                println!("{:?}: {}", kind, who);
            });
            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe();
        }
        Command::Login { email, password } => {
            let session = auth
                .sign_in_with_password(&Credentials::new(email, password))
                .await?;
            println!("Signed in as {}", session.identity());
        }
        Command::Whoami => match auth.get_user().await? {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("Not signed in"),
        },
        Command::Logout => {
            auth.sign_out().await?;
            println!("Signed out");
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("bamboo-auth requires the 'cli' feature to be enabled.");
    eprintln!("Run with: cargo run --bin bamboo-auth --features cli");
    std::process::exit(1);
}
