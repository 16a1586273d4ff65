use anyhow::Context;
use clap::{Parser, Subcommand};
use flowsync::config::{self, CredentialStore};

#[derive(Parser)]
#[command(
    name = "flowsync",
    about = "Session token relay and Google sign-in automation for Labs Flow",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch Chrome and run the harvest / sync / sign-in supervisor
    Run {
        /// Run Chrome headless regardless of the configured setting
        #[arg(long)]
        headless: bool,
    },
    /// Store the sign-in password (prompted, not echoed)
    SetPassword,
    /// Remove the stored password
    ClearPassword,
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run { headless: false }) {
        Command::Run { headless } => {
            let mut config = config::load_config().context("failed to load configuration")?;
            if headless {
                config.browser.headless = true;
            }
            if config.backend.api_key.is_empty() {
                tracing::warn!("backend.api_key is empty; sync requests will be unauthorized");
            }
            flowsync::run(config).await?;
        }
        Command::SetPassword => {
            let password =
                rpassword::prompt_password("Sign-in password: ").context("failed to read password")?;
            CredentialStore::open_default().store(&password)?;
            println!("Password stored.");
        }
        Command::ClearPassword => {
            CredentialStore::open_default().clear()?;
            println!("Password cleared.");
        }
        Command::ShowConfig => {
            let config = config::load_config()?;
            println!("# {}", config::get_config_path().display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
