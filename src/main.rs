use anyhow::{Context, Result};
use azure_keyvault_auth::{
    workflow, AuthStyle, PollPolicy, Propagation, Settings, SettingsFile, WorkflowOptions,
};
use clap::{Parser, ValueEnum};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error};

/// Azure Key Vault authentication sample: provisions a vault and round-trips
/// a secret through it.
#[derive(Parser, Debug)]
#[command(name = "keyvault-auth-sample", version, about, long_about = None)]
struct Cli {
    /// JSON settings file to read AZURE_* values from instead of the environment
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Vault name to create (random when omitted)
    #[arg(long)]
    vault_name: Option<String>,

    /// How the vault client acquires tokens
    #[arg(long, value_enum, default_value_t = Auth::Callback)]
    auth: Auth,

    /// Sleep this many seconds after vault creation instead of polling for readiness
    #[arg(long, value_name = "SECS")]
    fixed_delay: Option<u64>,

    /// Give up polling for vault readiness after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    poll_timeout: u64,

    /// List the vault's enabled, unmanaged secrets after the round trip
    #[arg(long)]
    list: bool,

    /// Exit without waiting for a keypress
    #[arg(long)]
    no_pause: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Auth {
    Callback,
    Ambient,
}

impl From<Auth> for AuthStyle {
    fn from(auth: Auth) -> Self {
        match auth {
            Auth::Callback => AuthStyle::Callback,
            Auth::Ambient => AuthStyle::Ambient,
        }
    }
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        match &self.settings {
            Some(path) => Ok(Settings::from_source(&SettingsFile::load(path)?)),
            None => Ok(Settings::from_env()),
        }
    }

    fn options(&self) -> WorkflowOptions {
        let propagation = match self.fixed_delay {
            Some(secs) => Propagation::FixedDelay(Duration::from_secs(secs)),
            None => Propagation::Poll(PollPolicy {
                timeout: Duration::from_secs(self.poll_timeout),
                ..PollPolicy::default()
            }),
        };
        WorkflowOptions {
            vault_name: self.vault_name.clone(),
            auth: self.auth.into(),
            propagation,
            list_secrets: self.list,
            ..WorkflowOptions::default()
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;
    workflow::run(&settings, &cli.options(), &mut |progress| println!("{}", progress))
        .await
        .context("Key Vault sample failed")?;
    Ok(())
}

fn pause(mut input: impl BufRead) {
    println!("Press any key to continue.");
    let mut line = String::new();
    if let Err(e) = input.read_line(&mut line) {
        debug!("Could not read from stdin: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "azure_keyvault_auth=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    println!("Azure Key Vault Authentication Sample");

    let result = run(&cli).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    if !cli.no_pause {
        pause(io::stdin().lock());
    }
    result
}
