use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lexcrm_client::config::ClientOptions;
use lexcrm_client::crm::PageParams;
use lexcrm_client::error::{Error, Result};
use lexcrm_client::prelude::LoginCredentials;
use lexcrm_client::LexCrm;
use lexcrm_storage::FileStore;

#[derive(Parser)]
#[clap(name = "lexcrm", version, about = "Command-line client for the LexCRM API")]
struct Cli {
    /// File the session is kept in between runs
    #[clap(long, env = "LEXCRM_SESSION_FILE", default_value = ".lexcrm-session.json")]
    session_file: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in; falls back to the demo account if the backend is down
    Login {
        #[clap(long)]
        email: String,
        #[clap(long, env = "LEXCRM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List cases
    Cases(ListArgs),
    /// List clients
    Clients(ListArgs),
    /// List tasks
    Tasks(ListArgs),
    /// List invoices
    Invoices(ListArgs),
    /// Check whether the backend answers
    Health,
}

#[derive(Args)]
struct ListArgs {
    #[clap(long, default_value_t = 1)]
    page: u32,
    #[clap(long, default_value_t = 10)]
    limit: u32,
    #[clap(long)]
    search: Option<String>,
}

impl ListArgs {
    fn params(&self) -> PageParams {
        let params = PageParams::new(self.page, self.limit);
        match self.search {
            Some(ref search) => params.with_search(search),
            None => params,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let options = ClientOptions::from_env()?;
    let store = FileStore::open(&cli.session_file)?;
    let crm = LexCrm::with_store(options, Arc::new(store))?;

    if let Command::Login { email, password } = &cli.command {
        let session = crm
            .auth()
            .login(&LoginCredentials::new(email, password))
            .await?;
        return print(&session.map(|s| s.user().clone()));
    }

    crm.auth().restore().await?;

    match cli.command {
        Command::Login { .. } => Ok(()),
        Command::Logout => crm.auth().logout().await,
        Command::Whoami => {
            if !crm.auth().is_authenticated() {
                return Err(Error::MissingSession);
            }
            print(&crm.auth().get_profile().await?)
        }
        Command::Cases(args) => print(&crm.cases().list(&args.params()).await?),
        Command::Clients(args) => print(&crm.clients().list(&args.params()).await?),
        Command::Tasks(args) => print(&crm.tasks().list(&args.params()).await?),
        Command::Invoices(args) => print(&crm.invoices().list(&args.params()).await?),
        Command::Health => {
            let reachable = crm.check_connectivity().await;
            println!("{}", if reachable { "ok" } else { "unreachable" });
            Ok(())
        }
    }
}
