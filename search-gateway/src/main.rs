use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use search_gateway::loader::{parse_filters, read_records, DEFAULT_BATCH_SIZE};
use search_gateway::{Dependencies, GatewayConfig, GatewayError, LoaderConfig, RecordLoader};
use search_gateway_shared::IndexParams;

#[derive(Parser)]
#[command(name = "search-gateway")]
#[command(about = "Manage the search backends and the indexes they serve", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Only check backend connections
    Check,
    /// Create the configured indexes and apply their settings
    Provision {
        /// Logical index to provision (repeatable); defaults to every configured index
        #[arg(long = "index")]
        indexes: Vec<String>,
    },
    /// Provision an index, then load JSON Lines records into it
    Load {
        /// Logical index to load
        #[arg(long)]
        index: String,

        /// JSON Lines file, one record per line
        #[arg(long)]
        file: PathBuf,

        /// Only load records matching these field=value pairs, comma separated
        #[arg(long, default_value = "")]
        filters: String,

        /// Records per write
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Per-write request timeout in seconds
        #[arg(long)]
        request_timeout_secs: Option<u64>,
    },
    /// Print the uid of every Meilisearch index
    ListIndexes,
    /// Create a Meilisearch key for every action on every index
    CreateKey {
        /// Key description
        #[arg(long, default_value = "search-gateway")]
        description: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match env::var("LOG_FORMAT").as_deref() {
        Ok("json") => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn run(cli: Cli) -> Result<(), GatewayError> {
    let config = GatewayConfig::from_env()?;
    let deps = Dependencies::new(config)?;

    deps.verify_connections().await?;

    match cli.command {
        Commands::Check => {}
        Commands::Provision { indexes } => {
            let provisioned = deps.provision_indexes(&indexes).await?;
            info!(indexes = ?provisioned, "Provisioning complete");
        }
        Commands::Load {
            index,
            file,
            filters,
            batch_size,
            request_timeout_secs,
        } => {
            let filters = parse_filters(&filters)?;
            let records = read_records(BufReader::new(File::open(&file)?), &filters)?;
            info!(index = %index, file = %file.display(), count = records.len(), "Loading records");

            deps.provision_indexes(std::slice::from_ref(&index)).await?;
            let params = match request_timeout_secs {
                Some(secs) => IndexParams::with_request_timeout(Duration::from_secs(secs)),
                None => IndexParams::default(),
            };
            let loader = RecordLoader::with_config(deps.engine(&index), LoaderConfig { batch_size, params });
            let summary = loader.load(&records).await?;
            for rejected in summary.results.iter().filter(|r| !r.success) {
                warn!(
                    id = %rejected.document_id,
                    error = rejected.error.as_deref().unwrap_or_default(),
                    "Record rejected"
                );
            }
        }
        Commands::ListIndexes => {
            for uid in deps.list_indexes().await? {
                println!("{}", uid);
            }
        }
        Commands::CreateKey { description } => {
            let key = deps.create_api_key(&description).await?;
            println!("{}", key.key);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "search-gateway failed");
            ExitCode::FAILURE
        }
    }
}
