//! 'main' for the Agora indexer process

use agora_common::{
    contract_calls::{CachingContractReader, ContractReader, RpcContractReader},
    messages::Message,
    store::EntityDb,
};
use anyhow::Result;
use caryatid_process::Process;
use caryatid_sdk::module_registry::ModuleRegistry;
use clap::Parser;
use config::{Config, Environment, File};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use agora_module_chief_state::ChiefState;
use agora_module_delegate_state::DelegateState;
use agora_module_polling_state::PollingState;
use agora_module_reward_state::RewardState;

use caryatid_module_clock::Clock;
use caryatid_module_rest_server::RESTServer;
use caryatid_module_spy::Spy;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, value_name = "PATH", default_values_t = vec!["indexer.toml".to_string()])]
    config: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Standard logging using RUST_LOG for log levels, default to INFO
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fjall=warn"));
    Registry::default().with(fmt::layer().with_filter(filter)).init();

    info!("Agora indexer process");

    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file));
    }
    let config = Arc::new(builder.add_source(Environment::with_prefix("AGORA")).build()?);

    // Shared store and contract reads
    let db = EntityDb::from_config(&config)?;
    let rpc: Arc<dyn ContractReader> = Arc::new(RpcContractReader::from_config(&config)?);
    let reader: Arc<dyn ContractReader> =
        Arc::new(CachingContractReader::from_config(rpc, &config));

    let mut process = Process::<Message>::create(config).await;

    // State modules fed by the ingestion topics
    process.register(Arc::new(ChiefState::new(db.clone(), reader.clone())));
    process.register(Arc::new(DelegateState::new(db.clone(), reader.clone())));
    process.register(Arc::new(PollingState::new(db.clone())));
    process.register(Arc::new(RewardState::new(db, reader)));

    Clock::<Message>::register(&mut process);
    RESTServer::<Message>::register(&mut process);
    Spy::<Message>::register(&mut process);

    process.run().await?;

    info!("Exiting");
    Ok(())
}
