//! Agora polling state module for Caryatid
//!
//! Tracks governance polls and poll votes from the mainnet and Arbitrum
//! polling emitters.

mod configuration;
pub mod polls;
mod rest;
pub mod state;

use std::sync::Arc;

use anyhow::Result;
use config::Config;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, Instrument};

use caryatid_sdk::{async_trait, Context, Module};

use agora_common::{messages::Message, rest_helper::handle_rest_with_parameters, store::EntityDb};

use crate::{configuration::PollingStateConfig, rest::handle_poll, state::State};

pub struct PollingState {
    db: EntityDb,
}

impl PollingState {
    pub fn new(db: EntityDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module<Message> for PollingState {
    fn get_name(&self) -> &'static str {
        "polling-state"
    }

    fn get_description(&self) -> &'static str {
        "Governance polls and poll votes"
    }

    async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let cfg = PollingStateConfig::try_load(&config)?;
        info!(
            "Creating subscriber on '{}', Arbitrum chains {:?}",
            cfg.subscribe_topic, cfg.arbitrum_chain_ids
        );

        let state = Arc::new(Mutex::new(State::new(
            self.db.clone(),
            cfg.arbitrum_chain_ids.iter().copied(),
        )));

        let mut subscription = context.subscribe(&cfg.subscribe_topic).await?;
        let state_handler = state.clone();
        context.run(async move {
            loop {
                let Ok((_, message)) = subscription.read().await else {
                    return;
                };
                match message.as_ref() {
                    Message::Chain((log, chain_message)) => {
                        let span = info_span!(
                            "polling_state.handle",
                            chain = log.chain_id,
                            block = log.block_number
                        );
                        async {
                            let mut state = state_handler.lock().await;
                            if let Err(e) = state.handle(log, chain_message).await {
                                error!(
                                    "Polling event failed on chain {} block {} tx {} log {}: {e:#}",
                                    log.chain_id, log.block_number, log.tx_hash, log.log_index
                                );
                            }
                        }
                        .instrument(span)
                        .await;
                    }

                    _ => error!("Unexpected message type: {message:?}"),
                }
            }
        });

        // Ticker to log stats
        let mut tick_subscription = context.subscribe(&cfg.clock_tick_topic).await?;
        let state_logger = state.clone();
        context.run(async move {
            loop {
                let Ok((_, message)) = tick_subscription.read().await else {
                    return;
                };
                if let Message::Clock(clock) = message.as_ref() {
                    if clock.number % 60 == 0 {
                        state_logger
                            .lock()
                            .await
                            .tick()
                            .await
                            .inspect_err(|e| error!("Polling tick error: {e}"))
                            .ok();
                    }
                }
            }
        });

        info!("Creating request handler on '{}'", cfg.handle_poll_topic);
        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_poll_topic, 2, move |params| {
            handle_poll(db.clone(), params)
        });

        Ok(())
    }
}
