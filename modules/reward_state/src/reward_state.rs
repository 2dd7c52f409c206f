//! Agora reward state module for Caryatid
//!
//! Keeps reward pool totals and per-user supplied amounts, which engines
//! offer each pool as a farm, and which farm each urn has selected.

mod configuration;
pub mod pools;
mod rest;
pub mod state;

use std::sync::Arc;

use anyhow::Result;
use config::Config;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, Instrument};

use caryatid_sdk::{async_trait, Context, Module};

use agora_common::{
    contract_calls::ContractReader, messages::Message, rest_helper::handle_rest_with_parameters,
    store::EntityDb,
};

use crate::{
    configuration::RewardStateConfig,
    rest::{handle_reward, handle_supplier},
    state::State,
};

pub struct RewardState {
    db: EntityDb,
    reader: Arc<dyn ContractReader>,
}

impl RewardState {
    pub fn new(db: EntityDb, reader: Arc<dyn ContractReader>) -> Self {
        Self { db, reader }
    }
}

#[async_trait]
impl Module<Message> for RewardState {
    fn get_name(&self) -> &'static str {
        "reward-state"
    }

    fn get_description(&self) -> &'static str {
        "Reward pools, suppliers and farm activation"
    }

    async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let cfg = RewardStateConfig::try_load(&config)?;
        let state = Arc::new(Mutex::new(State::new(self.db.clone(), self.reader.clone())));

        for topic in [&cfg.subscribe_topic, &cfg.engine_subscribe_topic] {
            info!("Creating subscriber on '{topic}'");
            let mut subscription = context.subscribe(topic).await?;
            let state_handler = state.clone();
            context.run(async move {
                loop {
                    let Ok((_, message)) = subscription.read().await else {
                        return;
                    };
                    match message.as_ref() {
                        Message::Chain((log, chain_message)) => {
                            let span = info_span!(
                                "reward_state.handle",
                                chain = log.chain_id,
                                block = log.block_number
                            );
                            async {
                                let mut state = state_handler.lock().await;
                                if let Err(e) = state.handle(log, chain_message).await {
                                    error!(
                                        "Reward event failed on chain {} block {} tx {} log {}: {e:#}",
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
        }

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
                            .inspect_err(|e| error!("Reward tick error: {e}"))
                            .ok();
                    }
                }
            }
        });

        info!(
            "Creating request handlers on '{}' and '{}'",
            cfg.handle_reward_topic, cfg.handle_supplier_topic
        );

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_reward_topic, 1, move |params| {
            handle_reward(db.clone(), params)
        });

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_supplier_topic, 1, move |params| {
            handle_supplier(db.clone(), params)
        });

        Ok(())
    }
}
