//! Agora chief state module for Caryatid
//!
//! Accounts executive votes on the legacy (MKR) and current (SKY) chiefs:
//! locked weight per voter, slates, spells and their live weighted support.

mod configuration;
pub mod log_note;
mod rest;
pub mod slates;
pub mod state;
pub mod weights;

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
    configuration::ChiefStateConfig,
    rest::{handle_slate, handle_spell, handle_voter},
    state::State,
};

pub struct ChiefState {
    db: EntityDb,
    reader: Arc<dyn ContractReader>,
}

impl ChiefState {
    pub fn new(db: EntityDb, reader: Arc<dyn ContractReader>) -> Self {
        Self { db, reader }
    }
}

#[async_trait]
impl Module<Message> for ChiefState {
    fn get_name(&self) -> &'static str {
        "chief-state"
    }

    fn get_description(&self) -> &'static str {
        "Executive vote accounting for the legacy and current chiefs"
    }

    async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let cfg = ChiefStateConfig::try_load(&config)?;
        info!("Creating subscriber on '{}'", cfg.subscribe_topic);

        let state = Arc::new(Mutex::new(State::new(self.db.clone(), self.reader.clone())));

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
                            "chief_state.handle",
                            chain = log.chain_id,
                            block = log.block_number
                        );
                        async {
                            let mut state = state_handler.lock().await;
                            if let Err(e) = state.handle(log, chain_message).await {
                                error!(
                                    "Chief event failed on chain {} block {} tx {} log {}: {e:#}",
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
                            .inspect_err(|e| error!("Chief tick error: {e}"))
                            .ok();
                    }
                }
            }
        });

        info!(
            "Creating request handlers on '{}', '{}' and '{}'",
            cfg.handle_voter_topic, cfg.handle_spell_topic, cfg.handle_slate_topic
        );

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_voter_topic, 1, move |params| {
            handle_voter(db.clone(), params)
        });

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_spell_topic, 2, move |params| {
            handle_spell(db.clone(), params)
        });

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_slate_topic, 2, move |params| {
            handle_slate(db.clone(), params)
        });

        Ok(())
    }
}
