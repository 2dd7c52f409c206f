//! Agora delegate state module for Caryatid
//!
//! Maintains vote delegates, their delegations and vote proxies, and forwards
//! what lockstake and staking engine urns lock to the urn's chosen delegate.

mod configuration;
pub mod engines;
pub mod factory;
pub mod ledger;
mod rest;
pub mod state;

use std::sync::Arc;

use anyhow::{bail, Result};
use config::Config;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, Instrument};

use caryatid_sdk::{async_trait, Context, Module};

use agora_common::{
    contract_calls::ContractReader, messages::Message, rest_helper::handle_rest_with_parameters,
    store::EntityDb,
};

use crate::{
    configuration::DelegateStateConfig,
    engines::SkyConversion,
    ledger::DelegationLedger,
    rest::{handle_delegate, handle_delegation, handle_urn},
    state::State,
};

pub struct DelegateState {
    db: EntityDb,
    reader: Arc<dyn ContractReader>,
}

impl DelegateState {
    pub fn new(db: EntityDb, reader: Arc<dyn ContractReader>) -> Self {
        Self { db, reader }
    }
}

#[async_trait]
impl Module<Message> for DelegateState {
    fn get_name(&self) -> &'static str {
        "delegate-state"
    }

    fn get_description(&self) -> &'static str {
        "Vote delegates, delegations and engine urn forwarding"
    }

    async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let cfg = DelegateStateConfig::try_load(&config)?;
        if cfg.default_sky_rate == 0 {
            bail!("default-sky-rate must be positive");
        }
        let ledger = DelegationLedger::new(cfg.excluded_delegators.iter().copied());
        let conversion =
            SkyConversion::new(cfg.sky_conversion_contracts()?, cfg.default_sky_rate.into());
        info!(
            "Excluding {} aggregator delegators, default SKY rate {}",
            cfg.excluded_delegators.len(),
            cfg.default_sky_rate
        );

        let state = Arc::new(Mutex::new(State::new(
            self.db.clone(),
            self.reader.clone(),
            ledger,
            conversion,
        )));

        // Delegate contracts and engines share one state so each event sees the other's writes
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
                                "delegate_state.handle",
                                chain = log.chain_id,
                                block = log.block_number
                            );
                            async {
                                let mut state = state_handler.lock().await;
                                if let Err(e) = state.handle(log, chain_message).await {
                                    error!(
                                        "Delegate event failed on chain {} block {} tx {} log {}: {e:#}",
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
                            .inspect_err(|e| error!("Delegate tick error: {e}"))
                            .ok();
                    }
                }
            }
        });

        info!(
            "Creating request handlers on '{}', '{}' and '{}'",
            cfg.handle_delegate_topic, cfg.handle_delegation_topic, cfg.handle_urn_topic
        );

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_delegate_topic, 1, move |params| {
            handle_delegate(db.clone(), params)
        });

        let db = self.db.clone();
        handle_rest_with_parameters(
            context.clone(),
            &cfg.handle_delegation_topic,
            1,
            move |params| handle_delegation(db.clone(), params),
        );

        let db = self.db.clone();
        handle_rest_with_parameters(context.clone(), &cfg.handle_urn_topic, 1, move |params| {
            handle_urn(db.clone(), params)
        });

        Ok(())
    }
}
