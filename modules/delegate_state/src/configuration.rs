use agora_common::{Address, ChainId};
use anyhow::{Context, Result};
use config::Config;
use std::collections::HashMap;

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DelegateStateConfig {
    pub subscribe_topic: String,
    pub engine_subscribe_topic: String,
    pub clock_tick_topic: String,
    pub handle_delegate_topic: String,
    pub handle_delegation_topic: String,
    pub handle_urn_topic: String,
    pub excluded_delegators: Vec<Address>,
    pub default_sky_rate: u64,
    sky_conversion_contracts: HashMap<String, Address>,
}

impl DelegateStateConfig {
    pub fn try_load(config: &Config) -> Result<Self> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        Ok(full_config.try_deserialize()?)
    }

    /// MKR/SKY converter per chain
    pub fn sky_conversion_contracts(&self) -> Result<HashMap<ChainId, Address>> {
        self.sky_conversion_contracts
            .iter()
            .map(|(chain, address)| {
                let chain_id = chain
                    .parse::<ChainId>()
                    .with_context(|| format!("Invalid chain id '{chain}' in sky-conversion-contracts"))?;
                Ok((chain_id, *address))
            })
            .collect()
    }
}
