use agora_common::ChainId;
use anyhow::Result;
use config::Config;

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollingStateConfig {
    pub subscribe_topic: String,
    pub clock_tick_topic: String,
    pub handle_poll_topic: String,
    pub arbitrum_chain_ids: Vec<ChainId>,
}

impl PollingStateConfig {
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
}
