use anyhow::Result;
use config::Config;

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RewardStateConfig {
    pub subscribe_topic: String,
    pub engine_subscribe_topic: String,
    pub clock_tick_topic: String,
    pub handle_reward_topic: String,
    pub handle_supplier_topic: String,
}

impl RewardStateConfig {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_can_be_overridden() {
        let config = Config::builder()
            .set_override("subscribe-topic", "test.rewards")
            .unwrap()
            .build()
            .unwrap();
        let cfg = RewardStateConfig::try_load(&config).unwrap();
        assert_eq!(cfg.subscribe_topic, "test.rewards");
        assert_eq!(cfg.engine_subscribe_topic, "sky.engines");
    }
}
