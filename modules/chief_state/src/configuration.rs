use anyhow::Result;
use config::Config;

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChiefStateConfig {
    pub subscribe_topic: String,
    pub clock_tick_topic: String,
    pub handle_voter_topic: String,
    pub handle_spell_topic: String,
    pub handle_slate_topic: String,
}

impl ChiefStateConfig {
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
    fn defaults_fill_missing_keys() {
        let config = Config::builder()
            .set_override("subscribe-topic", "test.chief")
            .unwrap()
            .build()
            .unwrap();
        let cfg = ChiefStateConfig::try_load(&config).unwrap();
        assert_eq!(cfg.subscribe_topic, "test.chief");
        assert_eq!(cfg.clock_tick_topic, "clock.tick");
        assert_eq!(cfg.handle_spell_topic, "rest.get.spells.*.*");
    }
}
