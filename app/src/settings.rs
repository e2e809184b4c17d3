use std::collections::BTreeSet;
use std::error::Error;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::coordinator::CoordinatorConfig;
use crate::core::unit::{DegreeCelsius, EuroPerKwh};
use crate::heating::{Preset, Tolerance};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub monitoring: MonitoringConfig,
    pub comfort: ComfortSettings,
    pub pricing: PricingSettings,
    pub water: WaterSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config.toml"))
            .add_source(Environment::default().separator("_").list_separator(","));

        let s = builder.build()?;
        s.try_deserialize()
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            preset: self.comfort.preset,
            tolerance: Tolerance::new(self.comfort.tolerance),
            indoor_target: DegreeCelsius(self.comfort.indoor_target),
            stop_heating_temp: DegreeCelsius(self.comfort.stop_heating_temp),
            very_cold_temp: DegreeCelsius(self.comfort.very_cold_temp),
            min_price: EuroPerKwh(self.pricing.min_price),
            demand_hours: self.water.demand_hours.clone(),
            quiet_hours: self.water.quiet_hours.clone(),
            indoor_sensor_count: self.comfort.indoor_sensors,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComfortSettings {
    #[serde(default)]
    pub preset: Preset,
    /// Maximum offset magnitude granted to the price schedule, in curve steps.
    pub tolerance: u32,
    pub indoor_target: f64,
    pub stop_heating_temp: f64,
    pub very_cold_temp: f64,
    pub indoor_sensors: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSettings {
    /// Prices at or below this level are always treated as cheap, in EUR/kWh.
    pub min_price: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WaterSettings {
    pub demand_hours: BTreeSet<u32>,
    pub quiet_hours: BTreeSet<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub app_name: String,
    pub logs: EnvFilterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvFilterConfig {
    pub default_level: String,
    pub filters: Vec<String>,
}

impl TryInto<EnvFilter> for EnvFilterConfig {
    type Error = tracing_subscriber::filter::ParseError;

    fn try_into(self) -> Result<EnvFilter, Self::Error> {
        EnvFilter::builder()
            .with_default_directive(self.default_level.parse()?)
            .parse(self.filters.join(","))
    }
}

impl MonitoringConfig {
    pub fn init(&self) -> Result<(), Box<dyn Error>> {
        let logging_filter: EnvFilter = self.logs.clone().try_into()?;
        let fmt_layer = tracing_subscriber::fmt::layer();

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(logging_filter)
            .init();

        tracing::info!("{} started", self.app_name);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_config_parses_into_env_filter() {
        let config = EnvFilterConfig {
            default_level: "info".to_owned(),
            filters: vec!["pumpwerk=debug".to_owned(), "hyper=warn".to_owned()],
        };

        let filter: Result<EnvFilter, _> = config.try_into();
        assert!(filter.is_ok());
    }
}
