mod inputs;

use std::collections::BTreeSet;

use tokio::sync::{broadcast, mpsc, watch};

use crate::core::time::DateTime;
use crate::core::unit::{DegreeCelsius, EuroPerKwh};
use crate::heating::{ComfortAdjuster, ComfortInput, Preset, Tolerance, VentilationRule};
use crate::port::Command;
use crate::pricing::{OffsetSchedule, compute_offsets, identify_peaks, identify_valleys};
use crate::t;
use crate::water::{BoostPlan, BoostQuery, WaterBoostState, next_start};

pub use inputs::{InputBus, InputEvent, Inputs};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub preset: Preset,
    pub tolerance: Tolerance,
    pub indoor_target: DegreeCelsius,
    pub stop_heating_temp: DegreeCelsius,
    /// Below this outdoor temperature peak-hour suppression is disabled.
    pub very_cold_temp: DegreeCelsius,
    pub min_price: EuroPerKwh,
    pub demand_hours: BTreeSet<u32>,
    pub quiet_hours: BTreeSet<u32>,
    pub indoor_sensor_count: usize,
}

/// Owns the input snapshot and drives all recomputation, either on a fixed
/// schedule or debounced after a burst of input events. Heating offset,
/// ventilation and water planning all run on this one task; the lock makes
/// that explicit for anyone adding a second entry point later.
pub struct CoordinatorRunner {
    config: CoordinatorConfig,
    inputs: Inputs,
    schedule: OffsetSchedule,
    adjuster: ComfortAdjuster,
    vent_rule: VentilationRule,
    water_state: WaterBoostState,
    recompute_lock: std::sync::Arc<tokio::sync::Mutex<()>>,
    input_rx: broadcast::Receiver<InputEvent>,
    commands: mpsc::Sender<Command>,
    boost_completed_rx: watch::Receiver<Option<DateTime>>,
    plan_tx: watch::Sender<Option<BoostPlan>>,
    breach_tx: watch::Sender<bool>,
}

impl CoordinatorRunner {
    pub fn new(
        config: CoordinatorConfig,
        input_rx: broadcast::Receiver<InputEvent>,
        commands: mpsc::Sender<Command>,
        boost_completed_rx: watch::Receiver<Option<DateTime>>,
    ) -> (
        Self,
        watch::Receiver<Option<BoostPlan>>,
        watch::Receiver<bool>,
    ) {
        let (plan_tx, plan_rx) = watch::channel(None);
        let (breach_tx, breach_rx) = watch::channel(false);

        let runner = Self {
            inputs: Inputs::new(config.indoor_sensor_count, config.preset),
            adjuster: ComfortAdjuster::new(config.stop_heating_temp),
            config,
            schedule: OffsetSchedule::default(),
            vent_rule: VentilationRule::new(),
            water_state: WaterBoostState::default(),
            recompute_lock: std::sync::Arc::new(tokio::sync::Mutex::new(())),
            input_rx,
            commands,
            boost_completed_rx,
            plan_tx,
            breach_tx,
        };

        (runner, plan_rx, breach_rx)
    }

    pub async fn run(mut self) {
        let scheduled = tokio::time::Duration::from_secs(25);
        let debounce = tokio::time::Duration::from_millis(250);

        let sleeper = tokio::time::sleep(scheduled);
        tokio::pin!(sleeper);

        loop {
            tokio::select! {
                event = self.input_rx.recv() => match event {
                    Ok(event) => {
                        self.apply_event(event);
                        sleeper.as_mut().reset(tokio::time::Instant::now() + debounce);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Input bus lagging, {} events dropped", skipped);
                        sleeper.as_mut().reset(tokio::time::Instant::now() + debounce);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Input bus closed, coordinator terminating");
                        break;
                    }
                },

                changed = self.boost_completed_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("Water boost runner gone, coordinator terminating");
                        break;
                    }
                    sleeper.as_mut().reset(tokio::time::Instant::now() + debounce);
                }

                () = &mut sleeper => {
                    self.recompute().await;
                    sleeper.as_mut().reset(tokio::time::Instant::now() + scheduled);
                }
            }
        }
    }

    fn apply_event(&mut self, event: InputEvent) {
        if let InputEvent::PeakBreach(breached) = event {
            self.breach_tx.send_replace(breached);
        }

        self.inputs.apply(event);
    }

    /// On failure previous outputs stay active; the pump keeps running on the
    /// last known good schedule.
    async fn recompute(&mut self) {
        let lock = self.recompute_lock.clone();
        let _guard = lock.lock().await;

        if let Err(e) = self.recompute_now().await {
            tracing::error!("Recomputation failed, previous outputs stay active: {:?}", e);
        }
    }

    async fn recompute_now(&mut self) -> anyhow::Result<()> {
        let now = t!(now);

        self.refresh_schedule(now);
        self.update_heating(now).await?;
        self.update_water(now).await?;

        Ok(())
    }

    fn refresh_schedule(&mut self, now: DateTime) {
        let Some(prices) = &self.inputs.prices else {
            return;
        };

        if prices.today().len() != now.hours_in_day() {
            tracing::warn!(
                "Today's price series has {} entries, expected {}",
                prices.today().len(),
                now.hours_in_day()
            );
        }

        //no outdoor reading yet means no cold-weather tolerance reduction
        let outdoor = self.inputs.outdoor.unwrap_or(DegreeCelsius(0.0));
        let tolerance = self.config.tolerance.effective(outdoor);

        match compute_offsets(prices, self.config.min_price, tolerance) {
            Some(schedule) => {
                if let Some(price) = prices.price_at_hour(now.hour() as usize) {
                    tracing::debug!(
                        "Schedule refreshed, current price {}, cheapest hours today {:?}",
                        price,
                        identify_valleys(prices.today())
                    );
                }
                self.schedule = schedule;
            }
            None => tracing::warn!("Price series incomplete, keeping previous offset schedule"),
        }
    }

    async fn update_heating(&mut self, now: DateTime) -> anyhow::Result<()> {
        if !self.inputs.sensors_ready() {
            return Ok(());
        }

        let (Some(indoor), Some(outdoor)) = (self.inputs.indoor_mean(), self.inputs.outdoor) else {
            return Ok(());
        };

        let target = self.config.indoor_target + self.inputs.preset.setpoint_delta();
        let raw_offset = self.schedule.offset_at(now.hour()).unwrap_or(0);
        let is_peak_hour = self.is_peak_hour(now) && outdoor > self.config.very_cold_temp;

        let sensor_temps = self.inputs.reported_temps();
        let input = ComfortInput {
            raw_offset,
            indoor_temp: indoor,
            target_temp: target,
            sensor_temps: &sensor_temps,
            indoor_trend: &self.inputs.indoor_trend,
            degree_minutes_trend: &self.inputs.degree_minutes_trend,
            is_peak_hour,
            outdoor_temp: outdoor,
            preset: self.inputs.preset,
            heating_active: self.inputs.heating_active(),
            grid_peak_warning: self.inputs.peak_breach,
            addon_heater_active: self.inputs.addon_heater,
        };

        if let Some(applied) = self.adjuster.apply_comfort(&input) {
            let reasons = applied
                .deltas
                .iter()
                .map(|(reason, delta)| format!("{}{:+}", reason, delta))
                .collect::<Vec<_>>()
                .join(", ");

            tracing::info!("Applying heating offset {} ({})", applied.value, reasons);
            self.commands
                .send(Command::SetOffset {
                    offset: applied.value,
                })
                .await?;
        }

        if let Some(on) = self.vent_rule.evaluate(
            indoor,
            target,
            &self.inputs.indoor_trend,
            outdoor,
            self.inputs.preset,
        ) {
            tracing::info!("Ventilation boost {}", if on { "on" } else { "off" });
            self.commands.send(Command::VentBoost { on }).await?;
        }

        Ok(())
    }

    async fn update_water(&mut self, now: DateTime) -> anyhow::Result<()> {
        let (Some(prices), Some(current_temp)) = (&self.inputs.prices, self.inputs.water_temp)
        else {
            return Ok(());
        };

        let state = WaterBoostState {
            current_temp,
            latest_boost: *self.boost_completed_rx.borrow(),
            ..Default::default()
        }
        .with_trend(self.inputs.water_trend.gradient());

        let query = BoostQuery {
            prices,
            demand_hours: &self.config.demand_hours,
            quiet_hours: &self.config.quiet_hours,
            current_temp: state.current_temp,
            trend_per_hour: state.trend_per_hour,
            min_price: self.config.min_price,
            preset: self.inputs.preset,
            latest_boost: state.latest_boost,
            now,
        };

        let plan = next_start(&query);

        if plan != self.water_state.next_start {
            match &plan {
                Some(plan) => tracing::info!(
                    "Next water boost {} to {} for {} min",
                    plan.at.to_human_readable(),
                    plan.target_temp,
                    plan.duration.as_minutes()
                ),
                None => tracing::info!("No water boost scheduled"),
            }

            self.plan_tx.send_replace(plan);
            self.commands
                .send(Command::NextWaterBoost {
                    at: plan.map(|p| p.at),
                })
                .await?;
        }

        self.water_state = WaterBoostState {
            next_start: plan,
            ..state
        };

        Ok(())
    }

    fn is_peak_hour(&self, now: DateTime) -> bool {
        let Some(prices) = &self.inputs.prices else {
            return false;
        };

        identify_peaks(prices.today()).contains(&(now.hour() as usize))
    }
}
