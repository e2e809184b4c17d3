use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::time::{DateTime, Duration};
use crate::port::Command;
use crate::t;

use super::BoostPlan;

/// How often a running boost re-checks the load-management signal.
const BREACH_POLL: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostPhase {
    Idle,
    PreHeating,
    Boosting,
}

/// One physical boost: engage, watch the clock and the peak-breach signal,
/// release. The release command is sent on every exit path, including
/// cancellation, so the device can never stay engaged.
pub async fn boost_cycle(
    cancel: CancellationToken,
    commands: mpsc::Sender<Command>,
    peak_breach: watch::Receiver<bool>,
    duration: Duration,
    target_temp: i32,
) -> anyhow::Result<()> {
    commands.send(Command::WaterBoost { start: true, target_temp }).await?;

    let deadline = tokio::time::Instant::now() + duration.to_std();

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break "cancelled",
            _ = tokio::time::sleep_until(deadline) => break "timeout",
            _ = tokio::time::sleep(BREACH_POLL) => {
                if *peak_breach.borrow() {
                    break "peak-breach";
                }
            }
        }
    };

    tracing::info!("Water boost finished ({})", reason);

    commands.send(Command::WaterBoost { start: false, target_temp }).await?;
    Ok(())
}

/// Polls the computed boost plan on a fixed interval and drives the
/// Idle -> PreHeating -> Boosting -> Idle cycle. Completion timestamps are
/// published so the scheduler can apply its re-boost guard.
pub struct WaterBoostRunner {
    plan_rx: watch::Receiver<Option<BoostPlan>>,
    peak_breach_rx: watch::Receiver<bool>,
    commands: mpsc::Sender<Command>,
    completed_tx: watch::Sender<Option<DateTime>>,
    phase: BoostPhase,
    active: Option<(CancellationToken, tokio::task::JoinHandle<anyhow::Result<()>>)>,
    poll_interval: std::time::Duration,
}

impl WaterBoostRunner {
    pub fn new(
        plan_rx: watch::Receiver<Option<BoostPlan>>,
        peak_breach_rx: watch::Receiver<bool>,
        commands: mpsc::Sender<Command>,
        completed_tx: watch::Sender<Option<DateTime>>,
    ) -> Self {
        Self {
            plan_rx,
            peak_breach_rx,
            commands,
            completed_tx,
            phase: BoostPhase::Idle,
            active: None,
            poll_interval: std::time::Duration::from_secs(20),
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            ticker.tick().await;
            self.poll().await;
        }
    }

    async fn poll(&mut self) {
        match self.phase {
            BoostPhase::Idle => {
                let plan = *self.plan_rx.borrow();

                if let Some(plan) = plan
                    && t!(now) >= plan.at
                    && plan.duration > Duration::zero()
                {
                    tracing::info!(
                        "Water boost due (target {}, {} min)",
                        plan.target_temp,
                        plan.duration.as_minutes()
                    );
                    self.phase = BoostPhase::PreHeating;
                }
            }

            BoostPhase::PreHeating => {
                let plan = *self.plan_rx.borrow();

                match plan {
                    Some(plan) => {
                        let cancel = CancellationToken::new();
                        let cycle = boost_cycle(
                            cancel.clone(),
                            self.commands.clone(),
                            self.peak_breach_rx.clone(),
                            plan.duration,
                            plan.target_temp.0.round() as i32,
                        );

                        self.active = Some((cancel, tokio::spawn(cycle)));
                        self.phase = BoostPhase::Boosting;
                    }
                    //plan withdrawn before the boost engaged
                    None => self.phase = BoostPhase::Idle,
                }
            }

            BoostPhase::Boosting => {
                let finished = self.active.as_ref().is_some_and(|(_, handle)| handle.is_finished());

                if finished {
                    if let Some((_, handle)) = self.active.take() {
                        match handle.await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::error!("Boost cycle failed: {:?}", e),
                            Err(e) => tracing::error!("Boost cycle panicked: {:?}", e),
                        }
                    }

                    if let Err(e) = self.completed_tx.send(Some(t!(now))) {
                        tracing::error!("Error publishing boost completion: {:?}", e);
                    }

                    self.phase = BoostPhase::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::unit::DegreeCelsius;

    #[tokio::test(start_paused = true)]
    async fn cycle_engages_and_releases_on_timeout() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (_breach_tx, breach_rx) = watch::channel(false);

        let cycle = tokio::spawn(boost_cycle(
            CancellationToken::new(),
            cmd_tx,
            breach_rx,
            Duration::minutes(30),
            47,
        ));

        assert_eq!(
            cmd_rx.recv().await,
            Some(Command::WaterBoost {
                start: true,
                target_temp: 47
            })
        );
        assert_eq!(
            cmd_rx.recv().await,
            Some(Command::WaterBoost {
                start: false,
                target_temp: 47
            })
        );

        cycle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_releases_early_on_peak_breach() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (breach_tx, breach_rx) = watch::channel(false);

        let started = tokio::time::Instant::now();
        let cycle = tokio::spawn(boost_cycle(
            CancellationToken::new(),
            cmd_tx,
            breach_rx,
            Duration::minutes(30),
            47,
        ));

        cmd_rx.recv().await;
        breach_tx.send(true).unwrap();

        assert_eq!(
            cmd_rx.recv().await,
            Some(Command::WaterBoost {
                start: false,
                target_temp: 47
            })
        );
        assert!(started.elapsed() < std::time::Duration::from_secs(60));

        cycle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_releases_on_cancellation() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (_breach_tx, breach_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let cycle = tokio::spawn(boost_cycle(cancel.clone(), cmd_tx, breach_rx, Duration::minutes(30), 47));

        cmd_rx.recv().await;
        cancel.cancel();

        assert_eq!(
            cmd_rx.recv().await,
            Some(Command::WaterBoost {
                start: false,
                target_temp: 47
            })
        );

        cycle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn runner_engages_once_the_start_time_is_reached() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (plan_tx, plan_rx) = watch::channel(None);
        let (_breach_tx, breach_rx) = watch::channel(false);

        let (completed_tx, mut completed_rx) = watch::channel(None);
        let runner = WaterBoostRunner::new(plan_rx, breach_rx, cmd_tx, completed_tx);
        let runner_handle = tokio::spawn(runner.run());

        plan_tx
            .send(Some(BoostPlan {
                at: DateTime::now() - Duration::minutes(1),
                target_temp: DegreeCelsius(47.0),
                duration: Duration::minutes(20),
            }))
            .unwrap();

        assert_eq!(
            cmd_rx.recv().await,
            Some(Command::WaterBoost {
                start: true,
                target_temp: 47
            })
        );
        assert_eq!(
            cmd_rx.recv().await,
            Some(Command::WaterBoost {
                start: false,
                target_temp: 47
            })
        );

        completed_rx.changed().await.unwrap();
        assert!(completed_rx.borrow().is_some());

        runner_handle.abort();
    }
}
