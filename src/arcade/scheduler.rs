//! Poll scheduler with statum state machine
//!
//! ```text
//! Idle ──arm()──► Active ──disarm()──► Idle
//!                   │
//!            tokio task: every period, SharedBus::poll_once()
//! ```
//!
//! The task holds a strong reference to its bus. Disarming cancels the task
//! and waits for it, so no tick is in flight once `disarm` returns.

use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::bus::SharedBus;

/// Poll period: 1/100 s.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(10);

const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[state]
#[derive(Debug, Clone)]
pub enum SchedulerState {
    Idle,
    Active,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<u64>,
}

#[machine]
pub struct PollScheduler<S: SchedulerState> {
    bus: Arc<SharedBus>,
    period: Duration,
    task: Option<PollTask>,
}

impl<S: SchedulerState> PollScheduler<S> {
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl PollScheduler<Idle> {
    pub fn create(bus: Arc<SharedBus>, period: Duration) -> Self {
        Self::new(bus, period, None)
    }

    /// Spawns the poll task. The first tick fires one period from now.
    pub fn arm(mut self) -> PollScheduler<Active> {
        info!(
            "Arming poller for {} every {} ms",
            self.bus.port_name(),
            self.period.as_millis()
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(
            self.bus.clone(),
            self.period,
            cancel.clone(),
        ));
        self.task = Some(PollTask { cancel, handle });
        self.transition()
    }
}

impl PollScheduler<Active> {
    /// Stops the poll task and waits for a running tick to finish.
    pub async fn disarm(mut self) -> PollScheduler<Idle> {
        if let Some(task) = self.task.take() {
            task.cancel.cancel();
            match task.handle.await {
                Ok(ticks) => info!(
                    "Poller for {} stopped after {} ticks",
                    self.bus.port_name(),
                    ticks
                ),
                Err(e) => error!(
                    "Poller for {} terminated abnormally: {}",
                    self.bus.port_name(),
                    e
                ),
            }
        }
        self.transition()
    }
}

/// Runtime view over both scheduler states
pub enum Scheduler {
    Idle(PollScheduler<Idle>),
    Active(PollScheduler<Active>),
}

impl Scheduler {
    pub fn new(bus: Arc<SharedBus>, period: Duration) -> Self {
        Scheduler::Idle(PollScheduler::create(bus, period))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Scheduler::Active(_))
    }

    pub fn arm(self) -> Self {
        match self {
            Scheduler::Idle(idle) => Scheduler::Active(idle.arm()),
            active => {
                debug!("Poller already armed");
                active
            }
        }
    }

    pub async fn disarm(self) -> Self {
        match self {
            Scheduler::Active(active) => Scheduler::Idle(active.disarm().await),
            idle => {
                debug!("Poller already idle");
                idle
            }
        }
    }
}

async fn run_poll_loop(bus: Arc<SharedBus>, period: Duration, cancel: CancellationToken) -> u64 {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    // A late tick pushes the schedule back instead of bursting to catch up
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ticks: u64 = 0;
    let mut window_ticks: u64 = 0;
    let mut window_start = Instant::now();

    debug!("Entering poll loop for {}", bus.port_name());
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                bus.poll_once();
                ticks += 1;
                window_ticks += 1;
            }
        }

        let elapsed = window_start.elapsed();
        if elapsed >= STATS_INTERVAL {
            info!(
                "Poller stats for {}: {} ticks in {} s ({:.1}/s)",
                bus.port_name(),
                window_ticks,
                elapsed.as_secs(),
                window_ticks as f64 / elapsed.as_secs_f64()
            );
            window_ticks = 0;
            window_start = Instant::now();
        }
    }
    ticks
}
