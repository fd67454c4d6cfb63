// ── Poll loop ──
//
// One worker: on every tick fetch aggregates then state of energy, write
// both as points, and mirror them into the reflector if one is attached.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use powerwall_api::GatewayClient;

use crate::config::{ErrorPolicy, PollConfig};
use crate::error::CoreError;
use crate::reflector::Reflector;
use crate::sink::{Point, Sink};

pub struct Poller<S> {
    client: GatewayClient,
    sink: S,
    config: PollConfig,
    reflector: Option<Arc<Reflector>>,
}

impl<S: Sink> Poller<S> {
    pub fn new(client: GatewayClient, sink: S, config: PollConfig) -> Self {
        Self {
            client,
            sink,
            config,
            reflector: None,
        }
    }

    /// Mirror every successful cycle into `reflector`.
    pub fn with_reflector(mut self, reflector: Arc<Reflector>) -> Self {
        self.reflector = Some(reflector);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run a single fetch-and-write cycle.
    ///
    /// The reflector is only updated once both points are written, so it
    /// never shows readings the sink rejected.
    pub async fn cycle(&self) -> Result<(), CoreError> {
        let aggregates = self.client.aggregates().await?;
        let soe = self.client.state_of_energy().await?;
        debug!(
            fields = aggregates.len(),
            percentage = soe.percentage,
            "fetched readings"
        );

        let measurement = &self.config.measurement;
        self.sink
            .write(&Point::from_aggregates(measurement, &aggregates, Utc::now()))
            .await?;
        self.sink
            .write(&Point::from_state_of_energy(measurement, soe, Utc::now()))
            .await?;

        if let Some(reflector) = &self.reflector {
            reflector.reflect(&aggregates, soe).await;
        }
        Ok(())
    }

    /// Tick until `cancel` fires or a cycle fails under [`ErrorPolicy::Exit`].
    ///
    /// The first cycle runs one interval after start. Cancellation is only
    /// observed between cycles; an in-flight fetch is never interrupted.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), CoreError> {
        let period = self.config.interval;
        let start = Instant::now()
            .checked_add(period)
            .ok_or_else(|| CoreError::Config {
                message: format!("poll interval {period:?} is out of range"),
            })?;
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            every = ?period,
            on_error = %self.config.on_error,
            "poll loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("poll loop cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.cycle().await {
                Ok(()) => {}
                Err(e) if self.config.on_error == ErrorPolicy::Continue => {
                    warn!(error = %e, "poll cycle failed, skipping");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
