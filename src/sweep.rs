//! Periodic monitored-source sweep (SPEC_FULL.md §10.5) — the Rust analogue
//! of the original's Celery-beat scheduled scan. Unlike the teacher's
//! bus-coupled `subsystems::cron`, which dispatches through a supervisor bus
//! this crate doesn't have, the sweep here is a plain interval-driven
//! `Component`: simpler, and a perfect fit since it only needs to call back
//! into the Run Controller on a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::metadata_store::MetadataStore;
use crate::run_controller::RunController;
use crate::runtime::{Component, ComponentFuture};

pub struct SweepWorker {
    store: Arc<MetadataStore>,
    run_controller: Arc<RunController>,
    interval: Duration,
}

impl SweepWorker {
    pub fn new(store: Arc<MetadataStore>, run_controller: Arc<RunController>, interval: Duration) -> Self {
        Self { store, run_controller, interval }
    }
}

impl Component for SweepWorker {
    fn id(&self) -> &str {
        "monitored-source-sweep"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_sweep(self.store, self.run_controller, self.interval, shutdown))
    }
}

async fn run_sweep(
    store: Arc<MetadataStore>,
    run_controller: Arc<RunController>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("monitored-source sweep shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = sweep_once(&store, &run_controller) {
                    error!(error = %e, "monitored-source sweep failed");
                }
            }
        }
    }
}

fn sweep_once(store: &MetadataStore, run_controller: &RunController) -> Result<(), AppError> {
    let sources = store.list_monitored_sources()?;
    for source in sources.into_iter().filter(|s| s.enabled) {
        let scope = match serde_json::from_str(&source.scope_json) {
            Ok(scope) => scope,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "skipping monitored source with invalid scope");
                continue;
            }
        };

        let run = match run_controller.create(&scope) {
            Ok(run) => run,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "failed to create sweep run");
                continue;
            }
        };

        if let Err(e) = run_controller.start_indexing_for_source(&run.id, &source.id) {
            warn!(source_id = %source.id, run_id = %run.id, error = %e, "failed to start sweep run");
            continue;
        }

        if let Err(e) = store.touch_monitored_source_checked(&source.id) {
            warn!(source_id = %source.id, error = %e, "failed to record monitored-source sweep timestamp");
        }

        info!(source_id = %source.id, run_id = %run.id, "monitored-source sweep started run");
    }
    Ok(())
}
