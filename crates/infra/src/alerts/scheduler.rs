//! Background alert scheduler.
//!
//! One tokio task runs the alert engine every `alert_interval`, on demand
//! through [`AlertSchedulerHandle::trigger`] / [`AlertSchedulerHandle::run_now`],
//! and optionally once at start. Passes never overlap: the loop awaits each
//! pass before polling for the next signal. A failed pass is logged and retried
//! at the next interval; it never stops the loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alerts::engine::{AlertEngine, EvaluationSummary};
use crate::config::EngineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::store::Store;

type RunNowReply = oneshot::Sender<ServiceResult<EvaluationSummary>>;

/// Control handle of a running scheduler.
#[derive(Debug)]
pub struct AlertSchedulerHandle {
    shutdown: watch::Sender<bool>,
    trigger: mpsc::Sender<()>,
    run_now: mpsc::Sender<RunNowReply>,
    join: JoinHandle<()>,
}

impl AlertSchedulerHandle {
    /// Request a pass without waiting for it.
    ///
    /// Triggers are coalesced: while one is already pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Run a pass and wait for its summary.
    pub async fn run_now(&self) -> ServiceResult<EvaluationSummary> {
        let (reply, response) = oneshot::channel();
        self.run_now
            .send(reply)
            .await
            .map_err(|_| ServiceError::SchedulerStopped)?;
        response.await.map_err(|_| ServiceError::SchedulerStopped)?
    }

    /// Stop the scheduler. A pass in progress ends between rules.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "alert scheduler task failed");
        }
    }
}

pub struct AlertScheduler;

impl AlertScheduler {
    /// Spawn the scheduler task on the current tokio runtime.
    pub fn spawn<S: Store>(engine: Arc<AlertEngine<S>>, config: &EngineConfig) -> AlertSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (run_now_tx, run_now_rx) = mpsc::channel(8);

        let join = tokio::spawn(scheduler_loop(
            engine,
            config.alert_interval,
            config.run_on_start,
            shutdown_rx,
            trigger_rx,
            run_now_rx,
        ));

        AlertSchedulerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            run_now: run_now_tx,
            join,
        }
    }
}

async fn scheduler_loop<S: Store>(
    engine: Arc<AlertEngine<S>>,
    interval: std::time::Duration,
    run_on_start: bool,
    mut shutdown: watch::Receiver<bool>,
    mut trigger: mpsc::Receiver<()>,
    mut run_now: mpsc::Receiver<RunNowReply>,
) {
    info!(
        interval_secs = interval.as_secs(),
        run_on_start,
        policy = engine.policy().as_str(),
        "alert scheduler started"
    );

    let first = if run_on_start {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = tokio::time::interval_at(first, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let _ = pass(&engine, &shutdown, "interval").await;
            }
            Some(()) = trigger.recv() => {
                let _ = pass(&engine, &shutdown, "trigger").await;
            }
            Some(reply) = run_now.recv() => {
                let result = pass(&engine, &shutdown, "manual").await;
                let _ = reply.send(result);
            }
        }
    }

    info!("alert scheduler stopped");
}

async fn pass<S: Store>(
    engine: &AlertEngine<S>,
    shutdown: &watch::Receiver<bool>,
    reason: &'static str,
) -> ServiceResult<EvaluationSummary> {
    debug!(reason, "alert pass starting");
    let result = engine.run_pass(|| *shutdown.borrow()).await;
    match &result {
        Ok(_) => {}
        Err(e) if e.is_transient() => {
            warn!(reason, error = %e, "alert pass failed; retrying at next interval")
        }
        Err(e) => error!(reason, error = %e, "alert pass failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use replenish_alerts::{AlertKind, AlertRule, NewAlertRule, ReactivationPolicy, StockAlert};
    use replenish_core::{Actor, Capabilities, Clock, LocationId, ManualClock, ProductId, UserId};
    use replenish_inventory::{ProductProfile, StockChange};

    use crate::ledger::InventoryLedger;
    use crate::notify::NoopDispatcher;
    use crate::store::{InMemoryStore, UnitOfWork};

    async fn low_stock_setup() -> (Arc<InMemoryStore>, Arc<AlertEngine<InMemoryStore>>) {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let actor = Actor::new(UserId::new(), Capabilities::all());
        let product = ProductProfile::new(ProductId::new(), "B-1", "Bolts");

        let mut tx = store.begin().await.unwrap();
        tx.save_product(&product).await.unwrap();
        let rule = AlertRule::create(
            NewAlertRule::new("low", AlertKind::LowStock).threshold(5),
            &actor,
            Utc::now(),
        )
        .unwrap();
        tx.save_alert_rule(&rule).await.unwrap();
        tx.commit().await.unwrap();

        InventoryLedger::new(store.clone(), clock.clone())
            .adjust(product.product_id, LocationId::new(), StockChange::inbound(2), &actor)
            .await
            .unwrap();

        let engine = Arc::new(AlertEngine::new(
            store.clone(),
            clock,
            Arc::new(NoopDispatcher),
            ReactivationPolicy::default(),
        ));
        (store, engine)
    }

    async fn alerts(store: &InMemoryStore) -> Vec<StockAlert> {
        let mut tx = store.begin().await.unwrap();
        tx.alerts().await.unwrap()
    }

    fn config(run_on_start: bool) -> EngineConfig {
        EngineConfig {
            alert_interval: Duration::from_secs(60),
            run_on_start,
            ..EngineConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_when_configured() {
        let (store, engine) = low_stock_setup().await;
        let handle = AlertScheduler::spawn(engine, &config(true));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(alerts(&store).await.len(), 1);

        // Still firing: the open alert is refreshed, not duplicated.
        let summary = handle.run_now().await.unwrap();
        assert_eq!((summary.created, summary.updated), (0, 1));
        assert_eq!(alerts(&store).await.len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn waits_one_interval_otherwise() {
        let (store, engine) = low_stock_setup().await;
        let handle = AlertScheduler::spawn(engine, &config(false));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(alerts(&store).await.is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(alerts(&store).await.len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_runs_a_pass() {
        let (store, engine) = low_stock_setup().await;
        let handle = AlertScheduler::spawn(engine, &config(false));

        handle.trigger();
        handle.trigger();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(alerts(&store).await.len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_does_not_stop_the_loop() {
        let (store, engine) = low_stock_setup().await;
        store.fail_next_begins(1);
        let handle = AlertScheduler::spawn(engine, &config(true));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(alerts(&store).await.is_empty());

        let summary = handle.run_now().await.unwrap();
        assert_eq!(summary.created, 1);
        handle.shutdown().await;
    }
}
