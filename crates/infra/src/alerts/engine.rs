//! Alert rule engine: evaluates active rules against the ledger and applies
//! the dedup/lifecycle policy.
//!
//! A pass runs in two phases. Every rule is first evaluated in its own read
//! unit of work, and the verdicts of all rules that reached the same
//! (product, location, kind) lineage are merged. The merged verdicts are then
//! applied in one write unit of work, so overlapping rules of one kind never
//! act on the same alert twice in a pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use replenish_alerts::{
    AlertAction, AlertKind, AlertLifecycle, AlertNotification, AlertRule, AlertRuleId, Condition,
    Evaluation, NotificationChannels, ReactivationPolicy, StockAlert, decide, evaluate,
};
use replenish_core::{Clock, Entity, LocationId, ProductId};
use replenish_inventory::ProductProfile;

use crate::error::ServiceResult;
use crate::notify::{NotificationDispatcher, dispatch_all};
use crate::store::{Store, UnitOfWork};

/// Counts of one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub created: usize,
    pub updated: usize,
    pub resolved: usize,
    pub rules_evaluated: usize,
    pub rules_failed: usize,
    /// Lineages whose alert could not be read or written.
    pub alerts_failed: usize,
}

impl EvaluationSummary {
    /// Alert changes (created + updated + resolved).
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.resolved
    }
}

type Lineage = (ProductId, LocationId, AlertKind);

/// Merged outcome of every rule that evaluated one lineage.
///
/// The lineage fires when any rule fires. Among firing rules the broadest
/// condition is kept (highest shortage threshold, lowest overstock
/// threshold; the earlier rule on a tie). It clears only when every rule
/// clears.
#[derive(Debug)]
struct Verdict {
    firing: Option<(AlertRuleId, Condition)>,
    firing_channels: NotificationChannels,
    current_quantity: i64,
    clear_channels: NotificationChannels,
}

impl Verdict {
    fn new() -> Self {
        Self {
            firing: None,
            firing_channels: NotificationChannels::NONE,
            current_quantity: 0,
            clear_channels: NotificationChannels::NONE,
        }
    }

    fn absorb(&mut self, rule: &AlertRule, evaluation: Evaluation) {
        match evaluation {
            Evaluation::Firing(condition) => {
                self.current_quantity = condition.current_quantity;
                self.firing_channels = self.firing_channels.union(rule.channels);
                let replace = match &self.firing {
                    None => true,
                    Some((_, kept)) => broader(&condition, kept),
                };
                if replace {
                    self.firing = Some((rule.id, condition));
                }
            }
            Evaluation::Clear { current_quantity } => {
                self.current_quantity = current_quantity;
                self.clear_channels = self.clear_channels.union(rule.channels);
            }
            Evaluation::NotApplicable => {}
        }
    }
}

fn broader(candidate: &Condition, kept: &Condition) -> bool {
    match candidate.kind {
        AlertKind::Overstock => candidate.threshold_quantity < kept.threshold_quantity,
        _ => candidate.threshold_quantity > kept.threshold_quantity,
    }
}

pub struct AlertEngine<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    policy: ReactivationPolicy,
}

impl<S: Store> AlertEngine<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        policy: ReactivationPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            dispatcher,
            policy,
        }
    }

    pub fn policy(&self) -> ReactivationPolicy {
        self.policy
    }

    /// Run one full evaluation pass (manual trigger entry point).
    pub async fn run_once(&self) -> ServiceResult<EvaluationSummary> {
        self.run_pass(|| false).await
    }

    /// Run one pass, checking `should_stop` between rules and between
    /// lineages.
    ///
    /// A failing rule is logged and counted; the pass continues without it,
    /// and no alert of its kind is resolved in this pass. A stop requested
    /// while rules are being evaluated ends the pass before anything is
    /// written. Only failing to list the rules or to commit fails the pass.
    #[instrument(skip_all)]
    pub async fn run_pass<F>(&self, should_stop: F) -> ServiceResult<EvaluationSummary>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let rules = {
            let mut tx = self.store.begin().await?;
            tx.alert_rules(true).await?
        };

        let mut summary = EvaluationSummary::default();
        let mut verdicts: BTreeMap<Lineage, Verdict> = BTreeMap::new();
        let mut unresolvable: HashSet<AlertKind> = HashSet::new();
        for rule in &rules {
            if should_stop() {
                info!(
                    rules_evaluated = summary.rules_evaluated,
                    "stop requested; ending pass before applying"
                );
                return Ok(summary);
            }
            match self.evaluate_rule(rule).await {
                Ok(evaluations) => {
                    summary.rules_evaluated += 1;
                    for (lineage, evaluation) in evaluations {
                        verdicts
                            .entry(lineage)
                            .or_insert_with(Verdict::new)
                            .absorb(rule, evaluation);
                    }
                }
                Err(e) => {
                    summary.rules_failed += 1;
                    unresolvable.insert(rule.kind);
                    warn!(rule_id = %rule.id, rule = %rule.name, error = %e, "rule evaluation failed");
                }
            }
        }

        let notifications = self
            .apply(verdicts, &unresolvable, &should_stop, &mut summary)
            .await?;
        dispatch_all(self.dispatcher.as_ref(), notifications).await;

        if summary.changes() > 0 || summary.rules_failed > 0 || summary.alerts_failed > 0 {
            info!(
                created = summary.created,
                updated = summary.updated,
                resolved = summary.resolved,
                rules_failed = summary.rules_failed,
                alerts_failed = summary.alerts_failed,
                "stock alerts processed"
            );
        } else {
            debug!(rules_evaluated = summary.rules_evaluated, "no alert changes");
        }
        Ok(summary)
    }

    /// Evaluate one rule against every position in its scope.
    async fn evaluate_rule(&self, rule: &AlertRule) -> ServiceResult<Vec<(Lineage, Evaluation)>> {
        let mut evaluations = Vec::new();
        if rule.kind == AlertKind::ExpiryWarning {
            return Ok(evaluations);
        }

        let mut tx = self.store.begin().await?;
        let products = match (rule.product_id, rule.category_id) {
            (Some(product_id), _) => Some(vec![product_id]),
            (None, Some(category_id)) => Some(tx.products_in_category(category_id).await?),
            (None, None) => None,
        };
        let records = tx
            .inventory_records(products.as_deref(), rule.location_id)
            .await?;

        let mut profiles: HashMap<ProductId, Option<ProductProfile>> = HashMap::new();
        for record in records {
            let product_id = record.product_id();
            if !profiles.contains_key(&product_id) {
                let profile = tx.product(product_id).await?;
                profiles.insert(product_id, profile);
            }
            let Some(profile) = profiles.get(&product_id).and_then(Option::as_ref) else {
                debug!(%product_id, "no product profile; position skipped");
                continue;
            };
            let evaluation = evaluate(rule, profile, &record)?;
            if evaluation != Evaluation::NotApplicable {
                evaluations.push(((product_id, record.location_id(), rule.kind), evaluation));
            }
        }
        Ok(evaluations)
    }

    /// Apply merged verdicts in one unit of work; returns the notifications to
    /// send once it has committed.
    async fn apply<F>(
        &self,
        verdicts: BTreeMap<Lineage, Verdict>,
        unresolvable: &HashSet<AlertKind>,
        should_stop: &F,
        summary: &mut EvaluationSummary,
    ) -> ServiceResult<Vec<AlertNotification>>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let mut notifications = Vec::new();
        if verdicts.is_empty() {
            return Ok(notifications);
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        for ((product_id, location_id, kind), verdict) in verdicts {
            if should_stop() {
                info!("stop requested; committing alerts applied so far");
                break;
            }
            let (rule_id, evaluation, channels) = match verdict.firing {
                Some((rule_id, condition)) => (
                    Some(rule_id),
                    Evaluation::Firing(condition),
                    verdict.firing_channels,
                ),
                None if unresolvable.contains(&kind) => continue,
                None => (
                    None,
                    Evaluation::Clear {
                        current_quantity: verdict.current_quantity,
                    },
                    verdict.clear_channels,
                ),
            };

            let latest = match tx.latest_alert(product_id, location_id, kind).await {
                Ok(latest) => latest,
                Err(e) => {
                    summary.alerts_failed += 1;
                    warn!(%product_id, %location_id, %kind, error = %e, "alert lookup failed");
                    continue;
                }
            };
            let action = decide(latest.as_ref(), evaluation, self.policy);

            let (alert, lifecycle) = match (action, latest, rule_id) {
                (AlertAction::Create(condition), _, Some(rule_id)) => {
                    let alert = StockAlert::open(rule_id, product_id, location_id, &condition, now);
                    (alert, AlertLifecycle::Created)
                }
                (AlertAction::Update(condition), Some(mut alert), Some(rule_id)) => {
                    alert.refresh(rule_id, &condition, now);
                    (alert, AlertLifecycle::Updated)
                }
                (AlertAction::Reactivate(condition), Some(mut alert), Some(rule_id)) => {
                    alert.reactivate(rule_id, &condition, now);
                    (alert, AlertLifecycle::Updated)
                }
                (AlertAction::Resolve { current_quantity }, Some(mut alert), _) => {
                    alert.auto_resolve(current_quantity, now);
                    (alert, AlertLifecycle::Resolved)
                }
                _ => continue,
            };

            if let Err(e) = tx.save_alert(&alert).await {
                summary.alerts_failed += 1;
                warn!(alert_id = %alert.id(), error = %e, "alert write failed");
                continue;
            }
            match lifecycle {
                AlertLifecycle::Created => summary.created += 1,
                AlertLifecycle::Updated => summary.updated += 1,
                AlertLifecycle::Resolved => summary.resolved += 1,
            }
            debug!(alert_id = %alert.id(), ?lifecycle, kind = %alert.kind, "alert changed");
            if channels.dashboard {
                notifications.push(AlertNotification::from_alert(
                    &alert, lifecycle, channels, now,
                ));
            }
        }

        tx.commit().await?;
        Ok(notifications)
    }
}
