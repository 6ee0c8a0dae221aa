//! Alert rule management and operator actions on alerts.

use std::sync::Arc;

use tracing::{info, instrument};

use replenish_alerts::{
    AlertId, AlertRule, AlertRuleId, AlertStats, NewAlertRule, RuleUpdate, StockAlert,
};
use replenish_core::{Actor, Clock, DomainError, DomainResult, UserId};

use crate::error::ServiceResult;
use crate::store::{Store, UnitOfWork};

pub struct AlertService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> AlertService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, input, actor), fields(kind = %input.kind))]
    pub async fn create_rule(&self, input: NewAlertRule, actor: &Actor) -> ServiceResult<AlertRule> {
        let rule = AlertRule::create(input, actor, self.clock.now())?;
        let mut tx = self.store.begin().await?;
        tx.save_alert_rule(&rule).await?;
        tx.commit().await?;
        info!(rule_id = %rule.id, name = %rule.name, "alert rule created");
        Ok(rule)
    }

    #[instrument(skip(self, update, actor))]
    pub async fn update_rule(
        &self,
        id: AlertRuleId,
        update: RuleUpdate,
        actor: &Actor,
    ) -> ServiceResult<AlertRule> {
        self.mutate_rule(id, |rule, now| rule.update(update, actor, now))
            .await
    }

    #[instrument(skip(self, actor))]
    pub async fn set_rule_active(
        &self,
        id: AlertRuleId,
        active: bool,
        actor: &Actor,
    ) -> ServiceResult<AlertRule> {
        self.mutate_rule(id, |rule, now| rule.set_active(active, actor, now))
            .await
    }

    pub async fn rule(&self, id: AlertRuleId) -> ServiceResult<AlertRule> {
        let mut tx = self.store.begin().await?;
        tx.alert_rule(id)
            .await?
            .ok_or_else(|| DomainError::not_found("alert rule", id).into())
    }

    pub async fn rules(&self) -> ServiceResult<Vec<AlertRule>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.alert_rules(false).await?)
    }

    pub async fn alert(&self, id: AlertId) -> ServiceResult<StockAlert> {
        let mut tx = self.store.begin().await?;
        tx.alert(id)
            .await?
            .ok_or_else(|| DomainError::not_found("stock alert", id).into())
    }

    /// Every alert, open ones first, newest first within each group.
    pub async fn alerts(&self) -> ServiceResult<Vec<StockAlert>> {
        let mut tx = self.store.begin().await?;
        let mut alerts = tx.alerts().await?;
        alerts.sort_by(|a, b| {
            b.status
                .is_open()
                .cmp(&a.status.is_open())
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(alerts)
    }

    #[instrument(skip(self, actor))]
    pub async fn acknowledge(&self, id: AlertId, actor: &Actor) -> ServiceResult<StockAlert> {
        self.mutate_alert(id, actor.user_id, StockAlert::acknowledge)
            .await
    }

    #[instrument(skip(self, actor))]
    pub async fn resolve(&self, id: AlertId, actor: &Actor) -> ServiceResult<StockAlert> {
        self.mutate_alert(id, actor.user_id, StockAlert::resolve).await
    }

    #[instrument(skip(self, actor))]
    pub async fn dismiss(&self, id: AlertId, actor: &Actor) -> ServiceResult<StockAlert> {
        self.mutate_alert(id, actor.user_id, StockAlert::dismiss).await
    }

    pub async fn stats(&self) -> ServiceResult<AlertStats> {
        let mut tx = self.store.begin().await?;
        let alerts = tx.alerts().await?;
        Ok(AlertStats::tally(&alerts))
    }

    async fn mutate_rule<F>(&self, id: AlertRuleId, f: F) -> ServiceResult<AlertRule>
    where
        F: FnOnce(&mut AlertRule, chrono::DateTime<chrono::Utc>) -> DomainResult<()> + Send,
    {
        let mut tx = self.store.begin().await?;
        let mut rule = tx
            .alert_rule(id)
            .await?
            .ok_or_else(|| DomainError::not_found("alert rule", id))?;
        f(&mut rule, self.clock.now())?;
        tx.save_alert_rule(&rule).await?;
        tx.commit().await?;
        Ok(rule)
    }

    async fn mutate_alert<F>(&self, id: AlertId, user: UserId, f: F) -> ServiceResult<StockAlert>
    where
        F: FnOnce(&mut StockAlert, UserId, chrono::DateTime<chrono::Utc>) -> DomainResult<()>
            + Send,
    {
        let mut tx = self.store.begin().await?;
        let mut alert = tx
            .alert(id)
            .await?
            .ok_or_else(|| DomainError::not_found("stock alert", id))?;
        f(&mut alert, user, self.clock.now())?;
        tx.save_alert(&alert).await?;
        tx.commit().await?;
        info!(alert_id = %alert.id, status = %alert.status, %user, "alert handled");
        Ok(alert)
    }
}
