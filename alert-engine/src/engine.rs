use std::sync::Arc;

use alert_dampening::{
    ConditionEval, Dampening, DampeningKey, DampeningRegistry, DampeningState, Outcome,
    TriggerMode,
};
use alert_partitioning::{
    MemberId, PartitionChange, PartitionListener, TriggerChange, TriggerOperation,
};
use async_trait::async_trait;

use crate::definitions::DefinitionsStore;
use crate::error::Result;
use crate::metrics_consts::{
    ALERTS_SENT_COUNTER, ALERT_SINK_FAILURES_COUNTER, DEFINITION_LOAD_FAILURES_COUNTER,
    LOADED_DAMPENINGS_GAUGE,
};
use crate::sink::AlertSink;

/// Per-node engine: keeps the dampenings of the triggers this member owns
/// and turns condition evaluations into fire decisions.
///
/// Registered with the partition manager as the listener for its member id.
pub struct AlertsEngine {
    member: MemberId,
    definitions: Arc<dyn DefinitionsStore>,
    sink: Arc<dyn AlertSink>,
    dampenings: DampeningRegistry,
}

impl AlertsEngine {
    pub fn new(
        member: MemberId,
        definitions: Arc<dyn DefinitionsStore>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            member,
            definitions,
            sink,
            dampenings: DampeningRegistry::new(),
        }
    }

    pub fn member(&self) -> MemberId {
        self.member
    }

    /// Handle one evaluation cycle from the rule evaluator, timed with the
    /// current wall clock.
    pub async fn on_condition_evals(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
        evals: &[ConditionEval],
    ) -> anyhow::Result<Outcome> {
        let now = chrono::Utc::now().timestamp_millis();
        self.on_condition_evals_at(tenant_id, trigger_id, mode, evals, now)
            .await
    }

    /// Same as [`on_condition_evals`](Self::on_condition_evals) with an
    /// explicit wall-clock time in milliseconds.
    pub async fn on_condition_evals_at(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
        evals: &[ConditionEval],
        now: i64,
    ) -> anyhow::Result<Outcome> {
        let key = DampeningKey::new(tenant_id, trigger_id, mode);
        let outcome = self.dampenings.perform(&key, evals, now);

        match &outcome {
            Outcome::Satisfied(satisfying_evals) => {
                let result = self
                    .sink
                    .on_dampening_satisfied(tenant_id, trigger_id, mode, satisfying_evals)
                    .await;
                match result {
                    Ok(()) => {
                        metrics::counter!(ALERTS_SENT_COUNTER, "mode" => mode.as_str())
                            .increment(1);
                    }
                    Err(e) => {
                        metrics::counter!(ALERT_SINK_FAILURES_COUNTER).increment(1);
                        tracing::error!(member = %self.member, %key, error = ?e, "alert sink failed");
                        return Err(e);
                    }
                }
            }
            Outcome::NotLoaded => {
                tracing::debug!(member = %self.member, %key, "trigger not loaded on this member, ignoring evaluations");
            }
            Outcome::Accumulating { .. } => {}
        }

        Ok(outcome)
    }

    /// Loaded dampening keys, sorted.
    pub fn loaded_dampenings(&self) -> Vec<DampeningKey> {
        self.dampenings.keys()
    }

    pub fn dampening_state(&self, key: &DampeningKey) -> Option<DampeningState> {
        self.dampenings.snapshot(key).map(|(_, state)| state)
    }

    /// One-line description of a loaded dampening and its counters.
    pub fn describe(&self, key: &DampeningKey) -> Option<String> {
        self.dampenings
            .snapshot(key)
            .map(|(dampening, state)| dampening.describe(&state))
    }

    /// (Re)load both modes of a trigger with fresh state. Modes without a
    /// configured dampening fire on every true evaluation.
    async fn load_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<()> {
        let mut loaded = Vec::with_capacity(TriggerMode::ALL.len());
        for mode in TriggerMode::ALL {
            let dampening = self
                .definitions
                .get_dampening(tenant_id, trigger_id, mode)
                .await?
                .unwrap_or_else(|| {
                    Dampening::default_for(DampeningKey::new(tenant_id, trigger_id, mode))
                });
            loaded.push(dampening);
        }
        // Both modes are swapped in only once both were read.
        for dampening in loaded {
            self.dampenings.load(dampening);
        }
        Ok(())
    }

    /// Drop both modes of a trigger this member no longer owns. The state is
    /// not carried anywhere; the new owner starts from a fresh run.
    fn unload_trigger(&self, tenant_id: &str, trigger_id: &str) -> usize {
        let unloaded = self.dampenings.unload_trigger(tenant_id, trigger_id);
        for (dampening, state) in &unloaded {
            tracing::debug!(
                member = %self.member,
                key = %dampening.key,
                dampening = %dampening.describe(state),
                "dropping dampening state"
            );
        }
        unloaded.len()
    }

    fn record_loaded(&self) {
        metrics::gauge!(LOADED_DAMPENINGS_GAUGE, "member" => self.member.to_string())
            .set(self.dampenings.len() as f64);
    }
}

#[async_trait]
impl PartitionListener for AlertsEngine {
    async fn on_partition_change(&self, change: &PartitionChange) -> anyhow::Result<()> {
        let mut unloaded = 0;
        for (tenant, triggers) in &change.removed {
            for trigger in triggers {
                unloaded += self.unload_trigger(tenant, trigger);
            }
        }

        let mut failed = 0;
        for (tenant, triggers) in &change.added {
            for trigger in triggers {
                if let Err(e) = self.load_trigger(tenant, trigger).await {
                    failed += 1;
                    metrics::counter!(DEFINITION_LOAD_FAILURES_COUNTER).increment(1);
                    tracing::warn!(member = %self.member, tenant = %tenant, trigger = %trigger, error = %e, "failed to load trigger dampenings");
                }
            }
        }

        self.record_loaded();
        tracing::info!(
            member = %self.member,
            added = change.added_count(),
            removed = change.removed_count(),
            unloaded,
            loaded = self.dampenings.len(),
            "applied partition change"
        );

        if failed > 0 {
            anyhow::bail!(
                "failed to load {failed} of {} added triggers",
                change.added_count()
            );
        }
        Ok(())
    }

    async fn on_trigger_change(&self, change: &TriggerChange) -> anyhow::Result<()> {
        let entry = &change.entry;
        match change.operation {
            TriggerOperation::Add | TriggerOperation::Update => {
                self.load_trigger(&entry.tenant_id, &entry.trigger_id)
                    .await?;
            }
            TriggerOperation::Remove => {
                self.unload_trigger(&entry.tenant_id, &entry.trigger_id);
            }
        }
        self.record_loaded();
        tracing::debug!(member = %self.member, %entry, operation = ?change.operation, "applied trigger change");
        Ok(())
    }
}
