use std::mem;

use dashmap::DashMap;

use crate::dampening::{Dampening, DampeningState};
use crate::metrics_consts::{
    DAMPENING_EVALUATIONS_COUNTER, DAMPENING_NOT_LOADED_COUNTER, DAMPENING_SATISFIED_COUNTER,
};
use crate::types::{ConditionEval, DampeningKey, TriggerMode};

/// What happened to an evaluation cycle handed to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The dampening fired. Its state has already been reset; these are the
    /// evaluations that led to the decision, one group per true cycle.
    Satisfied(Vec<Vec<ConditionEval>>),
    /// The cycle was recorded but the dampening is not satisfied yet.
    Accumulating { num_true_evals: u32, num_evals: u32 },
    /// No dampening is loaded for the key on this node.
    NotLoaded,
}

#[derive(Debug, Clone)]
struct Slot {
    dampening: Dampening,
    state: DampeningState,
}

/// Dampenings loaded on this node, keyed by (tenant, trigger, mode).
///
/// Each key is updated under its shard lock, so concurrent cycles for the
/// same key are serialized while different keys proceed in parallel.
#[derive(Debug, Default)]
pub struct DampeningRegistry {
    slots: DashMap<DampeningKey, Slot>,
}

impl DampeningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dampening with fresh state. Replaces any previous
    /// configuration and state for the same key.
    pub fn load(&self, dampening: Dampening) {
        let key = dampening.key.clone();
        tracing::debug!(%key, dampening = %dampening.describe(&DampeningState::default()), "loading dampening");
        self.slots.insert(
            key,
            Slot {
                dampening,
                state: DampeningState::default(),
            },
        );
    }

    /// Remove a dampening and hand back its configuration and state.
    pub fn take(&self, key: &DampeningKey) -> Option<(Dampening, DampeningState)> {
        self.slots
            .remove(key)
            .map(|(_, slot)| (slot.dampening, slot.state))
    }

    /// Drop every mode of a trigger, handing back what was loaded.
    pub fn unload_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Vec<(Dampening, DampeningState)> {
        TriggerMode::ALL
            .into_iter()
            .filter_map(|mode| self.take(&DampeningKey::new(tenant_id, trigger_id, mode)))
            .collect()
    }

    pub fn snapshot(&self, key: &DampeningKey) -> Option<(Dampening, DampeningState)> {
        self.slots
            .get(key)
            .map(|slot| (slot.dampening.clone(), slot.state.clone()))
    }

    pub fn contains(&self, key: &DampeningKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Loaded keys in sorted order.
    pub fn keys(&self) -> Vec<DampeningKey> {
        let mut keys: Vec<DampeningKey> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run one evaluation cycle for `key` at wall-clock `now` (ms).
    ///
    /// On satisfaction the stored state is reset before returning, so the
    /// next cycle starts a new run.
    pub fn perform(&self, key: &DampeningKey, evals: &[ConditionEval], now: i64) -> Outcome {
        let Some(mut slot) = self.slots.get_mut(key) else {
            metrics::counter!(DAMPENING_NOT_LOADED_COUNTER).increment(1);
            tracing::debug!(%key, "evaluation for dampening not loaded on this node");
            return Outcome::NotLoaded;
        };
        let slot = &mut *slot;

        metrics::counter!(DAMPENING_EVALUATIONS_COUNTER).increment(1);

        let state = mem::take(&mut slot.state);
        let mut next = slot.dampening.perform(state, evals, now);

        if next.satisfied {
            metrics::counter!(
                DAMPENING_SATISFIED_COUNTER,
                "type" => slot.dampening.dampening_type.as_str()
            )
            .increment(1);
            tracing::debug!(%key, dampening = %slot.dampening.describe(&next), "dampening satisfied");
            let satisfying = mem::take(&mut next.satisfying_evals);
            // slot.state is already the default left behind by mem::take.
            return Outcome::Satisfied(satisfying);
        }

        let outcome = Outcome::Accumulating {
            num_true_evals: next.num_true_evals,
            num_evals: next.num_evals,
        };
        slot.state = next;
        outcome
    }
}
