use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ConditionEval, DampeningKey};

/// Temporal semantics of a dampening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DampeningType {
    /// `eval_true_setting` consecutive true evaluations.
    Strict,
    /// `eval_true_setting` true evaluations out of `eval_total_setting`.
    RelaxedCount,
    /// `eval_true_setting` true evaluations within `eval_time_setting` ms.
    RelaxedTime,
    /// True evaluations spanning at least `eval_time_setting` ms.
    StrictTime,
}

impl DampeningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DampeningType::Strict => "STRICT",
            DampeningType::RelaxedCount => "RELAXED_COUNT",
            DampeningType::RelaxedTime => "RELAXED_TIME",
            DampeningType::StrictTime => "STRICT_TIME",
        }
    }
}

impl fmt::Display for DampeningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable dampening configuration for one (tenant, trigger, mode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dampening {
    pub key: DampeningKey,
    pub dampening_type: DampeningType,
    pub eval_true_setting: u32,
    pub eval_total_setting: u32,
    /// Window in milliseconds, used by the time based types.
    pub eval_time_setting: i64,
}

/// Runtime counters of a dampening.
///
/// `satisfied` is a pulse: whoever holds the state must consume
/// `satisfying_evals` right after the cycle that set it and [`reset`] before
/// the next one. STRICT_TIME in particular keeps reporting satisfied
/// otherwise.
///
/// [`reset`]: DampeningState::reset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DampeningState {
    pub num_true_evals: u32,
    pub num_evals: u32,
    /// Wall-clock time (ms) of the first true evaluation of the current run.
    pub true_evals_start_time: Option<i64>,
    pub satisfied: bool,
    /// One entry per true evaluation cycle, in arrival order.
    pub satisfying_evals: Vec<Vec<ConditionEval>>,
}

impl DampeningState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn millis(period: Duration) -> i64 {
    i64::try_from(period.as_millis()).unwrap_or(i64::MAX)
}

impl Dampening {
    pub fn strict(key: DampeningKey, num_consecutive_true: u32) -> Self {
        Self {
            key,
            dampening_type: DampeningType::Strict,
            eval_true_setting: num_consecutive_true,
            eval_total_setting: num_consecutive_true,
            eval_time_setting: 0,
        }
    }

    pub fn relaxed_count(key: DampeningKey, num_true: u32, num_total: u32) -> Self {
        Self {
            key,
            dampening_type: DampeningType::RelaxedCount,
            eval_true_setting: num_true,
            eval_total_setting: num_total,
            eval_time_setting: 0,
        }
    }

    pub fn relaxed_time(key: DampeningKey, num_true: u32, period: Duration) -> Self {
        Self {
            key,
            dampening_type: DampeningType::RelaxedTime,
            eval_true_setting: num_true,
            eval_total_setting: 0,
            eval_time_setting: millis(period),
        }
    }

    pub fn strict_time(key: DampeningKey, period: Duration) -> Self {
        Self {
            key,
            dampening_type: DampeningType::StrictTime,
            eval_true_setting: 0,
            eval_total_setting: 0,
            eval_time_setting: millis(period),
        }
    }

    /// Dampening used when a trigger defines none for a mode: fire on every
    /// true evaluation.
    pub fn default_for(key: DampeningKey) -> Self {
        Self::strict(key, 1)
    }

    /// Reject settings the state machine cannot work with. Definitions
    /// stores call this on load; [`perform`](Self::perform) assumes it
    /// passed.
    pub fn validate(&self) -> Result<()> {
        let key = &self.key;
        match self.dampening_type {
            DampeningType::Strict => {
                if self.eval_true_setting == 0 {
                    return Err(Error::invalid_config(key, "STRICT needs at least one true evaluation"));
                }
            }
            DampeningType::RelaxedCount => {
                if self.eval_true_setting == 0 {
                    return Err(Error::invalid_config(
                        key,
                        "RELAXED_COUNT needs at least one true evaluation",
                    ));
                }
                if self.eval_true_setting > self.eval_total_setting {
                    return Err(Error::invalid_config(
                        key,
                        format!(
                            "RELAXED_COUNT true setting {} exceeds total setting {}",
                            self.eval_true_setting, self.eval_total_setting
                        ),
                    ));
                }
            }
            DampeningType::RelaxedTime => {
                if self.eval_true_setting == 0 {
                    return Err(Error::invalid_config(
                        key,
                        "RELAXED_TIME needs at least one true evaluation",
                    ));
                }
                if self.eval_time_setting <= 0 {
                    return Err(Error::invalid_config(key, "RELAXED_TIME needs a positive period"));
                }
            }
            DampeningType::StrictTime => {
                if self.eval_time_setting <= 0 {
                    return Err(Error::invalid_config(key, "STRICT_TIME needs a positive period"));
                }
            }
        }
        Ok(())
    }

    /// Advance the state by one evaluation cycle taken at wall-clock `now`
    /// (ms) and return the next state.
    ///
    /// A cycle is true only if it holds at least one evaluation and all of
    /// them matched.
    pub fn perform(
        &self,
        state: DampeningState,
        evals: &[ConditionEval],
        now: i64,
    ) -> DampeningState {
        let true_eval = !evals.is_empty() && evals.iter().all(|eval| eval.matched);
        let mut next = state;

        // An open RELAXED_TIME run that outlived its window is abandoned
        // before this cycle is counted.
        if self.dampening_type == DampeningType::RelaxedTime {
            if let Some(start) = next.true_evals_start_time {
                if now - start > self.eval_time_setting {
                    next.reset();
                }
            }
        }

        next.num_evals = next.num_evals.saturating_add(1);

        if true_eval {
            next.num_true_evals = next.num_true_evals.saturating_add(1);
            next.satisfying_evals.push(evals.to_vec());

            match self.dampening_type {
                DampeningType::Strict | DampeningType::RelaxedCount => {
                    if next.num_true_evals == self.eval_true_setting {
                        next.satisfied = true;
                    }
                }
                DampeningType::RelaxedTime => {
                    let start = *next.true_evals_start_time.get_or_insert(now);
                    if next.num_true_evals == self.eval_true_setting
                        && now - start < self.eval_time_setting
                    {
                        next.satisfied = true;
                    }
                }
                DampeningType::StrictTime => match next.true_evals_start_time {
                    None => next.true_evals_start_time = Some(now),
                    Some(start) => {
                        if now - start >= self.eval_time_setting {
                            next.satisfied = true;
                        }
                    }
                },
            }
        } else {
            match self.dampening_type {
                DampeningType::Strict => next.reset(),
                DampeningType::RelaxedCount => {
                    let needed = self.eval_true_setting.saturating_sub(next.num_true_evals);
                    let remaining = self.eval_total_setting.saturating_sub(next.num_evals);
                    if remaining < needed {
                        next.reset();
                    }
                }
                // Only expiry or reaching the target moves these.
                DampeningType::RelaxedTime | DampeningType::StrictTime => {}
            }
        }

        next
    }

    /// Short description of the configuration and counters, for logs.
    pub fn describe(&self, state: &DampeningState) -> String {
        let settings = match self.dampening_type {
            DampeningType::Strict => format!("{}", self.eval_true_setting),
            DampeningType::RelaxedCount => {
                format!("{}/{}", self.eval_true_setting, self.eval_total_setting)
            }
            DampeningType::RelaxedTime => {
                format!("{} in {}ms", self.eval_true_setting, self.eval_time_setting)
            }
            DampeningType::StrictTime => format!("{}ms", self.eval_time_setting),
        };
        format!(
            "[{} {}({})] true={} evals={} start={:?} satisfied={}",
            self.key,
            self.dampening_type,
            settings,
            state.num_true_evals,
            state.num_evals,
            state.true_evals_start_time,
            state.satisfied
        )
    }
}
