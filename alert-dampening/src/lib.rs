//! Temporal debouncing ("dampening") of condition evaluations.
//!
//! A [`Dampening`] turns a stream of true/false evaluation cycles for one
//! trigger mode into a single fire decision. Its runtime counters live in a
//! separate [`DampeningState`] value owned by whichever node currently
//! evaluates the trigger, so handing a trigger to another node is a move of
//! that value.

pub mod dampening;
pub mod error;
pub mod metrics_consts;
pub mod registry;
pub mod types;

pub use dampening::{Dampening, DampeningState, DampeningType};
pub use error::{Error, Result};
pub use registry::{DampeningRegistry, Outcome};
pub use types::{ConditionEval, DampeningKey, TriggerMode};
