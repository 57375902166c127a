//! Daily wall-clock triggers for the Herald bot.
//!
//! Each [`Trigger`] binds a UTC time of day to an [`Action`]. The scheduler
//! runs one task per trigger that sleeps until the next occurrence, fires,
//! and re-arms from the wall clock.

mod delay;
mod error;
mod scheduler;

pub use delay::delay_until;
pub use error::{Error, Result};
pub use herald_core::action::Action;
pub use scheduler::{ActionHandler, SchedulerHandle, Trigger, TriggerScheduler};
