//! Event coordination between views of one report section.

mod bus;
mod signal;

pub use bus::{EventBus, PublishOutcome, Subscription};
pub use signal::{SectionState, Signal, SignalKind};
