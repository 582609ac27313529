//! Call conversation state machine
//!
//! Elm-style: a pure `transition` maps (state, event) to a new state plus
//! effects, and the runtime performs the effects.

mod context;
mod effect;
pub mod event;
mod extract;
pub mod state;
pub(crate) mod transition;


pub use context::{
    AccountRecord, CallContext, CallMetadata, ContextError, ContextUpdate, CustomerInfo,
    PaymentOption, PaymentPlan, PaymentSelection, Resolution,
};
pub use effect::Effect;
pub use event::Event;
pub use extract::{extract_last_four_digits, mask_account, reference_number};
pub use state::{CallOutcome, CallState, DeclineReason, Phase};
pub use transition::{transition, TransitionError, TransitionResult};
