pub mod engine;

pub use engine::{next_status, transition, QuoteFlow, TransitionOutcome};
