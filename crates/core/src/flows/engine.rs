use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::quote::{QuoteAction, QuoteStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub action: QuoteAction,
}

/// `draft -> sent -> {accepted, rejected}`. Accepted and rejected are terminal.
pub fn next_status(current: QuoteStatus, action: QuoteAction) -> Option<QuoteStatus> {
    use QuoteAction::{Accept, Reject, Send};
    use QuoteStatus::{Accepted, Draft, Rejected, Sent};

    match (current, action) {
        (Draft, Send) => Some(Sent),
        (Sent, Accept) => Some(Accepted),
        (Sent, Reject) => Some(Rejected),
        _ => None,
    }
}

pub fn transition(current: QuoteStatus, action: QuoteAction) -> Result<QuoteStatus, DomainError> {
    next_status(current, action)
        .ok_or(DomainError::InvalidTransition { from: current, action })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct QuoteFlow;

impl QuoteFlow {
    pub fn initial_state(&self) -> QuoteStatus {
        QuoteStatus::Draft
    }

    pub fn apply(
        &self,
        current: QuoteStatus,
        action: QuoteAction,
    ) -> Result<TransitionOutcome, DomainError> {
        let to = transition(current, action)?;
        Ok(TransitionOutcome { from: current, to, action })
    }

    pub fn apply_with_audit<S>(
        &self,
        current: QuoteStatus,
        action: QuoteAction,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, DomainError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, action);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "quote.transition_applied",
                        AuditCategory::Lifecycle,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("action", outcome.action.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "quote.transition_rejected",
                        AuditCategory::Lifecycle,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("from", current.as_str())
                    .with_metadata("action", action.to_string())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}
