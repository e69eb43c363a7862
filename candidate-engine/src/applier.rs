//! Candidate validator: tries one extraction per call and reports the
//! outcome on the notification bus.

use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::debug;

use crate::candidate::{ApplicationPayload, ApplicationResult, Candidate};
use crate::observer::{Notification, NotificationBus, SharedObserver};

pub const INVALID_CANDIDATE_REASON: &str = "invalid extract function candidate";

/// Host-side refactoring engine that performs "extract function" over a
/// byte range `[offset_start, offset_end)`.
///
/// Implementations own the source state. A successful call may mutate it;
/// callers that only test extractability are expected to roll back inside
/// the implementation.
pub trait CodeTransformationService {
    type Error: Display;

    fn extract(
        &mut self,
        offset_start: usize,
        offset_end: usize,
        new_function_name: &str,
    ) -> Result<(), Self::Error>;
}

impl<S: CodeTransformationService + ?Sized> CodeTransformationService for &mut S {
    type Error = S::Error;

    fn extract(&mut self, offset_start: usize, offset_end: usize, new_function_name: &str) -> Result<(), Self::Error> {
        (**self).extract(offset_start, offset_end, new_function_name)
    }
}

/// Applies candidates and publishes exactly one [`ApplicationPayload`] per
/// [`CandidateApplier::apply`] call.
#[derive(Debug, Default)]
pub struct CandidateApplier {
    bus: NotificationBus,
}

impl CandidateApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observers(observers: impl IntoIterator<Item = SharedObserver>) -> Self {
        let mut applier = Self::new();
        for o in observers {
            applier.subscribe(o);
        }
        applier
    }

    pub fn subscribe(&mut self, observer: SharedObserver) {
        self.bus.subscribe(observer);
    }

    pub fn unsubscribe(&mut self, observer: &SharedObserver) {
        self.bus.unsubscribe(observer);
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// `true` iff the service accepted the extraction. Errors and panics
    /// from the service become FAIL payloads; nothing propagates.
    pub fn apply<S>(&self, candidate: &Candidate, service: &mut S) -> bool
    where
        S: CodeTransformationService + ?Sized,
    {
        let (result, reason) = attempt(candidate, service);
        let ok = result == ApplicationResult::Ok;
        self.bus.publish(&Notification::new(ApplicationPayload {
            result,
            reason,
            candidate: candidate.clone(),
        }));
        ok
    }

    /// Keep only the candidates the service accepts, in input order.
    pub fn filter_extractable<S>(&self, candidates: &[Candidate], service: &mut S) -> Vec<Candidate>
    where
        S: CodeTransformationService + ?Sized,
    {
        candidates
            .iter()
            .filter(|c| self.apply(c, service))
            .cloned()
            .collect()
    }
}

fn attempt<S>(candidate: &Candidate, service: &mut S) -> (ApplicationResult, String)
where
    S: CodeTransformationService + ?Sized,
{
    if !candidate.has_offsets() {
        return (ApplicationResult::Fail, INVALID_CANDIDATE_REASON.to_string());
    }
    // `has_offsets` guarantees both are non-negative.
    let (start, end) = (candidate.offset_start as usize, candidate.offset_end as usize);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        service.extract(start, end, &candidate.function_name)
    }));

    match outcome {
        Ok(Ok(())) => (ApplicationResult::Ok, String::new()),
        Ok(Err(err)) => {
            let reason = err.to_string();
            debug!(start, end, %reason, "extraction rejected");
            (ApplicationResult::Fail, reason)
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            debug!(start, end, %reason, "extraction panicked");
            (ApplicationResult::Fail, reason)
        }
    }
}
