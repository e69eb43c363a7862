//! Synchronous notification bus and the stock observers.
//!
//! The bus is a plain subscriber list with a publish loop. Delivery is
//! in-line, in subscription order. Subscribers are `Rc<RefCell<_>>` so the
//! caller keeps a handle to read an observer back after a run; the bus is
//! therefore single-threaded (`!Send`), which matches the sequential pipeline.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::candidate::{ApplicationPayload, ApplicationResult};
use crate::suggestion::Suggestion;

/// Untyped envelope. The bus never looks inside.
pub struct Notification {
    payload: Box<dyn Any>,
}

impl Notification {
    pub fn new<P: Any>(payload: P) -> Self {
        Self {
            payload: Box::new(payload),
        }
    }

    /// Typed view of the payload, `None` if it is something else.
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notification").finish_non_exhaustive()
    }
}

pub trait Observer {
    fn update(&mut self, notification: &Notification);
}

pub type SharedObserver = Rc<RefCell<dyn Observer>>;

#[derive(Default)]
pub struct NotificationBus {
    subscribers: Vec<SharedObserver>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`. Subscribing the same instance twice is a no-op.
    pub fn subscribe(&mut self, observer: SharedObserver) {
        if self.position(&observer).is_none() {
            self.subscribers.push(observer);
        }
    }

    pub fn unsubscribe(&mut self, observer: &SharedObserver) {
        if let Some(idx) = self.position(observer) {
            self.subscribers.remove(idx);
        }
    }

    /// Deliver to every subscriber, in subscription order.
    ///
    /// An observer that is already borrowed (it published from inside its own
    /// `update`) is skipped with a warning instead of panicking.
    pub fn publish(&self, notification: &Notification) {
        for subscriber in &self.subscribers {
            match subscriber.try_borrow_mut() {
                Ok(mut observer) => observer.update(notification),
                Err(_) => warn!("observer is busy, notification not delivered"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    fn position(&self, observer: &SharedObserver) -> Option<usize> {
        self.subscribers
            .iter()
            .position(|s| std::ptr::addr_eq(Rc::as_ptr(s), Rc::as_ptr(observer)))
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Collects every [`ApplicationPayload`] it sees, in arrival order.
///
/// Used as the per-shot aggregator and as a failure auditor.
#[derive(Debug, Default)]
pub struct ApplicationRecorder {
    payloads: Vec<ApplicationPayload>,
}

impl ApplicationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for bus registration.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn payloads(&self) -> &[ApplicationPayload] {
        &self.payloads
    }

    pub fn into_payloads(self) -> Vec<ApplicationPayload> {
        self.payloads
    }

    pub fn payloads_with(&self, result: ApplicationResult) -> Vec<&ApplicationPayload> {
        self.payloads.iter().filter(|p| p.result == result).collect()
    }

    /// Payloads grouped by originating suggestion, suggestions in first-seen
    /// order.
    pub fn by_suggestion(&self) -> Vec<(Arc<Suggestion>, Vec<&ApplicationPayload>)> {
        let mut index: HashMap<&Suggestion, usize> = HashMap::new();
        let mut groups: Vec<(Arc<Suggestion>, Vec<&ApplicationPayload>)> = Vec::new();
        for p in &self.payloads {
            let suggestion = &p.candidate.suggestion;
            match index.get(suggestion.as_ref()) {
                Some(&i) => groups[i].1.push(p),
                None => {
                    index.insert(suggestion.as_ref(), groups.len());
                    groups.push((Arc::clone(suggestion), vec![p]));
                }
            }
        }
        groups
    }

    pub fn suggestions_seen(&self) -> Vec<Arc<Suggestion>> {
        self.by_suggestion().into_iter().map(|(s, _)| s).collect()
    }
}

impl Observer for ApplicationRecorder {
    fn update(&mut self, notification: &Notification) {
        if let Some(payload) = notification.payload::<ApplicationPayload>() {
            self.payloads.push(payload.clone());
        }
    }
}

/// Logs every application outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn update(&mut self, notification: &Notification) {
        let Some(p) = notification.payload::<ApplicationPayload>() else {
            debug!("non-application notification ignored");
            return;
        };
        let c = &p.candidate;
        match p.result {
            ApplicationResult::Ok => debug!(
                function_name = %c.function_name,
                line_start = c.line_start,
                line_end = c.line_end,
                candidate_type = ?c.candidate_type,
                "candidate extractable"
            ),
            ApplicationResult::Fail => info!(
                function_name = %c.function_name,
                line_start = c.line_start,
                line_end = c.line_end,
                candidate_type = ?c.candidate_type,
                reason = %p.reason,
                "candidate rejected"
            ),
        }
    }
}
