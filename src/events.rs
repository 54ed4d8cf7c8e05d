//! Scope events - label updates, announcements and threshold listeners
//!
//! The render core does not own any display. It emits `ScopeEvent`s to
//! whoever subscribed, and accepts threshold events for the sessions that
//! registered as listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use crate::error::ScopeError;
use crate::session::Session;

/// Sample rate the time label is expressed against
pub const LABEL_SAMPLE_RATE: f32 = 44_100.0;

/// Events published by a render session
#[derive(Clone, Debug, PartialEq)]
pub enum ScopeEvent {
    /// Time shown by the horizontal window and amplitude per division
    Labels {
        milliseconds: String,
        millivolts: String,
    },
    /// Trigger view entered (`true`) or left (`false`)
    TriggerMode(bool),
    /// Where the millivolt label belongs, in view pixels from the top
    MillivoltLabelPosition(f32),
}

/// Milliseconds-per-window label for `samples` shown samples
pub fn milliseconds_label(samples: usize) -> String {
    let ms = samples as f32 / LABEL_SAMPLE_RATE * 1000.0 / 3.0;
    format!("{:.1} ms", ms)
}

/// Millivolts-per-division label for a vertical window (or threshold)
pub fn millivolts_label(vertical: f32) -> String {
    let per_division = vertical / 4.0 / 24.5 / 1000.0;
    format!("{:.2} mV", per_division)
}

/// Identifier returned when registering a threshold listener
pub type ListenerId = u64;

/// Fan-out of scope events plus the threshold listener registry
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<ScopeEvent>>>,
    listeners: Mutex<Vec<(ListenerId, Session)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Receiver<ScopeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Send an event to all live subscribers
    pub fn emit(&self, event: ScopeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Route threshold events to `session` until unregistered
    pub fn register_threshold_listener(&self, session: Session) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, session));
        log::debug!("Threshold listener {} registered", id);
        id
    }

    pub fn unregister_threshold_listener(&self, id: ListenerId) -> Result<(), ScopeError> {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        if listeners.len() == before {
            return Err(ScopeError::ListenerNotRegistered);
        }
        log::debug!("Threshold listener {} unregistered", id);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver a threshold event to every registered session
    pub fn publish_threshold_delta(&self, delta_pixels: f32) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, session) in listeners.iter() {
            session.adjust_threshold(delta_pixels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ScopeWindow;

    #[test]
    fn test_label_formats() {
        assert_eq!(milliseconds_label(4000), "30.2 ms");
        assert_eq!(milliseconds_label(44_100), "333.3 ms");
        assert_eq!(millivolts_label(10_000.0), "0.10 mV");
        assert_eq!(millivolts_label(98_300.0), "1.00 mV");
    }

    #[test]
    fn test_emit_reaches_subscribers() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        bus.emit(ScopeEvent::TriggerMode(true));
        assert_eq!(rx.try_recv().unwrap(), ScopeEvent::TriggerMode(true));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        drop(bus.subscribe());
        let rx = bus.subscribe();
        bus.emit(ScopeEvent::TriggerMode(false));
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_threshold_listener_lifecycle() {
        let bus = EventBus::new();
        let session = Session::new(ScopeWindow::default());
        session.set_view_size(100.0, 600.0);
        session.activate_trigger();

        let id = bus.register_threshold_listener(session.clone());
        bus.publish_threshold_delta(100.0);
        assert!((session.trigger().pixel_height() - 200.0).abs() < 1e-4);

        bus.unregister_threshold_listener(id).unwrap();
        assert!(matches!(
            bus.unregister_threshold_listener(id),
            Err(ScopeError::ListenerNotRegistered)
        ));

        bus.publish_threshold_delta(0.0);
        assert!((session.trigger().pixel_height() - 200.0).abs() < 1e-4);
    }
}
