//! Event bus port — publish/subscribe for channel events.

use hwctl_domain::event::Event;

/// Publishes events to interested subscribers.
///
/// Publishing is synchronous and infallible: channel operations never wait
/// on, or fail because of, their observers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event);
}

impl<T: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) {
        (**self).publish(event);
    }
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: Event) {}
}
