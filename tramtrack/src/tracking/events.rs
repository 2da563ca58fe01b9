//! Observer registry for channel events.
//!
//! Observers are plain closures invoked synchronously, in subscription order,
//! from whichever task emits. Subscribing returns a tagged [`Subscription`]
//! that is the only way to remove the observer again.

/// Which event stream a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Update,
    ConnectionChange,
    Error,
}

/// Token returned by a subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub kind: EventKind,
    pub id: u64,
}

/// Payload of a connection-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionChange {
    /// True when the channel just became connected.
    pub connected: bool,
    /// Transport open and phase connected.
    pub healthy: bool,
}

type Observer<E> = Box<dyn FnMut(&E) + Send>;

/// Ordered set of observers for one event type.
pub struct EventRegistry<E> {
    next_id: u64,
    observers: Vec<(u64, Observer<E>)>,
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self {
            next_id: 1,
            observers: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<E> EventRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and return its id.
    pub fn subscribe<F>(&mut self, observer: F) -> u64
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: u64) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Deliver `event` to every observer in subscription order.
    pub fn emit(&mut self, event: &E) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Drop every observer.
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = EventRegistry::<u32>::new();

        let a = seen.clone();
        registry.subscribe(move |v| a.lock().unwrap().push(("a", *v)));
        let b = seen.clone();
        registry.subscribe(move |v| b.lock().unwrap().push(("b", *v)));

        registry.emit(&1);
        registry.emit(&2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut registry = EventRegistry::<()>::new();
        let c = count.clone();
        let id = registry.subscribe(move |_| *c.lock().unwrap() += 1);

        registry.emit(&());
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&());

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = EventRegistry::<()>::new();
        let first = registry.subscribe(|_| {});
        let second = registry.subscribe(|_| {});
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert!(registry.is_empty());
    }
}
