use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// An event that can travel over an [`EventBus`].
///
/// The kind set is closed: subscriptions are keyed by `Kind`, and names
/// that do not parse into a `Kind` are rejected.
pub trait BusEvent {
    type Kind: Copy + Ord + fmt::Debug + FromStr;

    fn kind(&self) -> Self::Kind;
}

pub type Handler<E> = Rc<dyn Fn(&E)>;

/// Minimal publish/subscribe hub.
///
/// Handlers run in registration order. There is no unsubscribe: a handler
/// lives as long as the bus.
pub struct EventBus<E: BusEvent> {
    handlers: BTreeMap<E::Kind, Vec<Handler<E>>>,
    published: u64,
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
            published: 0,
        }
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: E::Kind, handler: impl Fn(&E) + 'static) {
        self.handlers.entry(kind).or_default().push(Rc::new(handler));
    }

    /// Subscribes by event name. Unknown names are ignored and `false` is
    /// returned; nothing is registered.
    pub fn subscribe_named(&mut self, name: &str, handler: impl Fn(&E) + 'static) -> bool {
        match name.parse::<E::Kind>() {
            Ok(kind) => {
                self.subscribe(kind, handler);
                true
            }
            Err(_) => false,
        }
    }

    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Snapshot of the handlers for `kind`, in registration order.
    ///
    /// Callers holding the bus behind a `RefCell` take this snapshot, drop
    /// the borrow, then call [`dispatch`] so handlers may subscribe or
    /// publish re-entrantly.
    pub fn handlers_for(&self, kind: E::Kind) -> Vec<Handler<E>> {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }

    pub fn publish(&mut self, event: &E) {
        let handlers = self.handlers_for(event.kind());
        self.published += 1;
        dispatch(&handlers, event);
    }

    /// Records a publish performed through [`dispatch`].
    pub fn note_published(&mut self) {
        self.published += 1;
    }

    pub fn published_count(&self) -> u64 {
        self.published
    }
}

pub fn dispatch<E>(handlers: &[Handler<E>], event: &E) {
    for handler in handlers {
        handler(event);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::str::FromStr;

    use super::{BusEvent, EventBus};

    #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
    enum Kind {
        Ping,
        Pong,
    }

    impl FromStr for Kind {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "ping" => Ok(Kind::Ping),
                "pong" => Ok(Kind::Pong),
                _ => Err(()),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Msg(Kind, u32);

    impl BusEvent for Msg {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            self.0
        }
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut bus = EventBus::<Msg>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let log = log.clone();
            bus.subscribe(Kind::Ping, move |m: &Msg| log.borrow_mut().push((tag, m.1)));
        }

        bus.publish(&Msg(Kind::Ping, 7));
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7), ("c", 7)]);
        assert_eq!(bus.published_count(), 1);
    }

    #[test]
    fn publish_only_reaches_matching_kind() {
        let mut bus = EventBus::<Msg>::new();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        bus.subscribe(Kind::Pong, move |_| *h.borrow_mut() += 1);

        bus.publish(&Msg(Kind::Ping, 1));
        assert_eq!(*hits.borrow(), 0);
        bus.publish(&Msg(Kind::Pong, 1));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn unknown_names_are_rejected_silently() {
        let mut bus = EventBus::<Msg>::new();
        assert!(!bus.subscribe_named("exploded", |_| {}));
        assert!(bus.subscribe_named("pong", |_| {}));
        assert_eq!(bus.handler_count(Kind::Pong), 1);
        assert_eq!(bus.handler_count(Kind::Ping), 0);
    }
}
