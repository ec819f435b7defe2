use crate::{error::Result, event::Event};

/// A subscriber callback for one layer's event stream.
///
/// Handlers borrow the event for the duration of the call; they clone it if
/// they need to retain it. Returning an error aborts the broadcast and the
/// run that produced it.
pub type EventHandler = Box<dyn FnMut(&Event) -> Result<()>>;

/// An ordered fan-out of events to subscriber handlers.
///
/// Handlers are invoked in registration order. The first handler to return an
/// error aborts the broadcast and the error propagates to the layer that
/// initiated it. Handlers are added but never removed; a reactor is torn down
/// with its owning layer.
#[derive(Default)]
pub struct EventReactor {
    handlers: Vec<EventHandler>,
}

impl EventReactor {
    /// Creates a reactor with no subscribers.
    #[inline]
    pub fn new() -> Self {
        EventReactor::default()
    }

    /// Appends a handler to the broadcast order.
    #[inline]
    pub fn add(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    /// The number of registered handlers.
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Broadcasts one event to every handler in registration order.
    pub fn broadcast(&mut self, event: &Event) -> Result<()> {
        for handler in &mut self.handlers {
            handler(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{cursor::Cursor, error::Error};

    fn event() -> Event {
        Event::eof(Cursor::new("t.c".into()))
    }

    #[test]
    fn broadcast_preserves_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut reactor = EventReactor::new();
        for tag in 0..3 {
            let order = order.clone();
            reactor.add(Box::new(move |_| {
                order.borrow_mut().push(tag);
                Ok(())
            }));
        }
        reactor.broadcast(&event()).unwrap();
        assert_eq!(*order.borrow(), [0, 1, 2]);
    }

    #[test]
    fn first_error_aborts_broadcast() {
        let reached = Rc::new(RefCell::new(false));
        let mut reactor = EventReactor::new();
        reactor.add(Box::new(|_| Err(Error::OutOfBounds)));
        {
            let reached = reached.clone();
            reactor.add(Box::new(move |_| {
                *reached.borrow_mut() = true;
                Ok(())
            }));
        }
        assert!(matches!(
            reactor.broadcast(&event()),
            Err(Error::OutOfBounds),
        ));
        assert!(!*reached.borrow());
    }
}
