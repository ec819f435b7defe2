use std::{cell::RefCell, rc::Rc};

use crate::{
    cursor::Cursor,
    error::Result,
    event::{Event, EventKind},
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
    scan::RawFileLineOverrideFilter,
};

/// Splices physical line continuations.
///
/// A backslash immediately followed by a newline is removed from the
/// character stream entirely, so downstream layers see one contiguous
/// logical line. A backslash followed by anything else is forwarded
/// unchanged, as is a backslash at end of input.
pub struct LineWrapFilter {
    parent: RawFileLineOverrideFilter,
    bus: MessageBus,
}

#[derive(Default)]
struct WrapState {
    /// Cursor of a backslash held back until the next event decides whether
    /// it starts a continuation.
    held: Option<Cursor>,
}

impl WrapState {
    fn on_event(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        match (self.held.take(), event.kind()) {
            (None, EventKind::RawChar(b'\\')) => {
                self.held = Some(event.cursor().clone());
                Ok(())
            }
            (None, _) => reactor.broadcast(event),
            // The continuation: both characters vanish, cursor included.
            (Some(_), EventKind::RawChar(b'\n')) => Ok(()),
            (Some(held), EventKind::RawChar(b'\\')) => {
                reactor.broadcast(&Event::raw_char(held, b'\\'))?;
                self.held = Some(event.cursor().clone());
                Ok(())
            }
            (Some(held), _) => {
                reactor.broadcast(&Event::raw_char(held, b'\\'))?;
                reactor.broadcast(event)
            }
        }
    }
}

impl LineWrapFilter {
    /// Creates the filter and its parent chain.
    pub fn new() -> Result<Self> {
        let parent = RawFileLineOverrideFilter::new()?;
        let state = Rc::new(RefCell::new(WrapState::default()));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));

        {
            let state = state.clone();
            let reactor = reactor.clone();
            parent.subscribe_raw_file_line_override_filter(move |event| {
                state.borrow_mut().on_event(event, &mut reactor.borrow_mut())
            })?;
        }

        let bus = parent.message_bus().clone();
        bus.interpose(move |mut parent_handler| {
            Box::new(move |message| match message {
                Message::Subscribe {
                    layer: Layer::LineWrapFilter,
                    handler,
                } => {
                    reactor.borrow_mut().add(handler);
                    Ok(())
                }
                other => parent_handler(other),
            })
        });

        Ok(LineWrapFilter { parent, bus })
    }
}

impl AbstractParser for LineWrapFilter {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        self.parent.run()
    }
}
