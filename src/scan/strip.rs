use std::{cell::RefCell, rc::Rc};

use crate::{
    error::Result,
    event::{Event, EventKind},
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
    scan::CommentScanner,
};

/// Strips comment interiors from the character stream.
///
/// Each comment collapses into one synthetic whitespace event at the
/// position where it began, which keeps token separation intact (`a/*x*/b`
/// stays two tokens). The boundary events themselves are consumed here;
/// subscribers that want them subscribe to the comment scanner instead.
pub struct CommentFilter {
    parent: CommentScanner,
    bus: MessageBus,
}

#[derive(Default)]
struct StripState {
    in_comment: bool,
}

impl StripState {
    fn on_event(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        match event.kind() {
            EventKind::CommentBlockBegin | EventKind::CommentLineBegin => {
                self.in_comment = true;
                reactor.broadcast(&Event::whitespace(event.cursor().clone()))
            }
            EventKind::CommentBlockEnd | EventKind::CommentLineEnd => {
                self.in_comment = false;
                Ok(())
            }
            _ if self.in_comment => Ok(()),
            _ => reactor.broadcast(event),
        }
    }
}

impl CommentFilter {
    /// Creates the filter and its parent chain.
    pub fn new() -> Result<Self> {
        let parent = CommentScanner::new()?;
        let state = Rc::new(RefCell::new(StripState::default()));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));

        {
            let state = state.clone();
            let reactor = reactor.clone();
            parent.subscribe_comment_scanner(move |event| {
                state.borrow_mut().on_event(event, &mut reactor.borrow_mut())
            })?;
        }

        let bus = parent.message_bus().clone();
        bus.interpose(move |mut parent_handler| {
            Box::new(move |message| match message {
                Message::Subscribe {
                    layer: Layer::CommentFilter,
                    handler,
                } => {
                    reactor.borrow_mut().add(handler);
                    Ok(())
                }
                other => parent_handler(other),
            })
        });

        Ok(CommentFilter { parent, bus })
    }
}

impl AbstractParser for CommentFilter {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        self.parent.run()
    }
}
