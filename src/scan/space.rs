use std::{cell::RefCell, rc::Rc};

use crate::{
    cache::FilePositionCache,
    error::Result,
    event::{Event, EventKind},
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
    scan::CommentFilter,
};

/// Whether a byte is horizontal whitespace (newline handled separately).
fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | 0x0B | 0x0C)
}

/// Coalesces whitespace runs while keeping newlines distinct.
///
/// Runs of spaces, tabs, vertical tabs, form feeds, and stripped comments
/// become a single whitespace event whose cursor spans the run. Newlines
/// always pass through as their own events, which is what lets the
/// preprocessor scanner frame `#` directive lines. Everything else is
/// forwarded unchanged.
pub struct NewlinePreservingWhitespaceFilter {
    parent: CommentFilter,
    bus: MessageBus,
}

#[derive(Default)]
struct SpaceState {
    run: FilePositionCache,
}

impl SpaceState {
    fn on_event(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        match event.kind() {
            EventKind::RawChar(byte) if is_space(*byte) => self.accumulate(event, reactor),
            EventKind::Whitespace => self.accumulate(event, reactor),
            EventKind::RawChar(b'\n') => {
                self.flush(reactor)?;
                reactor.broadcast(&Event::newline(event.cursor().clone()))
            }
            _ => {
                self.flush(reactor)?;
                reactor.broadcast(event)
            }
        }
    }

    fn accumulate(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        let cursor = event.cursor();
        if self.run.is_set() && self.run.file()? != cursor.file() {
            // A run never spans an input-source boundary.
            self.flush(reactor)?;
        }
        if self.run.is_set() {
            self.run.extend(cursor)
        } else {
            self.run.set(cursor.clone())
        }
    }

    fn flush(&mut self, reactor: &mut EventReactor) -> Result<()> {
        if self.run.is_set() {
            let span = self.run.take()?;
            reactor.broadcast(&Event::whitespace(span))?;
        }
        Ok(())
    }
}

impl NewlinePreservingWhitespaceFilter {
    /// Creates the filter and its parent chain.
    pub fn new() -> Result<Self> {
        let parent = CommentFilter::new()?;
        let state = Rc::new(RefCell::new(SpaceState::default()));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));

        {
            let state = state.clone();
            let reactor = reactor.clone();
            parent.subscribe_comment_filter(move |event| {
                state.borrow_mut().on_event(event, &mut reactor.borrow_mut())
            })?;
        }

        let bus = parent.message_bus().clone();
        bus.interpose(move |mut parent_handler| {
            Box::new(move |message| match message {
                Message::Subscribe {
                    layer: Layer::NewlinePreservingWhitespaceFilter,
                    handler,
                } => {
                    reactor.borrow_mut().add(handler);
                    Ok(())
                }
                other => parent_handler(other),
            })
        });

        Ok(NewlinePreservingWhitespaceFilter { parent, bus })
    }
}

impl AbstractParser for NewlinePreservingWhitespaceFilter {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        self.parent.run()
    }
}
