use std::{cell::RefCell, rc::Rc, sync::Arc};

use crate::{
    error::{Error, Result},
    event::Event,
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
    scan::RawStackScanner,
};

/// Rewrites cursors on behalf of `#line` directives.
///
/// Until an override arrives, every raw event passes through unchanged. Once
/// the preprocessor scanner completes a `#line` directive it sends a
/// [`Message::FileLineOverride`] down the chain; this filter consumes it and
/// from then on replaces the file name (when one was given) and shifts line
/// numbers so that the next source line reports the directed number.
pub struct RawFileLineOverrideFilter {
    parent: RawStackScanner,
    bus: MessageBus,
}

#[derive(Default)]
struct OverrideState {
    remap: Option<Remap>,
}

struct Remap {
    file: Option<Arc<str>>,
    next_line: i32,
}

impl OverrideState {
    /// The rewritten event, or `None` when no override is active.
    fn rewrite(&mut self, event: &Event) -> Result<Option<Event>> {
        let Some(remap) = &mut self.remap else {
            return Ok(None);
        };
        let mut cursor = event.cursor().clone();
        let delta = i64::from(remap.next_line) - i64::from(cursor.begin_line);
        let begin = i64::from(cursor.begin_line) + delta;
        let end = i64::from(cursor.end_line) + delta;
        if begin < 1 || end < 1 || begin > i64::from(u32::MAX) || end > i64::from(u32::MAX) {
            return Err(Error::OutOfBounds);
        }
        cursor.begin_line = begin as u32;
        cursor.end_line = end as u32;
        if let Some(file) = &remap.file {
            cursor.set_file(file.clone());
        }
        // A newline moves the override forward so later lines keep counting.
        if end > begin {
            remap.next_line = remap
                .next_line
                .checked_add(1)
                .ok_or(Error::OutOfBounds)?;
        }
        Ok(Some(Event::new(cursor, event.kind().clone())))
    }
}

impl RawFileLineOverrideFilter {
    /// Creates the filter and its parent raw stack scanner.
    pub fn new() -> Result<Self> {
        let parent = RawStackScanner::new();
        let state = Rc::new(RefCell::new(OverrideState::default()));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));

        {
            let state = state.clone();
            let reactor = reactor.clone();
            parent.subscribe_raw_stack_scanner(move |event| {
                let rewritten = state.borrow_mut().rewrite(event)?;
                reactor
                    .borrow_mut()
                    .broadcast(rewritten.as_ref().unwrap_or(event))
            })?;
        }

        let bus = parent.message_bus().clone();
        {
            bus.interpose(move |mut parent_handler| {
                Box::new(move |message| match message {
                    Message::Subscribe {
                        layer: Layer::RawFileLineOverrideFilter,
                        handler,
                    } => {
                        reactor.borrow_mut().add(handler);
                        Ok(())
                    }
                    Message::FileLineOverride { file, line } => {
                        state.borrow_mut().remap = Some(Remap {
                            file: file.map(|file| Arc::from(file.as_str())),
                            next_line: line,
                        });
                        Ok(())
                    }
                    other => parent_handler(other),
                })
            });
        }

        Ok(RawFileLineOverrideFilter { parent, bus })
    }
}

impl AbstractParser for RawFileLineOverrideFilter {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        self.parent.run()
    }
}
