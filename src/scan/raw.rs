use std::{cell::RefCell, rc::Rc, sync::Arc};

use tracing::debug;

use crate::{
    cursor::Cursor,
    error::{Error, Result},
    event::Event,
    input::InputStream,
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
};

/// The bottom of every stack: a pushdown of named input sources, scanned
/// into raw-character events with line/column cursors.
///
/// The source pushed last is read first; when it is exhausted it is popped
/// and the source below resumes at its saved position. When the stack
/// empties, a single terminal end-of-input event is broadcast and the run
/// completes.
pub struct RawStackScanner {
    state: Rc<RefCell<RawState>>,
    reactor: Rc<RefCell<EventReactor>>,
    bus: MessageBus,
}

struct RawState {
    stack: Vec<RawStackEntry>,
    /// Position of the most recently exhausted source, for the terminal
    /// end-of-input cursor.
    last: Cursor,
}

/// One active input source: its stream and its scan position. The cursor
/// owns the source name, so popping an entry restores the position and name
/// of the source below it.
struct RawStackEntry {
    stream: InputStream,
    cursor: Cursor,
}

enum Tick {
    Byte(Cursor, u8),
    Pop,
    Eof(Cursor),
}

impl RawStackScanner {
    /// Creates a scanner with an empty input stack.
    pub fn new() -> Self {
        let state = Rc::new(RefCell::new(RawState {
            stack: Vec::new(),
            last: Cursor::new("".into()),
        }));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));
        let bus = {
            let state = state.clone();
            let reactor = reactor.clone();
            MessageBus::new(Box::new(move |message| match message {
                Message::Subscribe {
                    layer: Layer::RawStackScanner,
                    handler,
                } => {
                    reactor.borrow_mut().add(handler);
                    Ok(())
                }
                Message::PushInputStream { name, stream } => {
                    debug!(name = %name, "pushing input stream");
                    state.borrow_mut().stack.push(RawStackEntry {
                        stream,
                        cursor: Cursor::new(Arc::from(name.as_str())),
                    });
                    Ok(())
                }
                _ => Err(Error::UnhandledMessage),
            }))
        };
        RawStackScanner {
            state,
            reactor,
            bus,
        }
    }
}

impl Default for RawStackScanner {
    fn default() -> Self {
        RawStackScanner::new()
    }
}

impl AbstractParser for RawStackScanner {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        loop {
            // The stack borrow is released before broadcasting, so handlers
            // are free to send messages back down the chain.
            let tick = {
                let mut state = self.state.borrow_mut();
                match state.stack.last_mut() {
                    None => Tick::Eof(state.last.collapse_to_end()),
                    Some(top) => match top.stream.read_byte() {
                        Ok(byte) => {
                            top.cursor.advance(byte);
                            Tick::Byte(top.cursor.clone(), byte)
                        }
                        Err(Error::InputStreamEof) => Tick::Pop,
                        Err(err) => return Err(err),
                    },
                }
            };
            match tick {
                Tick::Byte(cursor, byte) => {
                    let event = Event::raw_char(cursor, byte);
                    self.reactor.borrow_mut().broadcast(&event)?;
                }
                Tick::Pop => {
                    let mut state = self.state.borrow_mut();
                    let entry = state.stack.pop().ok_or(Error::OutOfBounds)?;
                    debug!(file = entry.cursor.file(), "input stream exhausted");
                    state.last = entry.cursor;
                }
                Tick::Eof(cursor) => {
                    let event = Event::eof(cursor);
                    self.reactor.borrow_mut().broadcast(&event)?;
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn collect(scanner: &mut RawStackScanner) -> Rc<RefCell<Vec<Event>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scanner
            .subscribe_raw_stack_scanner(move |event| {
                sink.borrow_mut().push(event.clone());
                Ok(())
            })
            .unwrap();
        seen
    }

    #[test]
    fn empty_stack_emits_single_eof() {
        let mut scanner = RawStackScanner::new();
        let seen = collect(&mut scanner);
        scanner.run().unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(*seen[0].kind(), EventKind::Eof);
    }

    #[test]
    fn bytes_carry_advancing_cursors() {
        let mut scanner = RawStackScanner::new();
        let seen = collect(&mut scanner);
        scanner
            .push_input_stream("a.c", InputStream::from_string("x\ny"))
            .unwrap();
        scanner.run().unwrap();
        let seen = seen.borrow();
        let kinds: Vec<_> = seen.iter().map(Event::kind).cloned().collect();
        assert_eq!(
            kinds,
            [
                EventKind::RawChar(b'x'),
                EventKind::RawChar(b'\n'),
                EventKind::RawChar(b'y'),
                EventKind::Eof,
            ],
        );
        let x = seen[0].cursor();
        assert_eq!((x.begin_line, x.begin_col, x.end_line, x.end_col), (1, 1, 1, 2));
        assert_eq!(x.file(), "a.c");
        let nl = seen[1].cursor();
        assert_eq!((nl.begin_line, nl.begin_col, nl.end_line, nl.end_col), (1, 2, 2, 1));
        let y = seen[2].cursor();
        assert_eq!((y.begin_line, y.begin_col, y.end_line, y.end_col), (2, 1, 2, 2));
    }

    #[test]
    fn last_pushed_stream_is_read_first() {
        let mut scanner = RawStackScanner::new();
        let seen = collect(&mut scanner);
        scanner
            .push_input_stream("outer.c", InputStream::from_string("b"))
            .unwrap();
        scanner
            .push_input_stream("inner.c", InputStream::from_string("a"))
            .unwrap();
        scanner.run().unwrap();
        let seen = seen.borrow();
        assert_eq!(*seen[0].kind(), EventKind::RawChar(b'a'));
        assert_eq!(seen[0].cursor().file(), "inner.c");
        assert_eq!(*seen[1].kind(), EventKind::RawChar(b'b'));
        assert_eq!(seen[1].cursor().file(), "outer.c");
        assert_eq!(*seen[2].kind(), EventKind::Eof);
    }

    #[test]
    fn concatenated_sources_match_a_single_source() {
        let mut split = RawStackScanner::new();
        let split_seen = collect(&mut split);
        split
            .push_input_stream("b.c", InputStream::from_string("cd"))
            .unwrap();
        split
            .push_input_stream("a.c", InputStream::from_string("ab"))
            .unwrap();
        split.run().unwrap();

        let mut joined = RawStackScanner::new();
        let joined_seen = collect(&mut joined);
        joined
            .push_input_stream("ab.c", InputStream::from_string("abcd"))
            .unwrap();
        joined.run().unwrap();

        let split_kinds: Vec<_> = split_seen.borrow().iter().map(Event::kind).cloned().collect();
        let joined_kinds: Vec<_> =
            joined_seen.borrow().iter().map(Event::kind).cloned().collect();
        assert_eq!(split_kinds, joined_kinds);
    }

    #[test]
    fn handler_error_aborts_run() {
        let mut scanner = RawStackScanner::new();
        scanner
            .subscribe_raw_stack_scanner(|_| Err(Error::OutOfBounds))
            .unwrap();
        scanner
            .push_input_stream("a.c", InputStream::from_string("x"))
            .unwrap();
        assert!(matches!(scanner.run(), Err(Error::OutOfBounds)));
    }

    #[test]
    fn foreign_subscription_is_unhandled() {
        let scanner = RawStackScanner::new();
        assert!(matches!(
            scanner.subscribe_preprocessor_scanner(|_| Ok(())),
            Err(Error::UnhandledMessage),
        ));
    }
}
