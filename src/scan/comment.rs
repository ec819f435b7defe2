use std::{cell::RefCell, rc::Rc};

use crate::{
    cursor::Cursor,
    error::{Error, Result},
    event::{Event, EventKind},
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
    scan::LineWrapFilter,
};

/// Recognizes `/* ... */` and `// ...` comments.
///
/// Comment boundaries are broadcast as begin/end events whose cursors cover
/// the delimiters; the characters between them are forwarded, so a
/// subscriber at this layer sees comment text with positions (a highlighter
/// needs exactly that). The delimiters themselves are represented only by
/// the boundary events.
pub struct CommentScanner {
    parent: LineWrapFilter,
    bus: MessageBus,
}

enum CommentState {
    /// Outside any comment.
    Code,
    /// Saw `/`, which may open a comment.
    Slash(Cursor),
    /// Inside a block comment.
    InBlock,
    /// Inside a block comment, holding a `*` that may close it.
    InBlockStar(Cursor),
    /// Inside a line comment.
    InLine,
}

struct ScanState {
    state: CommentState,
}

impl ScanState {
    fn on_event(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        match event.kind() {
            EventKind::RawChar(byte) => self.on_char(*byte, event, reactor),
            EventKind::Eof => match std::mem::replace(&mut self.state, CommentState::Code) {
                CommentState::Code => reactor.broadcast(event),
                CommentState::Slash(held) => {
                    reactor.broadcast(&Event::raw_char(held, b'/'))?;
                    reactor.broadcast(event)
                }
                CommentState::InBlock | CommentState::InBlockStar(_) => Err(Error::UnexpectedEof {
                    at: event.cursor().clone(),
                }),
                CommentState::InLine => {
                    let at = event.cursor().collapse_to_begin();
                    reactor.broadcast(&Event::new(at, EventKind::CommentLineEnd))?;
                    reactor.broadcast(event)
                }
            },
            _ => reactor.broadcast(event),
        }
    }

    fn on_char(&mut self, byte: u8, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        match std::mem::replace(&mut self.state, CommentState::Code) {
            CommentState::Code => match byte {
                b'/' => {
                    self.state = CommentState::Slash(event.cursor().clone());
                    Ok(())
                }
                _ => reactor.broadcast(event),
            },
            CommentState::Slash(held) => match byte {
                b'*' => {
                    let mut span = held;
                    span.extend(event.cursor());
                    self.state = CommentState::InBlock;
                    reactor.broadcast(&Event::new(span, EventKind::CommentBlockBegin))
                }
                b'/' => {
                    let mut span = held;
                    span.extend(event.cursor());
                    self.state = CommentState::InLine;
                    reactor.broadcast(&Event::new(span, EventKind::CommentLineBegin))
                }
                _ => {
                    reactor.broadcast(&Event::raw_char(held, b'/'))?;
                    reactor.broadcast(event)
                }
            },
            CommentState::InBlock => match byte {
                b'*' => {
                    self.state = CommentState::InBlockStar(event.cursor().clone());
                    Ok(())
                }
                _ => {
                    self.state = CommentState::InBlock;
                    reactor.broadcast(event)
                }
            },
            CommentState::InBlockStar(star) => match byte {
                b'/' => {
                    let mut span = star;
                    span.extend(event.cursor());
                    reactor.broadcast(&Event::new(span, EventKind::CommentBlockEnd))
                }
                b'*' => {
                    reactor.broadcast(&Event::raw_char(star, b'*'))?;
                    self.state = CommentState::InBlockStar(event.cursor().clone());
                    Ok(())
                }
                _ => {
                    reactor.broadcast(&Event::raw_char(star, b'*'))?;
                    self.state = CommentState::InBlock;
                    reactor.broadcast(event)
                }
            },
            CommentState::InLine => match byte {
                b'\n' => {
                    let at = event.cursor().collapse_to_begin();
                    reactor.broadcast(&Event::new(at, EventKind::CommentLineEnd))?;
                    reactor.broadcast(event)
                }
                _ => {
                    self.state = CommentState::InLine;
                    reactor.broadcast(event)
                }
            },
        }
    }
}

impl CommentScanner {
    /// Creates the scanner and its parent chain.
    pub fn new() -> Result<Self> {
        let parent = LineWrapFilter::new()?;
        let state = Rc::new(RefCell::new(ScanState {
            state: CommentState::Code,
        }));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));

        {
            let state = state.clone();
            let reactor = reactor.clone();
            parent.subscribe_line_wrap_filter(move |event| {
                state.borrow_mut().on_event(event, &mut reactor.borrow_mut())
            })?;
        }

        let bus = parent.message_bus().clone();
        bus.interpose(move |mut parent_handler| {
            Box::new(move |message| match message {
                Message::Subscribe {
                    layer: Layer::CommentScanner,
                    handler,
                } => {
                    reactor.borrow_mut().add(handler);
                    Ok(())
                }
                other => parent_handler(other),
            })
        });

        Ok(CommentScanner { parent, bus })
    }
}

impl AbstractParser for CommentScanner {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        self.parent.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputStream;

    fn scan(input: &str) -> Result<Vec<Event>> {
        let mut scanner = CommentScanner::new().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scanner
            .subscribe_comment_scanner(move |event| {
                sink.borrow_mut().push(event.clone());
                Ok(())
            })
            .unwrap();
        scanner
            .push_input_stream("c.c", InputStream::from_string(input))
            .unwrap();
        scanner.run()?;
        drop(scanner);
        Ok(Rc::try_unwrap(seen).unwrap().into_inner())
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(Event::kind).cloned().collect()
    }

    #[test]
    fn block_comment_boundaries_frame_interior() {
        let events = scan("a/*xy*/b").unwrap();
        assert_eq!(
            kinds(&events),
            [
                EventKind::RawChar(b'a'),
                EventKind::CommentBlockBegin,
                EventKind::RawChar(b'x'),
                EventKind::RawChar(b'y'),
                EventKind::CommentBlockEnd,
                EventKind::RawChar(b'b'),
                EventKind::Eof,
            ],
        );
        let begin = events[1].cursor();
        assert_eq!((begin.begin_col, begin.end_col), (2, 4));
        let end = events[4].cursor();
        assert_eq!((end.begin_col, end.end_col), (6, 8));
    }

    #[test]
    fn stars_inside_block_are_forwarded() {
        let events = scan("/*a**b**/").unwrap();
        assert_eq!(
            kinds(&events),
            [
                EventKind::CommentBlockBegin,
                EventKind::RawChar(b'a'),
                EventKind::RawChar(b'*'),
                EventKind::RawChar(b'*'),
                EventKind::RawChar(b'b'),
                EventKind::RawChar(b'*'),
                EventKind::CommentBlockEnd,
                EventKind::Eof,
            ],
        );
    }

    #[test]
    fn line_comment_ends_before_the_newline() {
        let events = scan("x// c\ny").unwrap();
        assert_eq!(
            kinds(&events),
            [
                EventKind::RawChar(b'x'),
                EventKind::CommentLineBegin,
                EventKind::RawChar(b' '),
                EventKind::RawChar(b'c'),
                EventKind::CommentLineEnd,
                EventKind::RawChar(b'\n'),
                EventKind::RawChar(b'y'),
                EventKind::Eof,
            ],
        );
    }

    #[test]
    fn line_comment_closes_at_end_of_input() {
        let events = scan("//c").unwrap();
        assert_eq!(
            kinds(&events),
            [
                EventKind::CommentLineBegin,
                EventKind::RawChar(b'c'),
                EventKind::CommentLineEnd,
                EventKind::Eof,
            ],
        );
    }

    #[test]
    fn lone_slash_is_forwarded() {
        let events = scan("a/b").unwrap();
        assert_eq!(
            kinds(&events),
            [
                EventKind::RawChar(b'a'),
                EventKind::RawChar(b'/'),
                EventKind::RawChar(b'b'),
                EventKind::Eof,
            ],
        );
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        assert!(matches!(
            scan("/* never closed"),
            Err(Error::UnexpectedEof { .. }),
        ));
    }
}
