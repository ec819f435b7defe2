//! End-to-end scenarios driving full scanner stacks through the public
//! subscription API.

use std::{cell::RefCell, rc::Rc};

use cpp_scan::{
    event::{Directive, Keyword, Token},
    AbstractParser, CommentFilter, Error, Event, EventKind, InputStream, PreprocessorScanner,
};

/// Subscribes a collecting handler to one layer of `parser`.
fn collect<P: AbstractParser>(
    subscribe: impl FnOnce(&P, Box<dyn FnMut(&Event) -> cpp_scan::Result<()>>) -> cpp_scan::Result<()>,
    parser: &P,
) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    subscribe(
        parser,
        Box::new(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }),
    )
    .unwrap();
    seen
}

fn tokens_of(events: &[Event]) -> Vec<Token> {
    events
        .iter()
        .filter_map(|event| match event.kind() {
            EventKind::Token(token) => Some(token.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn every_layer_sees_exactly_one_eof() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let streams = [
        collect(|p: &PreprocessorScanner, h| p.subscribe_raw_stack_scanner(h), &scanner),
        collect(|p: &PreprocessorScanner, h| p.subscribe_raw_file_line_override_filter(h), &scanner),
        collect(|p: &PreprocessorScanner, h| p.subscribe_line_wrap_filter(h), &scanner),
        collect(|p: &PreprocessorScanner, h| p.subscribe_comment_scanner(h), &scanner),
        collect(|p: &PreprocessorScanner, h| p.subscribe_comment_filter(h), &scanner),
        collect(
            |p: &PreprocessorScanner, h| p.subscribe_newline_preserving_whitespace_filter(h),
            &scanner,
        ),
        collect(|p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h), &scanner),
    ];
    scanner
        .push_input_stream("e.c", InputStream::from_string("int a; /* c */\n"))
        .unwrap();
    scanner.run().unwrap();
    for stream in &streams {
        let eofs = stream
            .borrow()
            .iter()
            .filter(|event| *event.kind() == EventKind::Eof)
            .count();
        assert_eq!(eofs, 1);
    }
}

#[test]
fn comment_boundaries_always_balance() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let comments = collect(
        |p: &PreprocessorScanner, h| p.subscribe_comment_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream(
            "c.c",
            InputStream::from_string("a /* one */ b // two\n/* three\nlines */ c\n"),
        )
        .unwrap();
    scanner.run().unwrap();

    let mut depth = 0i32;
    let mut pairs = 0;
    for event in comments.borrow().iter() {
        match event.kind() {
            EventKind::CommentBlockBegin | EventKind::CommentLineBegin => {
                assert_eq!(depth, 0, "comments never nest");
                depth += 1;
            }
            EventKind::CommentBlockEnd | EventKind::CommentLineEnd => {
                depth -= 1;
                pairs += 1;
            }
            _ => {}
        }
    }
    assert_eq!(depth, 0);
    assert_eq!(pairs, 3);
}

#[test]
fn no_comment_bytes_reach_the_comment_filter() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let filtered = collect(
        |p: &PreprocessorScanner, h| p.subscribe_comment_filter(h),
        &scanner,
    );
    scanner
        .push_input_stream("c.c", InputStream::from_string("x/* hidden */y\n"))
        .unwrap();
    scanner.run().unwrap();
    let bytes: Vec<u8> = filtered
        .borrow()
        .iter()
        .filter_map(|event| match event.kind() {
            EventKind::RawChar(byte) => Some(*byte),
            _ => None,
        })
        .collect();
    assert_eq!(bytes, b"xy\n");
}

#[test]
fn directive_lines_pair_hash_with_end() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream(
            "d.c",
            InputStream::from_string("#ifdef A\nint x;\n#endif\n"),
        )
        .unwrap();
    scanner.run().unwrap();

    let mut open = false;
    let mut pairs = 0;
    for event in events.borrow().iter() {
        match event.kind() {
            EventKind::Token(Token::Hash) => {
                assert!(!open, "directive lines do not nest");
                open = true;
            }
            EventKind::Token(Token::End) => {
                assert!(open, "end-of-directive without a hash");
                open = false;
                pairs += 1;
            }
            _ => {}
        }
    }
    assert!(!open);
    assert_eq!(pairs, 2);
}

#[test]
fn include_framing_has_no_stray_events() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream("i.c", InputStream::from_string("#include <stdio.h>\n"))
        .unwrap();
    scanner.run().unwrap();
    let kinds: Vec<_> = events.borrow().iter().map(Event::kind).cloned().collect();
    assert_eq!(
        kinds,
        [
            EventKind::Token(Token::Hash),
            EventKind::Token(Token::Directive(Directive::Include)),
            EventKind::Token(Token::RawSystemString("<stdio.h>".into())),
            EventKind::Token(Token::End),
            EventKind::Eof,
        ],
    );
}

#[test]
fn spliced_identifier_scans_as_one_token() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream("s.c", InputStream::from_string("foo\\\nbar"))
        .unwrap();
    scanner.run().unwrap();
    assert_eq!(
        tokens_of(&events.borrow()),
        [Token::Identifier("foobar".into())],
    );
}

#[test]
fn line_override_changes_reported_positions() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream(
            "l.c",
            InputStream::from_string("#line 42 \"other.c\"\nx\n"),
        )
        .unwrap();
    scanner.run().unwrap();
    let events = events.borrow();
    let x = events
        .iter()
        .find(|event| *event.kind() == EventKind::Token(Token::Identifier("x".into())))
        .expect("the identifier after the override");
    assert_eq!(x.cursor().file(), "other.c");
    assert_eq!(x.cursor().begin_line, 42);
}

#[test]
fn keyword_and_identifier_distinction() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream("k.c", InputStream::from_string("for fork"))
        .unwrap();
    scanner.run().unwrap();
    assert_eq!(
        tokens_of(&events.borrow()),
        [
            Token::Keyword(Keyword::For),
            Token::Identifier("fork".into()),
        ],
    );
}

#[test]
fn two_sources_concatenate_into_one_token_stream() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    // Pushdown order: the source pushed last is scanned first.
    scanner
        .push_input_stream("second.c", InputStream::from_string("b;\n"))
        .unwrap();
    scanner
        .push_input_stream("first.c", InputStream::from_string("a;\n"))
        .unwrap();
    scanner.run().unwrap();
    assert_eq!(
        tokens_of(&events.borrow()),
        [
            Token::Identifier("a".into()),
            Token::Semicolon,
            Token::Identifier("b".into()),
            Token::Semicolon,
        ],
    );
}

#[test]
fn trailing_backslash_loses_no_data() {
    let mut filter = CommentFilter::new().unwrap();
    let events = collect(|p: &CommentFilter, h| p.subscribe_comment_filter(h), &filter);
    filter
        .push_input_stream("t.c", InputStream::from_string("a\\"))
        .unwrap();
    filter.run().unwrap();
    let kinds: Vec<_> = events.borrow().iter().map(Event::kind).cloned().collect();
    assert_eq!(
        kinds,
        [
            EventKind::RawChar(b'a'),
            EventKind::RawChar(b'\\'),
            EventKind::Eof,
        ],
    );
}

#[test]
fn unterminated_block_comment_fails_the_run() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    scanner
        .push_input_stream("u.c", InputStream::from_string("/* open"))
        .unwrap();
    assert!(matches!(scanner.run(), Err(Error::UnexpectedEof { .. })));
}

#[test]
fn subscriber_error_propagates_out_of_run() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    scanner
        .subscribe_preprocessor_scanner(|_| Err(Error::OutOfBounds))
        .unwrap();
    scanner
        .push_input_stream("f.c", InputStream::from_string("x"))
        .unwrap();
    assert!(matches!(scanner.run(), Err(Error::OutOfBounds)));
}

#[test]
fn retained_events_outlive_the_scanner() {
    let mut scanner = PreprocessorScanner::new().unwrap();
    let events = collect(
        |p: &PreprocessorScanner, h| p.subscribe_preprocessor_scanner(h),
        &scanner,
    );
    scanner
        .push_input_stream("r.c", InputStream::from_string("\"text\""))
        .unwrap();
    scanner.run().unwrap();
    drop(scanner);
    let events = Rc::try_unwrap(events).unwrap().into_inner();
    assert_eq!(
        tokens_of(&events),
        [Token::RawString("\"text\"".into())],
    );
}
