// Copyright (C) the cpp-scan authors. All rights reserved.
//
// This file is part of cpp-scan, distributed under the MIT license. For the
// full terms, see the included LICENSE file.

//! The event vocabulary published by the scanner layers.
//!
//! Every layer broadcasts [`Event`]s: a [`Cursor`] pinning the source range
//! plus an [`EventKind`] describing what was seen there. Lower layers publish
//! raw characters; the comment layers publish comment boundaries; the
//! preprocessor scanner publishes [`Token`]s. Subscribers receive events by
//! reference and may clone them for retention.

pub mod integer;

use bstr::BString;
use static_assertions::assert_impl_all;

use crate::cursor::Cursor;

pub use integer::{IntegerKind, IntegerToken, IntegerValue};

/// One event in a layer's output stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    cursor: Cursor,
    kind: EventKind,
}

assert_impl_all!(Event: Clone, Send, Sync);

/// What an [`Event`] describes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// One raw byte of input.
    RawChar(u8),
    /// End of all input. Exactly one per run.
    Eof,
    /// A run of non-newline whitespace, or a stripped comment.
    Whitespace,
    /// One physical newline.
    Newline,
    /// Start of a `/* ... */` comment; the cursor covers the `/*`.
    CommentBlockBegin,
    /// End of a `/* ... */` comment; the cursor covers the `*/`.
    CommentBlockEnd,
    /// Start of a `// ...` comment; the cursor covers the `//`.
    CommentLineBegin,
    /// End of a `// ...` comment, at the terminating newline or end of input.
    CommentLineEnd,
    /// One preprocessor token.
    Token(Token),
}

/// A preprocessor token, as published by the preprocessor scanner.
///
/// Numeric, character, and string tokens carry their lexeme verbatim; the
/// scanner never interprets them into host values. See
/// [`IntegerToken::from_raw`] for the downstream conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Ellipsis,
    Arrow,
    Plus,
    Minus,
    Star,
    ForwardSlash,
    Percent,
    LogicalAnd,
    LogicalOr,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Question,
    Not,
    EqualCompare,
    NotEqualCompare,
    EqualAssign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpersandAssign,
    PipeAssign,
    CaretAssign,
    TildeAssign,
    LeftShiftAssign,
    RightShiftAssign,
    BitshiftLeft,
    BitshiftRight,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    Increment,
    Decrement,
    /// An identifier that is neither a keyword nor a directive name.
    Identifier(BString),
    /// One of the 37 C keywords.
    Keyword(Keyword),
    /// An uninterpreted integer literal, prefix and suffix included.
    RawInteger(RawIntegerToken),
    /// An uninterpreted floating literal, suffix included.
    RawFloat(RawFloatToken),
    /// A character literal, quotes and any prefix included.
    RawCharacter(BString),
    /// A string literal, quotes and any prefix included.
    RawString(BString),
    /// A `<...>` include argument, angle brackets included.
    RawSystemString(BString),
    /// An interpreted integer. Never produced by the scanner itself; emitted
    /// by downstream collaborators that convert [`Token::RawInteger`].
    Integer(IntegerToken),
    /// A `#` punctuator.
    Hash,
    /// A `##` punctuator.
    StringConcat,
    /// A directive name following a line-initial `#`.
    Directive(Directive),
    /// End of a logical preprocessor directive line.
    End,
}

/// An uninterpreted integer literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawIntegerToken {
    /// The whole lexeme: radix prefix, digits, and suffix.
    pub digits: BString,
    /// Whether the literal is signed, i.e. carries no `u`/`U` suffix.
    pub signed: bool,
}

/// An uninterpreted floating literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFloatToken {
    /// The whole lexeme, suffix included.
    pub text: BString,
    /// Whether the literal is signed. Always true at the scanner layer; a
    /// sign in front of a literal is a separate punctuator token.
    pub signed: bool,
}

/// The preprocessor directive names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Directive {
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
    Endif,
    Include,
    Define,
    Undef,
    Line,
    Error,
    Pragma,
}

impl Directive {
    /// Maps a directive name to its token, if `text` is one.
    pub fn from_name(text: &[u8]) -> Option<Directive> {
        Some(match text {
            b"if" => Directive::If,
            b"ifdef" => Directive::Ifdef,
            b"ifndef" => Directive::Ifndef,
            b"elif" => Directive::Elif,
            b"else" => Directive::Else,
            b"endif" => Directive::Endif,
            b"include" => Directive::Include,
            b"define" => Directive::Define,
            b"undef" => Directive::Undef,
            b"line" => Directive::Line,
            b"error" => Directive::Error,
            b"pragma" => Directive::Pragma,
            _ => return None,
        })
    }
}

macro_rules! keywords {
    ($(($variant:ident, $text:literal)),* $(,)?) => {
        /// The C keywords (C89 base plus the C99 additions).
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            /// Every keyword with its spelling, in table order.
            pub const ALL: &'static [(&'static str, Keyword)] =
                &[$(($text, Keyword::$variant)),*];

            /// The keyword's spelling.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text),*
                }
            }
        }
    };
}

keywords! {
    (Bool, "_Bool"),
    (Complex, "_Complex"),
    (Imaginary, "_Imaginary"),
    (Auto, "auto"),
    (Break, "break"),
    (Case, "case"),
    (Char, "char"),
    (Const, "const"),
    (Continue, "continue"),
    (Default, "default"),
    (Do, "do"),
    (Double, "double"),
    (Else, "else"),
    (Enum, "enum"),
    (Extern, "extern"),
    (Float, "float"),
    (For, "for"),
    (Goto, "goto"),
    (If, "if"),
    (Inline, "inline"),
    (Int, "int"),
    (Long, "long"),
    (Register, "register"),
    (Restrict, "restrict"),
    (Return, "return"),
    (Short, "short"),
    (Signed, "signed"),
    (Sizeof, "sizeof"),
    (Static, "static"),
    (Struct, "struct"),
    (Switch, "switch"),
    (Typedef, "typedef"),
    (Union, "union"),
    (Unsigned, "unsigned"),
    (Void, "void"),
    (Volatile, "volatile"),
    (While, "while"),
}

/// The category of an [`Event`], for coarse-grained dispatch before matching
/// the exact variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventCategory {
    RawCharacter,
    Eof,
    Whitespace,
    Newline,
    Comment,
    Punctuator,
    Identifier,
    Keyword,
    RawInteger,
    RawFloat,
    RawCharacterLiteral,
    RawString,
    RawSystemString,
    Integer,
    Preprocessor,
}

impl Event {
    /// Creates an event covering `cursor`.
    #[inline]
    pub fn new(cursor: Cursor, kind: EventKind) -> Self {
        Event { cursor, kind }
    }

    /// Shorthand for a raw-character event.
    #[inline]
    pub fn raw_char(cursor: Cursor, byte: u8) -> Self {
        Event::new(cursor, EventKind::RawChar(byte))
    }

    /// Shorthand for the terminal end-of-input event.
    #[inline]
    pub fn eof(cursor: Cursor) -> Self {
        Event::new(cursor, EventKind::Eof)
    }

    /// Shorthand for a whitespace event.
    #[inline]
    pub fn whitespace(cursor: Cursor) -> Self {
        Event::new(cursor, EventKind::Whitespace)
    }

    /// Shorthand for a newline event.
    #[inline]
    pub fn newline(cursor: Cursor) -> Self {
        Event::new(cursor, EventKind::Newline)
    }

    /// Shorthand for a token event.
    #[inline]
    pub fn token(cursor: Cursor, token: Token) -> Self {
        Event::new(cursor, EventKind::Token(token))
    }

    /// The source range this event covers.
    #[inline]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// What this event describes.
    #[inline]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Consumes the event, returning its parts.
    #[inline]
    pub fn into_parts(self) -> (Cursor, EventKind) {
        (self.cursor, self.kind)
    }

    /// The event's category.
    pub fn category(&self) -> EventCategory {
        match &self.kind {
            EventKind::RawChar(_) => EventCategory::RawCharacter,
            EventKind::Eof => EventCategory::Eof,
            EventKind::Whitespace => EventCategory::Whitespace,
            EventKind::Newline => EventCategory::Newline,
            EventKind::CommentBlockBegin
            | EventKind::CommentBlockEnd
            | EventKind::CommentLineBegin
            | EventKind::CommentLineEnd => EventCategory::Comment,
            EventKind::Token(token) => match token {
                Token::Identifier(_) => EventCategory::Identifier,
                Token::Keyword(_) => EventCategory::Keyword,
                Token::RawInteger(_) => EventCategory::RawInteger,
                Token::RawFloat(_) => EventCategory::RawFloat,
                Token::RawCharacter(_) => EventCategory::RawCharacterLiteral,
                Token::RawString(_) => EventCategory::RawString,
                Token::RawSystemString(_) => EventCategory::RawSystemString,
                Token::Integer(_) => EventCategory::Integer,
                Token::Hash | Token::StringConcat | Token::Directive(_) | Token::End => {
                    EventCategory::Preprocessor
                }
                _ => EventCategory::Punctuator,
            },
        }
    }
}
