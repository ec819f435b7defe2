use std::{cell::RefCell, mem, rc::Rc};

use bstr::BString;
use tracing::debug;

use crate::{
    avl::AvlTree,
    cache::FilePositionCache,
    cursor::Cursor,
    error::{Error, Result},
    event::{Directive, Event, EventKind, IntegerToken, Keyword, RawFloatToken, RawIntegerToken, Token},
    message::{Layer, Message, MessageBus},
    parse::AbstractParser,
    reactor::EventReactor,
    scan::NewlinePreservingWhitespaceFilter,
    strbuf::StringBuilder,
};

/// The top of the core pipeline: turns the filtered character stream into
/// preprocessor tokens.
///
/// Identifiers are checked against the keyword table; numeric, character,
/// and string literals are emitted with their lexemes uninterpreted; a `#`
/// that opens a line begins a directive, which is closed by an end-of-
/// directive token at the following newline. Completing a `#line` directive
/// sends a file/line override back down the chain.
pub struct PreprocessorScanner {
    parent: NewlinePreservingWhitespaceFilter,
    bus: MessageBus,
}

/// Lexer state between events. Multi-character tokens keep their text in the
/// string builder and their source range in the position cache.
enum Lex {
    Start,
    Ident,
    /// `.`, which may extend to `...` or a fraction.
    Dot,
    /// `..`, which either completes `...` or falls apart into two dots.
    DotDot { first: Cursor, second: Cursor },
    /// `0`, an octal literal so far.
    Zero,
    Dec,
    Oct,
    /// `0x` with no digits yet.
    HexPrefix,
    Hex,
    SufU,
    SufUL,
    SufULL,
    SufL,
    SufLL,
    SufLU,
    /// Fraction digits after the radix point.
    Frac { hex: bool },
    /// Exponent introducer awaiting a sign or digit.
    ExpMark,
    /// Exponent sign awaiting a digit.
    ExpSign,
    Exp,
    /// Floating suffix seen; the literal is complete.
    FloatSuf,
    Quoted { kind: QuoteKind, sub: QuoteSub },
    Punct(Punct),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteKind {
    Char,
    Str,
    /// `<...>` after `#include`.
    System,
}

#[derive(Clone, Copy)]
enum QuoteSub {
    Body,
    /// After the backslash.
    Escape,
    /// Octal escape, holding the count of digits so far.
    Octal(u8),
    /// `\x` escape, holding whether any digit arrived.
    Hex(bool),
    /// `\u` escape, holding the count of its four digits.
    Short(u8),
    /// `\U` escape, holding the count of its eight digits.
    Long(u8),
}

#[derive(Clone, Copy)]
enum Punct {
    Lt,
    LtLt,
    Gt,
    GtGt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Eq,
    Hash { line_start: bool },
}

enum Flow {
    Consumed,
    Again,
}

struct TokenState {
    lex: Lex,
    builder: StringBuilder,
    cache: FilePositionCache,
    keywords: AvlTree<&'static str, Keyword>,
    /// Between a line-initial `#` and the newline that closes the directive.
    in_directive: bool,
    /// Only whitespace seen since the last newline.
    at_line_start: bool,
    /// The previous token was `#`.
    after_hash: bool,
    /// The previous token was the `include` directive name.
    after_include: bool,
    /// Directive named on the current line, if any.
    directive: Option<Directive>,
    /// `#line` integer argument, once seen.
    line_arg: Option<i32>,
    /// `#line` file argument, once seen.
    file_arg: Option<String>,
    bus: MessageBus,
}

fn is_ident(byte: u8) -> bool {
    byte == b'_' || byte.is_ascii_alphanumeric()
}

impl TokenState {
    fn on_event(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<()> {
        loop {
            match self.step(event, reactor)? {
                Flow::Consumed => return Ok(()),
                Flow::Again => continue,
            }
        }
    }

    fn step(&mut self, event: &Event, reactor: &mut EventReactor) -> Result<Flow> {
        match event.kind() {
            EventKind::RawChar(byte) => self.step_char(*byte, event.cursor(), reactor),
            EventKind::Whitespace => {
                if matches!(self.lex, Lex::Quoted { .. }) {
                    self.quoted_space(event.cursor())?;
                } else {
                    self.finish(event.cursor(), reactor)?;
                }
                Ok(Flow::Consumed)
            }
            EventKind::Newline => {
                if matches!(self.lex, Lex::Quoted { .. }) {
                    return Err(Error::UnexpectedCharacter {
                        byte: b'\n',
                        at: event.cursor().clone(),
                    });
                }
                self.finish(event.cursor(), reactor)?;
                self.end_directive(event.cursor(), reactor)?;
                self.at_line_start = true;
                Ok(Flow::Consumed)
            }
            EventKind::Eof => {
                if matches!(self.lex, Lex::Quoted { .. }) {
                    return Err(Error::UnexpectedEof {
                        at: event.cursor().clone(),
                    });
                }
                self.finish(event.cursor(), reactor)?;
                self.end_directive(event.cursor(), reactor)?;
                reactor.broadcast(event)?;
                Ok(Flow::Consumed)
            }
            // Comment boundaries are consumed by the comment filter below;
            // nothing else reaches this layer.
            _ => Ok(Flow::Consumed),
        }
    }

    fn step_char(&mut self, byte: u8, cursor: &Cursor, reactor: &mut EventReactor) -> Result<Flow> {
        match mem::replace(&mut self.lex, Lex::Start) {
            Lex::Start => self.start_char(byte, cursor, reactor),
            Lex::Ident => {
                if is_ident(byte) {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Ident;
                    Ok(Flow::Consumed)
                } else if byte == b'\'' || byte == b'"' {
                    let text = self.builder.build();
                    if text == "L" || text == "u" || text == "U" {
                        self.grow(cursor, byte)?;
                        let kind = if byte == b'\'' {
                            QuoteKind::Char
                        } else {
                            QuoteKind::Str
                        };
                        self.lex = Lex::Quoted {
                            kind,
                            sub: QuoteSub::Body,
                        };
                        Ok(Flow::Consumed)
                    } else {
                        self.emit_ident(reactor)?;
                        Ok(Flow::Again)
                    }
                } else {
                    self.emit_ident(reactor)?;
                    Ok(Flow::Again)
                }
            }
            Lex::Dot => match byte {
                b'0'..=b'9' => {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Frac { hex: false };
                    Ok(Flow::Consumed)
                }
                b'.' => {
                    let first = self.cache.position()?.clone();
                    self.grow(cursor, byte)?;
                    self.lex = Lex::DotDot {
                        first,
                        second: cursor.clone(),
                    };
                    Ok(Flow::Consumed)
                }
                _ => {
                    let span = self.cache.take()?;
                    self.builder.clear();
                    self.emit(reactor, span, Token::Dot)?;
                    Ok(Flow::Again)
                }
            },
            Lex::DotDot { first, second } => match byte {
                b'.' => {
                    self.grow(cursor, byte)?;
                    let span = self.cache.take()?;
                    self.builder.clear();
                    self.emit(reactor, span, Token::Ellipsis)?;
                    Ok(Flow::Consumed)
                }
                _ => {
                    self.cache.clear();
                    self.builder.clear();
                    self.emit(reactor, first, Token::Dot)?;
                    self.emit(reactor, second, Token::Dot)?;
                    Ok(Flow::Again)
                }
            },
            Lex::Zero => match byte {
                b'0'..=b'7' => self.shift(cursor, byte, Lex::Oct),
                b'x' | b'X' => self.shift(cursor, byte, Lex::HexPrefix),
                b'.' => self.shift(cursor, byte, Lex::Frac { hex: false }),
                b'e' | b'E' => self.shift(cursor, byte, Lex::ExpMark),
                b'u' | b'U' => self.shift(cursor, byte, Lex::SufU),
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufL),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::Dec => match byte {
                b'0'..=b'9' => self.shift(cursor, byte, Lex::Dec),
                b'.' => self.shift(cursor, byte, Lex::Frac { hex: false }),
                b'e' | b'E' => self.shift(cursor, byte, Lex::ExpMark),
                b'u' | b'U' => self.shift(cursor, byte, Lex::SufU),
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufL),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::Oct => match byte {
                b'0'..=b'7' => self.shift(cursor, byte, Lex::Oct),
                b'.' => self.shift(cursor, byte, Lex::Frac { hex: false }),
                b'e' | b'E' => self.shift(cursor, byte, Lex::ExpMark),
                b'u' | b'U' => self.shift(cursor, byte, Lex::SufU),
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufL),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::HexPrefix => match byte {
                _ if byte.is_ascii_hexdigit() => self.shift(cursor, byte, Lex::Hex),
                _ => Err(Error::ExpectingDigit {
                    at: cursor.clone(),
                }),
            },
            Lex::Hex => match byte {
                _ if byte.is_ascii_hexdigit() => self.shift(cursor, byte, Lex::Hex),
                b'.' => self.shift(cursor, byte, Lex::Frac { hex: true }),
                b'p' | b'P' => self.shift(cursor, byte, Lex::ExpMark),
                b'u' | b'U' => self.shift(cursor, byte, Lex::SufU),
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufL),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::SufU => match byte {
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufUL),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::SufUL => match byte {
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufULL),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::SufL => match byte {
                b'l' | b'L' => self.shift(cursor, byte, Lex::SufLL),
                b'u' | b'U' => self.shift(cursor, byte, Lex::SufLU),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::SufLL => match byte {
                b'u' | b'U' => self.shift(cursor, byte, Lex::SufLU),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::SufULL | Lex::SufLU => match byte {
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_integer(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::Frac { hex } => {
                let digit = if hex {
                    byte.is_ascii_hexdigit()
                } else {
                    byte.is_ascii_digit()
                };
                let exponent = if hex {
                    matches!(byte, b'p' | b'P')
                } else {
                    matches!(byte, b'e' | b'E')
                };
                if digit {
                    self.shift(cursor, byte, Lex::Frac { hex })
                } else if exponent {
                    self.shift(cursor, byte, Lex::ExpMark)
                } else if matches!(byte, b'f' | b'F' | b'l' | b'L') {
                    self.shift(cursor, byte, Lex::FloatSuf)
                } else if is_ident(byte) {
                    self.unexpected(byte, cursor)
                } else {
                    self.emit_float(reactor)?;
                    Ok(Flow::Again)
                }
            }
            Lex::ExpMark => match byte {
                b'0'..=b'9' => self.shift(cursor, byte, Lex::Exp),
                b'+' | b'-' => self.shift(cursor, byte, Lex::ExpSign),
                _ => Err(Error::ExpectingDigit {
                    at: cursor.clone(),
                }),
            },
            Lex::ExpSign => match byte {
                b'0'..=b'9' => self.shift(cursor, byte, Lex::Exp),
                _ => Err(Error::ExpectingDigit {
                    at: cursor.clone(),
                }),
            },
            Lex::Exp => match byte {
                b'0'..=b'9' => self.shift(cursor, byte, Lex::Exp),
                b'f' | b'F' | b'l' | b'L' => self.shift(cursor, byte, Lex::FloatSuf),
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_float(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::FloatSuf => match byte {
                _ if is_ident(byte) => self.unexpected(byte, cursor),
                _ => {
                    self.emit_float(reactor)?;
                    Ok(Flow::Again)
                }
            },
            Lex::Quoted { kind, sub } => self.quoted_char(kind, sub, byte, cursor, reactor),
            Lex::Punct(punct) => self.punct_char(punct, byte, cursor, reactor),
        }
    }

    fn start_char(&mut self, byte: u8, cursor: &Cursor, reactor: &mut EventReactor) -> Result<Flow> {
        let line_start = self.at_line_start;
        self.at_line_start = false;
        match byte {
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Ident;
            }
            b'0' => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Zero;
            }
            b'1'..=b'9' => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Dec;
            }
            b'.' => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Dot;
            }
            b'\'' => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Quoted {
                    kind: QuoteKind::Char,
                    sub: QuoteSub::Body,
                };
            }
            b'"' => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Quoted {
                    kind: QuoteKind::Str,
                    sub: QuoteSub::Body,
                };
            }
            b'<' if self.after_include => {
                self.begin(cursor, byte)?;
                self.lex = Lex::Quoted {
                    kind: QuoteKind::System,
                    sub: QuoteSub::Body,
                };
            }
            b'<' => self.punct(cursor, Punct::Lt)?,
            b'>' => self.punct(cursor, Punct::Gt)?,
            b'+' => self.punct(cursor, Punct::Plus)?,
            b'-' => self.punct(cursor, Punct::Minus)?,
            b'*' => self.punct(cursor, Punct::Star)?,
            b'/' => self.punct(cursor, Punct::Slash)?,
            b'%' => self.punct(cursor, Punct::Percent)?,
            b'&' => self.punct(cursor, Punct::Amp)?,
            b'|' => self.punct(cursor, Punct::Pipe)?,
            b'^' => self.punct(cursor, Punct::Caret)?,
            b'~' => self.punct(cursor, Punct::Tilde)?,
            b'!' => self.punct(cursor, Punct::Bang)?,
            b'=' => self.punct(cursor, Punct::Eq)?,
            b'#' => self.punct(cursor, Punct::Hash { line_start })?,
            b'(' => self.emit(reactor, cursor.clone(), Token::LeftParen)?,
            b')' => self.emit(reactor, cursor.clone(), Token::RightParen)?,
            b'{' => self.emit(reactor, cursor.clone(), Token::LeftBrace)?,
            b'}' => self.emit(reactor, cursor.clone(), Token::RightBrace)?,
            b'[' => self.emit(reactor, cursor.clone(), Token::LeftBracket)?,
            b']' => self.emit(reactor, cursor.clone(), Token::RightBracket)?,
            b',' => self.emit(reactor, cursor.clone(), Token::Comma)?,
            b';' => self.emit(reactor, cursor.clone(), Token::Semicolon)?,
            b':' => self.emit(reactor, cursor.clone(), Token::Colon)?,
            b'?' => self.emit(reactor, cursor.clone(), Token::Question)?,
            _ => {
                return Err(Error::UnexpectedCharacter {
                    byte,
                    at: cursor.clone(),
                })
            }
        }
        Ok(Flow::Consumed)
    }

    fn quoted_char(
        &mut self,
        kind: QuoteKind,
        sub: QuoteSub,
        byte: u8,
        cursor: &Cursor,
        reactor: &mut EventReactor,
    ) -> Result<Flow> {
        if kind == QuoteKind::System {
            self.grow(cursor, byte)?;
            if byte == b'>' {
                let span = self.cache.take()?;
                let text = self.builder.take();
                self.emit(reactor, span, Token::RawSystemString(text))?;
            } else {
                self.lex = Lex::Quoted { kind, sub };
            }
            return Ok(Flow::Consumed);
        }

        let closing = if kind == QuoteKind::Char { b'\'' } else { b'"' };
        match sub {
            QuoteSub::Body => {
                self.grow(cursor, byte)?;
                if byte == closing {
                    let span = self.cache.take()?;
                    let text = self.builder.take();
                    let token = if kind == QuoteKind::Char {
                        Token::RawCharacter(text)
                    } else {
                        Token::RawString(text)
                    };
                    self.emit(reactor, span, token)?;
                } else if byte == b'\\' {
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Escape,
                    };
                } else {
                    self.lex = Lex::Quoted { kind, sub };
                }
                Ok(Flow::Consumed)
            }
            QuoteSub::Escape => match byte {
                b'\'' | b'"' | b'?' | b'\\' | b'a' | b'b' | b'f' | b'n' | b'r' | b't' | b'v' => {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Body,
                    };
                    Ok(Flow::Consumed)
                }
                b'0'..=b'7' => {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Octal(1),
                    };
                    Ok(Flow::Consumed)
                }
                b'x' => {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Hex(false),
                    };
                    Ok(Flow::Consumed)
                }
                b'u' => {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Short(0),
                    };
                    Ok(Flow::Consumed)
                }
                b'U' => {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Long(0),
                    };
                    Ok(Flow::Consumed)
                }
                _ => self.unexpected(byte, cursor),
            },
            QuoteSub::Octal(count) => {
                if (b'0'..=b'7').contains(&byte) && count < 3 {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Octal(count + 1),
                    };
                    Ok(Flow::Consumed)
                } else {
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Body,
                    };
                    Ok(Flow::Again)
                }
            }
            QuoteSub::Hex(seen) => {
                if byte.is_ascii_hexdigit() {
                    self.grow(cursor, byte)?;
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Hex(true),
                    };
                    Ok(Flow::Consumed)
                } else if seen {
                    self.lex = Lex::Quoted {
                        kind,
                        sub: QuoteSub::Body,
                    };
                    Ok(Flow::Again)
                } else {
                    self.unexpected(byte, cursor)
                }
            }
            QuoteSub::Short(count) => {
                if byte.is_ascii_hexdigit() {
                    self.grow(cursor, byte)?;
                    let sub = if count + 1 == 4 {
                        QuoteSub::Body
                    } else {
                        QuoteSub::Short(count + 1)
                    };
                    self.lex = Lex::Quoted { kind, sub };
                    Ok(Flow::Consumed)
                } else {
                    self.unexpected(byte, cursor)
                }
            }
            QuoteSub::Long(count) => {
                if byte.is_ascii_hexdigit() {
                    self.grow(cursor, byte)?;
                    let sub = if count + 1 == 8 {
                        QuoteSub::Body
                    } else {
                        QuoteSub::Long(count + 1)
                    };
                    self.lex = Lex::Quoted { kind, sub };
                    Ok(Flow::Consumed)
                } else {
                    self.unexpected(byte, cursor)
                }
            }
        }
    }

    /// Whitespace below this layer is coalesced even inside literals, so its
    /// width is restored here as spaces.
    fn quoted_space(&mut self, cursor: &Cursor) -> Result<()> {
        let Lex::Quoted { sub, .. } = &mut self.lex else {
            return Ok(());
        };
        match sub {
            QuoteSub::Body => {}
            QuoteSub::Octal(_) | QuoteSub::Hex(true) => *sub = QuoteSub::Body,
            QuoteSub::Escape | QuoteSub::Hex(false) | QuoteSub::Short(_) | QuoteSub::Long(_) => {
                return Err(Error::UnexpectedCharacter {
                    byte: b' ',
                    at: cursor.clone(),
                });
            }
        }
        let width = cursor.end_col.saturating_sub(cursor.begin_col).max(1);
        for _ in 0..width {
            self.builder.push(b' ');
        }
        self.cache.extend(cursor)
    }

    fn punct_char(
        &mut self,
        punct: Punct,
        byte: u8,
        cursor: &Cursor,
        reactor: &mut EventReactor,
    ) -> Result<Flow> {
        match (punct, byte) {
            (Punct::Lt, b'<') => return self.shift_punct(cursor, Punct::LtLt),
            (Punct::Gt, b'>') => return self.shift_punct(cursor, Punct::GtGt),
            (Punct::Hash { .. }, b'#') => {
                self.cache.extend(cursor)?;
                let span = self.cache.take()?;
                self.emit(reactor, span, Token::StringConcat)?;
                return Ok(Flow::Consumed);
            }
            _ => {}
        }
        let compound = match (punct, byte) {
            (Punct::Lt, b'=') => Some(Token::LessThanEqual),
            (Punct::LtLt, b'=') => Some(Token::LeftShiftAssign),
            (Punct::Gt, b'=') => Some(Token::GreaterThanEqual),
            (Punct::GtGt, b'=') => Some(Token::RightShiftAssign),
            (Punct::Plus, b'+') => Some(Token::Increment),
            (Punct::Plus, b'=') => Some(Token::PlusAssign),
            (Punct::Minus, b'-') => Some(Token::Decrement),
            (Punct::Minus, b'=') => Some(Token::MinusAssign),
            (Punct::Minus, b'>') => Some(Token::Arrow),
            (Punct::Star, b'=') => Some(Token::StarAssign),
            (Punct::Slash, b'=') => Some(Token::SlashAssign),
            (Punct::Percent, b'=') => Some(Token::PercentAssign),
            (Punct::Amp, b'&') => Some(Token::LogicalAnd),
            (Punct::Amp, b'=') => Some(Token::AmpersandAssign),
            (Punct::Pipe, b'|') => Some(Token::LogicalOr),
            (Punct::Pipe, b'=') => Some(Token::PipeAssign),
            (Punct::Caret, b'=') => Some(Token::CaretAssign),
            (Punct::Tilde, b'=') => Some(Token::TildeAssign),
            (Punct::Bang, b'=') => Some(Token::NotEqualCompare),
            (Punct::Eq, b'=') => Some(Token::EqualCompare),
            _ => None,
        };
        match compound {
            Some(token) => {
                self.cache.extend(cursor)?;
                let span = self.cache.take()?;
                self.emit(reactor, span, token)?;
                Ok(Flow::Consumed)
            }
            None => {
                self.finish_punct(punct, reactor)?;
                Ok(Flow::Again)
            }
        }
    }

    fn finish_punct(&mut self, punct: Punct, reactor: &mut EventReactor) -> Result<()> {
        let span = self.cache.take()?;
        let token = match punct {
            Punct::Lt => Token::LessThan,
            Punct::LtLt => Token::BitshiftLeft,
            Punct::Gt => Token::GreaterThan,
            Punct::GtGt => Token::BitshiftRight,
            Punct::Plus => Token::Plus,
            Punct::Minus => Token::Minus,
            Punct::Star => Token::Star,
            Punct::Slash => Token::ForwardSlash,
            Punct::Percent => Token::Percent,
            Punct::Amp => Token::Ampersand,
            Punct::Pipe => Token::Pipe,
            Punct::Caret => Token::Caret,
            Punct::Tilde => Token::Tilde,
            Punct::Bang => Token::Not,
            Punct::Eq => Token::EqualAssign,
            Punct::Hash { line_start } => {
                if line_start {
                    self.in_directive = true;
                }
                Token::Hash
            }
        };
        self.emit(reactor, span, token)
    }

    /// Finishes any pending token at a whitespace, newline, or end-of-input
    /// boundary. Quoted literals never come through here; their boundaries
    /// are the closing quote or an error.
    fn finish(&mut self, at: &Cursor, reactor: &mut EventReactor) -> Result<()> {
        match mem::replace(&mut self.lex, Lex::Start) {
            Lex::Start => Ok(()),
            Lex::Ident => self.emit_ident(reactor),
            Lex::Dot => {
                let span = self.cache.take()?;
                self.builder.clear();
                self.emit(reactor, span, Token::Dot)
            }
            Lex::DotDot { first, second } => {
                self.cache.clear();
                self.builder.clear();
                self.emit(reactor, first, Token::Dot)?;
                self.emit(reactor, second, Token::Dot)
            }
            Lex::Zero
            | Lex::Dec
            | Lex::Oct
            | Lex::Hex
            | Lex::SufU
            | Lex::SufUL
            | Lex::SufULL
            | Lex::SufL
            | Lex::SufLL
            | Lex::SufLU => self.emit_integer(reactor),
            Lex::HexPrefix | Lex::ExpMark | Lex::ExpSign => {
                self.cache.clear();
                self.builder.clear();
                Err(Error::ExpectingDigit { at: at.clone() })
            }
            Lex::Frac { .. } | Lex::Exp | Lex::FloatSuf => self.emit_float(reactor),
            Lex::Quoted { .. } => Err(Error::UnexpectedEof { at: at.clone() }),
            Lex::Punct(punct) => self.finish_punct(punct, reactor),
        }
    }

    /// Closes a directive line: emits the end-of-directive token and, for
    /// `#line`, sends the override down to the file/line filter.
    fn end_directive(&mut self, cursor: &Cursor, reactor: &mut EventReactor) -> Result<()> {
        if self.in_directive {
            self.emit(reactor, cursor.clone(), Token::End)?;
            self.in_directive = false;
            if self.directive == Some(Directive::Line) {
                if let Some(line) = self.line_arg {
                    self.bus.send(Message::FileLineOverride {
                        file: self.file_arg.take(),
                        line,
                    })?;
                }
            }
        }
        self.directive = None;
        self.line_arg = None;
        self.file_arg = None;
        self.after_hash = false;
        self.after_include = false;
        Ok(())
    }

    /// Starts a multi-character token at `cursor`.
    fn begin(&mut self, cursor: &Cursor, byte: u8) -> Result<()> {
        self.cache.set(cursor.clone())?;
        self.builder.push(byte);
        Ok(())
    }

    /// Adds one character to the pending token.
    fn grow(&mut self, cursor: &Cursor, byte: u8) -> Result<()> {
        self.cache.extend(cursor)?;
        self.builder.push(byte);
        Ok(())
    }

    /// Grows the pending token and moves to `next`.
    fn shift(&mut self, cursor: &Cursor, byte: u8, next: Lex) -> Result<Flow> {
        self.grow(cursor, byte)?;
        self.lex = next;
        Ok(Flow::Consumed)
    }

    /// Starts a punctuator token at `cursor`.
    fn punct(&mut self, cursor: &Cursor, punct: Punct) -> Result<()> {
        self.cache.set(cursor.clone())?;
        self.lex = Lex::Punct(punct);
        Ok(())
    }

    /// Extends a punctuator and stays in the punctuator family.
    fn shift_punct(&mut self, cursor: &Cursor, punct: Punct) -> Result<Flow> {
        self.cache.extend(cursor)?;
        self.lex = Lex::Punct(punct);
        Ok(Flow::Consumed)
    }

    fn unexpected(&mut self, byte: u8, cursor: &Cursor) -> Result<Flow> {
        Err(Error::UnexpectedCharacter {
            byte,
            at: cursor.clone(),
        })
    }

    fn emit_ident(&mut self, reactor: &mut EventReactor) -> Result<()> {
        let span = self.cache.take()?;
        let text = self.builder.take();
        let token = if self.after_hash {
            match Directive::from_name(&text) {
                Some(directive) => Token::Directive(directive),
                None => self.keyword_or_ident(text),
            }
        } else {
            self.keyword_or_ident(text)
        };
        self.emit(reactor, span, token)
    }

    fn keyword_or_ident(&self, text: BString) -> Token {
        let keyword = std::str::from_utf8(&text)
            .ok()
            .and_then(|text| self.keywords.find(text));
        match keyword {
            Some(&keyword) => Token::Keyword(keyword),
            None => Token::Identifier(text),
        }
    }

    fn emit_integer(&mut self, reactor: &mut EventReactor) -> Result<()> {
        let span = self.cache.take()?;
        let digits = self.builder.take();
        let signed = !digits.iter().any(|&byte| byte == b'u' || byte == b'U');
        self.emit(
            reactor,
            span,
            Token::RawInteger(RawIntegerToken { digits, signed }),
        )
    }

    fn emit_float(&mut self, reactor: &mut EventReactor) -> Result<()> {
        let span = self.cache.take()?;
        let text = self.builder.take();
        self.emit(
            reactor,
            span,
            Token::RawFloat(RawFloatToken { text, signed: true }),
        )
    }

    /// Broadcasts a token and rolls the token-context flags forward.
    fn emit(&mut self, reactor: &mut EventReactor, cursor: Cursor, token: Token) -> Result<()> {
        self.after_hash = matches!(&token, Token::Hash);
        self.after_include = matches!(&token, Token::Directive(Directive::Include));
        if let Token::Directive(directive) = &token {
            self.directive = Some(*directive);
        }
        if self.in_directive && self.directive == Some(Directive::Line) {
            match &token {
                Token::RawInteger(raw) if self.line_arg.is_none() => {
                    let line = IntegerToken::from_raw(&raw.digits)?.to_i32()?;
                    self.line_arg = Some(line);
                }
                Token::RawString(text) if self.file_arg.is_none() && text.len() >= 2 => {
                    let name = &text[1..text.len() - 1];
                    self.file_arg = Some(String::from_utf8_lossy(name).into_owned());
                }
                _ => {}
            }
        }
        reactor.broadcast(&Event::token(cursor, token))
    }
}

impl PreprocessorScanner {
    /// Creates the scanner and its whole parent chain.
    pub fn new() -> Result<Self> {
        let parent = NewlinePreservingWhitespaceFilter::new()?;
        let bus = parent.message_bus().clone();

        let mut keywords = AvlTree::new();
        for &(text, keyword) in Keyword::ALL {
            keywords.insert(text, keyword);
        }

        let state = Rc::new(RefCell::new(TokenState {
            lex: Lex::Start,
            builder: StringBuilder::new(),
            cache: FilePositionCache::new(),
            keywords,
            in_directive: false,
            at_line_start: true,
            after_hash: false,
            after_include: false,
            directive: None,
            line_arg: None,
            file_arg: None,
            bus: bus.clone(),
        }));
        let reactor = Rc::new(RefCell::new(EventReactor::new()));

        {
            let state = state.clone();
            let reactor = reactor.clone();
            parent.subscribe_newline_preserving_whitespace_filter(move |event| {
                state.borrow_mut().on_event(event, &mut reactor.borrow_mut())
            })?;
        }

        bus.interpose(move |mut parent_handler| {
            Box::new(move |message| match message {
                Message::Subscribe {
                    layer: Layer::PreprocessorScanner,
                    handler,
                } => {
                    reactor.borrow_mut().add(handler);
                    Ok(())
                }
                other => parent_handler(other),
            })
        });

        debug!("preprocessor scanner stack constructed");
        Ok(PreprocessorScanner { parent, bus })
    }
}

impl AbstractParser for PreprocessorScanner {
    fn message_bus(&self) -> &MessageBus {
        &self.bus
    }

    fn run(&mut self) -> Result<()> {
        self.parent.run()
    }
}
