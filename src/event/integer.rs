//! Interpreted integer tokens and checked conversions.
//!
//! The scanner emits integer literals in raw textual form; collaborators that
//! need host values convert them here. [`IntegerToken::from_raw`] parses a
//! raw lexeme (radix prefix, digits, suffix) and the `to_*` methods narrow
//! the value with range checks.

use paste::paste;

use crate::error::{Error, Result};

/// The C integer kinds, including the fixed-width aliases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    Char,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl IntegerKind {
    /// Whether values of this kind are signed.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::Char
                | IntegerKind::Short
                | IntegerKind::Int
                | IntegerKind::Long
                | IntegerKind::LongLong
                | IntegerKind::Int8
                | IntegerKind::Int16
                | IntegerKind::Int32
                | IntegerKind::Int64,
        )
    }
}

/// An integer value wide enough for any C integer constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerValue {
    Signed(i64),
    Unsigned(u64),
}

/// An interpreted integer constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntegerToken {
    pub kind: IntegerKind,
    pub value: IntegerValue,
}

macro_rules! conversions {
    ($($ty:ident),* $(,)?) => {
        $(
        paste! {
            #[doc = concat!("Narrows the value to `", stringify!($ty), "`.")]
            ///
            /// Returns [`Error::BadIntegerConversion`] when it does not fit.
            pub fn [<to_ $ty>](&self) -> Result<$ty> {
                match self.value {
                    IntegerValue::Signed(v) => {
                        $ty::try_from(v).map_err(|_| Error::BadIntegerConversion)
                    }
                    IntegerValue::Unsigned(v) => {
                        $ty::try_from(v).map_err(|_| Error::BadIntegerConversion)
                    }
                }
            }
        }
        )*
    };
}

impl IntegerToken {
    /// Parses a raw integer lexeme: decimal, octal (`0` prefix), or
    /// hexadecimal (`0x`/`0X` prefix) digits followed by an optional
    /// `u`/`l`/`ll` suffix in either order and any case.
    ///
    /// The suffix picks the kind the same way a C compiler would pick the
    /// minimum kind named by the suffix: no suffix is `int`, `u` is
    /// `unsigned int`, `l`/`ll` widen to the long kinds. Values that
    /// overflow 64 bits, digits invalid for the radix, and malformed
    /// suffixes are [`Error::BadIntegerConversion`].
    pub fn from_raw(lexeme: &[u8]) -> Result<IntegerToken> {
        let (radix, digits) = match lexeme {
            [b'0', b'x' | b'X', rest @ ..] => (16u64, rest),
            [b'0', rest @ ..] if !rest.is_empty() => (8, rest),
            _ => (10, lexeme),
        };

        let mut value: u64 = 0;
        // The octal prefix `0` is itself a digit of the literal.
        let mut seen = usize::from(radix == 8);
        let mut suffix = &digits[digits.len()..];
        for (i, &byte) in digits.iter().enumerate() {
            let digit = match byte {
                b'0'..=b'9' => u64::from(byte - b'0'),
                b'a'..=b'f' => u64::from(byte - b'a') + 10,
                b'A'..=b'F' => u64::from(byte - b'A') + 10,
                b'u' | b'U' | b'l' | b'L' => {
                    suffix = &digits[i..];
                    break;
                }
                _ => return Err(Error::BadIntegerConversion),
            };
            if digit >= radix {
                return Err(Error::BadIntegerConversion);
            }
            value = value
                .checked_mul(radix)
                .and_then(|v| v.checked_add(digit))
                .ok_or(Error::BadIntegerConversion)?;
            seen += 1;
        }
        if seen == 0 {
            return Err(Error::BadIntegerConversion);
        }

        let (unsigned, longs) = classify_suffix(suffix)?;
        let kind = match (unsigned, longs) {
            (false, 0) => IntegerKind::Int,
            (true, 0) => IntegerKind::UnsignedInt,
            (false, 1) => IntegerKind::Long,
            (true, 1) => IntegerKind::UnsignedLong,
            (false, _) => IntegerKind::LongLong,
            (true, _) => IntegerKind::UnsignedLongLong,
        };
        let value = if unsigned {
            IntegerValue::Unsigned(value)
        } else {
            let value = i64::try_from(value).map_err(|_| Error::BadIntegerConversion)?;
            IntegerValue::Signed(value)
        };
        Ok(IntegerToken { kind, value })
    }

    /// Whether this token's kind is signed.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.kind.is_signed()
    }

    /// Narrows the value to a C `char` (signed on this implementation).
    pub fn to_char(&self) -> Result<i8> {
        self.to_i8()
    }

    conversions!(i8, u8, i16, u16, i32, u32, i64, u64);
}

/// Splits an integer suffix into (has `u`, count of `l`), rejecting any
/// arrangement other than `[uU]?([lL]|[lL][lL])?` or `([lL]|[lL][lL])[uU]?`.
fn classify_suffix(suffix: &[u8]) -> Result<(bool, u8)> {
    match suffix {
        b"" => Ok((false, 0)),
        [u] if matches!(u, b'u' | b'U') => Ok((true, 0)),
        [l] if matches!(l, b'l' | b'L') => Ok((false, 1)),
        [u, l] | [l, u]
            if matches!(u, b'u' | b'U') && matches!(l, b'l' | b'L') && u != l =>
        {
            Ok((true, 1))
        }
        [l1, l2] if matches!(l1, b'l' | b'L') && matches!(l2, b'l' | b'L') => Ok((false, 2)),
        [u, l1, l2] | [l1, l2, u]
            if matches!(u, b'u' | b'U')
                && matches!(l1, b'l' | b'L')
                && matches!(l2, b'l' | b'L') =>
        {
            Ok((true, 2))
        }
        _ => Err(Error::BadIntegerConversion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parses_to_int() {
        let token = IntegerToken::from_raw(b"42").unwrap();
        assert_eq!(token.kind, IntegerKind::Int);
        assert_eq!(token.value, IntegerValue::Signed(42));
        assert!(token.is_signed());
    }

    #[test]
    fn octal_and_hex_radices() {
        let token = IntegerToken::from_raw(b"0755").unwrap();
        assert_eq!(token.value, IntegerValue::Signed(0o755));
        let token = IntegerToken::from_raw(b"0xFF").unwrap();
        assert_eq!(token.value, IntegerValue::Signed(255));
        let token = IntegerToken::from_raw(b"0").unwrap();
        assert_eq!(token.value, IntegerValue::Signed(0));
    }

    #[test]
    fn suffixes_pick_kinds() {
        assert_eq!(
            IntegerToken::from_raw(b"1u").unwrap().kind,
            IntegerKind::UnsignedInt,
        );
        assert_eq!(
            IntegerToken::from_raw(b"1UL").unwrap().kind,
            IntegerKind::UnsignedLong,
        );
        assert_eq!(
            IntegerToken::from_raw(b"1ll").unwrap().kind,
            IntegerKind::LongLong,
        );
        assert_eq!(
            IntegerToken::from_raw(b"0x10llu").unwrap().kind,
            IntegerKind::UnsignedLongLong,
        );
    }

    #[test]
    fn malformed_lexemes_are_rejected() {
        assert!(matches!(
            IntegerToken::from_raw(b"08"),
            Err(Error::BadIntegerConversion),
        ));
        assert!(matches!(
            IntegerToken::from_raw(b"1q"),
            Err(Error::BadIntegerConversion),
        ));
        assert!(matches!(
            IntegerToken::from_raw(b"1ullu"),
            Err(Error::BadIntegerConversion),
        ));
        assert!(matches!(
            IntegerToken::from_raw(b"99999999999999999999999"),
            Err(Error::BadIntegerConversion),
        ));
    }

    #[test]
    fn narrowing_checks_range() {
        let token = IntegerToken::from_raw(b"300").unwrap();
        assert!(matches!(token.to_u8(), Err(Error::BadIntegerConversion)));
        assert_eq!(token.to_u16().unwrap(), 300);
        assert_eq!(token.to_i32().unwrap(), 300);

        let token = IntegerToken::from_raw(b"0xffffffffffffffffu").unwrap();
        assert_eq!(token.to_u64().unwrap(), u64::MAX);
        assert!(matches!(token.to_i64(), Err(Error::BadIntegerConversion)));
    }
}
