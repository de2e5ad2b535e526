//! Numeric and interpolated-string literals.
//!
//! Both are decoded once, when the parser builds the node, so rendering only
//! has to print the already-classified pieces.

use std::fmt;

use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumType {
    Byte,
    Short,
    Int,
    Long,
    UByte,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
}

impl NumType {
    pub fn is_float(self) -> bool {
        matches!(self, NumType::Float | NumType::Double)
    }

    pub fn bits(self) -> u32 {
        match self {
            NumType::Byte | NumType::UByte => 8,
            NumType::Short | NumType::UShort => 16,
            NumType::Int | NumType::UInt | NumType::Float => 32,
            NumType::Long | NumType::ULong | NumType::Double => 64,
        }
    }

    /// Inclusive value range of the integer types.
    fn range(self) -> (i128, i128) {
        match self {
            NumType::Byte => (i8::MIN.into(), i8::MAX.into()),
            NumType::Short => (i16::MIN.into(), i16::MAX.into()),
            NumType::Int => (i32::MIN.into(), i32::MAX.into()),
            NumType::Long => (i64::MIN.into(), i64::MAX.into()),
            NumType::UByte => (0, u8::MAX.into()),
            NumType::UShort => (0, u16::MAX.into()),
            NumType::UInt => (0, u32::MAX.into()),
            NumType::ULong => (0, u64::MAX.into()),
            NumType::Float | NumType::Double => (i128::MIN, i128::MAX),
        }
    }

    fn fits(self, value: i128) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }

    /// C++ literal suffix for an explicitly suffixed literal.
    fn cxx_suffix(self) -> &'static str {
        match self {
            NumType::Byte | NumType::Short | NumType::Int | NumType::Double => "",
            NumType::Long => "LL",
            NumType::UByte | NumType::UShort | NumType::UInt => "U",
            NumType::ULong => "ULL",
            NumType::Float => "F",
        }
    }
}

impl fmt::Display for NumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumType::Byte => "byte",
            NumType::Short => "short",
            NumType::Int => "int",
            NumType::Long => "long",
            NumType::UByte => "ubyte",
            NumType::UShort => "ushort",
            NumType::UInt => "uint",
            NumType::ULong => "ulong",
            NumType::Float => "float",
            NumType::Double => "double",
        };
        f.write_str(name)
    }
}

/// Type suffixes, matched case-insensitively, longest first.
static SUFFIXES: phf::Map<&'static str, NumType> = phf::phf_map! {
    "u8" => NumType::UByte,
    "u16" => NumType::UShort,
    "u32" => NumType::UInt,
    "u" => NumType::UInt,
    "u64" => NumType::ULong,
    "ul" => NumType::ULong,
    "i8" => NumType::Byte,
    "i16" => NumType::Short,
    "i32" => NumType::Int,
    "i64" => NumType::Long,
    "l" => NumType::Long,
    "ll" => NumType::Long,
    "f32" => NumType::Float,
    "f" => NumType::Float,
    "f64" => NumType::Double,
    "d" => NumType::Double,
};

const LONGEST_SUFFIX: usize = 3;

const UNSIGNED_PROBE: &[NumType] = &[NumType::UByte, NumType::UShort, NumType::UInt, NumType::ULong];
const SIGNED_PROBE: &[NumType] = &[NumType::Byte, NumType::Short, NumType::Int, NumType::Long];
const BASED_PROBE: &[NumType] = &[
    NumType::Byte,
    NumType::Short,
    NumType::Int,
    NumType::Long,
    NumType::ULong,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Base {
    Binary,
    Octal,
    Decimal,
    Hex,
}

impl Base {
    pub fn radix(self) -> u32 {
        match self {
            Base::Binary => 2,
            Base::Octal => 8,
            Base::Decimal => 10,
            Base::Hex => 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("invalid numeric literal `{0}`")]
    InvalidDigits(String),
    #[error("numeric literal `{literal}` does not fit in {ty}")]
    OutOfRange { literal: String, ty: NumType },
    #[error("numeric literal `{0}` does not fit in any integer type")]
    TooLarge(String),
}

/// A classified numeric literal.
#[derive(Clone, Debug, PartialEq)]
pub struct NumberLiteral {
    pub negative: bool,
    pub base: Base,
    /// Digits without prefix, suffix or separators.
    pub digits: String,
    pub magnitude: u128,
    pub ty: NumType,
    /// Whether `ty` came from a suffix rather than inference.
    pub explicit: bool,
}

impl NumberLiteral {
    /// Classifies the lexeme `raw`, negated when `negative` is set (a folded
    /// unary minus).
    pub fn parse(raw: &str, negative: bool) -> Result<NumberLiteral, NumberError> {
        let invalid = || NumberError::InvalidDigits(signed(raw, negative));
        let lower = raw.to_ascii_lowercase();
        let (base, prefix) = match lower.get(..2) {
            Some("0x") => (Base::Hex, 2),
            Some("0b") => (Base::Binary, 2),
            Some("0o") => (Base::Octal, 2),
            _ => (Base::Decimal, 0),
        };

        let mut suffix = None;
        for len in (1..=LONGEST_SUFFIX).rev() {
            if lower.len() <= prefix + len {
                continue;
            }
            let candidate = &lower[lower.len() - len..];
            let Some(&ty) = SUFFIXES.get(candidate) else {
                continue;
            };
            if base == Base::Hex && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
                continue;
            }
            suffix = Some((len, ty));
            break;
        }

        let suffix_len = suffix.map_or(0, |(len, _)| len);
        let digits: String = raw[prefix..raw.len() - suffix_len]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        if digits.is_empty() {
            return Err(invalid());
        }

        let has_fraction = base == Base::Decimal && digits.contains(['.', 'e', 'E']);
        let float_suffix = suffix.is_some_and(|(_, ty)| ty.is_float());

        if has_fraction || float_suffix {
            if base != Base::Decimal || suffix.is_some_and(|(_, ty)| !ty.is_float()) {
                return Err(invalid());
            }
            digits.parse::<f64>().map_err(|_| invalid())?;
            return Ok(NumberLiteral {
                negative,
                base,
                digits,
                magnitude: 0,
                ty: suffix.map_or(NumType::Double, |(_, ty)| ty),
                explicit: suffix.is_some(),
            });
        }

        let magnitude = u128::from_str_radix(&digits, base.radix()).map_err(|_| invalid())?;
        let value = i128::try_from(magnitude)
            .map(|m| if negative { -m } else { m })
            .map_err(|_| NumberError::TooLarge(signed(raw, negative)))?;

        let ty = if let Some((_, ty)) = suffix {
            if !ty.fits(value) {
                return Err(NumberError::OutOfRange {
                    literal: signed(raw, negative),
                    ty,
                });
            }
            ty
        } else {
            let probe = match (negative, base) {
                (false, Base::Decimal) => UNSIGNED_PROBE,
                (true, _) => SIGNED_PROBE,
                (false, _) => BASED_PROBE,
            };
            probe
                .iter()
                .copied()
                .find(|ty| ty.fits(value))
                .ok_or_else(|| NumberError::TooLarge(signed(raw, negative)))?
        };

        Ok(NumberLiteral {
            negative,
            base,
            digits,
            magnitude,
            ty,
            explicit: suffix.is_some(),
        })
    }

    /// C++ spelling. Negative based literals become the two's complement bit
    /// pattern at the literal's width.
    pub fn render(&self) -> String {
        let sign = if self.negative { "-" } else { "" };
        let suffix = if self.explicit { self.ty.cxx_suffix() } else { "" };

        if self.ty.is_float() {
            let mut text = self.digits.clone();
            if self.ty == NumType::Float && !text.contains(['.', 'e', 'E']) {
                text.push_str(".0");
            }
            return format!("{sign}{text}{suffix}");
        }

        if self.negative && self.base != Base::Decimal {
            let mask = (1_u128 << self.ty.bits()) - 1;
            let encoded = (!self.magnitude).wrapping_add(1) & mask;
            return match self.base {
                Base::Binary => format!("0b{encoded:b}{suffix}"),
                Base::Octal => format!("0{encoded:o}{suffix}"),
                _ => format!("0x{encoded:X}{suffix}"),
            };
        }

        let digits = &self.digits;
        match self.base {
            // A leading zero would read as octal.
            Base::Decimal => format!("{sign}{}{suffix}", self.magnitude),
            Base::Hex => format!("0x{digits}{suffix}"),
            Base::Binary => format!("0b{digits}{suffix}"),
            Base::Octal => format!("0{digits}{suffix}"),
        }
    }
}

fn signed(raw: &str, negative: bool) -> String {
    if negative {
        format!("-{raw}")
    } else {
        raw.to_owned()
    }
}

/// One fragment of an interpolated string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece<'a> {
    /// Plain text, with `{{`/`}}` already collapsed to single braces.
    Text(String),
    /// Source text of an embedded expression.
    Expr(&'a str),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InterpolationError {
    #[error("unclosed `{{` in interpolated string")]
    Unclosed,
    #[error("empty `{{}}` in interpolated string")]
    Empty,
    #[error("unmatched `}}` in interpolated string")]
    Unmatched,
}

/// Splits the contents of `$"..."` into text and expression fragments.
/// Expressions are `{...}` or `${...}` and may nest braces.
pub fn split_interpolation(content: &str) -> Result<Vec<Piece<'_>>, InterpolationError> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut chars = content.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);
        match (c, next) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                text.push(c);
            }
            ('$', Some('{')) => (),
            ('\\', Some(escaped)) => {
                chars.next();
                text.push(c);
                text.push(escaped);
            }
            ('{', _) => {
                let close = closing_brace(content, i).ok_or(InterpolationError::Unclosed)?;
                let expr = content[i + 1..close].trim();
                if expr.is_empty() {
                    return Err(InterpolationError::Empty);
                }
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                pieces.push(Piece::Expr(expr));
                while chars.next_if(|&(j, _)| j <= close).is_some() {}
            }
            ('}', _) => return Err(InterpolationError::Unmatched),
            _ => text.push(c),
        }
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(pieces)
}

/// Offset of the `}` matching the `{` at `open`, skipping quoted text.
fn closing_brace(content: &str, open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in content[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => (),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(raw: &str, negative: bool) -> String {
        NumberLiteral::parse(raw, negative).unwrap().render()
    }

    #[test]
    fn test_inferred_types() {
        let cases = [
            ("0", false, NumType::UByte),
            ("255", false, NumType::UByte),
            ("256", false, NumType::UShort),
            ("70000", false, NumType::UInt),
            ("5000000000", false, NumType::ULong),
            ("128", true, NumType::Byte),
            ("129", true, NumType::Short),
            ("0x7F", false, NumType::Byte),
            ("0xFF", false, NumType::Short),
            ("0xFFFFFFFFFFFFFFFF", false, NumType::ULong),
            ("1.5", false, NumType::Double),
            ("1e9", false, NumType::Double),
        ];
        for (raw, negative, ty) in cases {
            let literal = NumberLiteral::parse(raw, negative).unwrap();
            assert_eq!(literal.ty, ty, "input: {raw}");
            assert!(!literal.explicit);
        }
    }

    #[test]
    fn test_suffixes() {
        let cases = [
            ("7UL", "7ULL"),
            ("10u8", "10U"),
            ("100i64", "100LL"),
            ("12ll", "12LL"),
            ("3i32", "3"),
            ("10f", "10.0F"),
            ("1.5f32", "1.5F"),
            ("2.5d", "2.5"),
            ("0xFF_u8", "0xFFU"),
            ("1_000", "1000"),
        ];
        for (raw, expected) in cases {
            assert_eq!(render(raw, false), expected, "input: {raw}");
        }
    }

    #[test]
    fn test_decimal_leading_zeros_are_dropped() {
        let cases = [("010", false, "10"), ("007", true, "-7"), ("00", false, "0")];
        for (raw, negative, expected) in cases {
            assert_eq!(render(raw, negative), expected, "input: {raw}");
        }
        assert_eq!(render("0_10u16", false), "10U");
    }

    #[test]
    fn test_hex_digits_are_not_suffixes() {
        let literal = NumberLiteral::parse("0x1f32", false).unwrap();
        assert!(!literal.explicit);
        assert_eq!(literal.magnitude, 0x1f32);
        assert_eq!(literal.render(), "0x1f32");
        // `d` is a hex digit too.
        assert_eq!(NumberLiteral::parse("0xad", false).unwrap().magnitude, 0xad);
    }

    #[test]
    fn test_twos_complement() {
        let cases = [
            ("0x1", "0xFF"),
            ("0x80", "0x80"),
            ("0xFF", "0xFF01"),
            ("0b1", "0b11111111"),
            ("0o1", "0377"),
            ("0x1i32", "0xFFFFFFFF"),
            ("0x1l", "0xFFFFFFFFFFFFFFFFLL"),
        ];
        for (raw, expected) in cases {
            assert_eq!(render(raw, true), expected, "input: -{raw}");
        }
    }

    #[test]
    fn test_decimal_keeps_minus() {
        assert_eq!(render("5", true), "-5");
        assert_eq!(render("2.5", true), "-2.5");
        assert_eq!(render("0o17", false), "017");
        assert_eq!(render("0b1010", false), "0b1010");
    }

    #[test]
    fn test_number_errors() {
        let cases = [
            ("300", false, "numeric literal `300u8` does not fit in ubyte", "u8"),
            ("1", true, "numeric literal `-1u` does not fit in uint", "u"),
            ("99999999999999999999", false, "", ""),
            ("0x", false, "invalid numeric literal `0x`", ""),
            ("12abc", false, "invalid numeric literal `12abc`", ""),
            ("1.5u8", false, "invalid numeric literal `1.5u8`", ""),
        ];
        for (raw, negative, expected, suffix) in cases {
            let raw = format!("{raw}{suffix}");
            let error = NumberLiteral::parse(&raw, negative).unwrap_err();
            if expected.is_empty() {
                assert!(matches!(error, NumberError::TooLarge(_)), "input: {raw}");
            } else {
                assert_eq!(error.to_string(), expected, "input: {raw}");
            }
        }
    }

    #[test]
    fn test_split_interpolation() {
        let pieces = split_interpolation("Hello, {name}! Today is {day}.").unwrap();
        assert_eq!(
            pieces,
            [
                Piece::Text("Hello, ".into()),
                Piece::Expr("name"),
                Piece::Text("! Today is ".into()),
                Piece::Expr("day"),
                Piece::Text(".".into()),
            ]
        );
    }

    #[test]
    fn test_split_interpolation_nesting_and_escapes() {
        assert_eq!(
            split_interpolation(r#"{{x}} = ${f({a: 1}, "}")}"#).unwrap(),
            [
                Piece::Text("{x} = ".into()),
                Piece::Expr(r#"f({a: 1}, "}")"#),
            ]
        );
        assert_eq!(
            split_interpolation(r#"say \"{ w }\""#).unwrap(),
            [
                Piece::Text(r#"say \""#.into()),
                Piece::Expr("w"),
                Piece::Text(r#"\""#.into()),
            ]
        );
    }

    #[test]
    fn test_split_interpolation_errors() {
        assert_eq!(split_interpolation("a {b"), Err(InterpolationError::Unclosed));
        assert_eq!(split_interpolation("a { }"), Err(InterpolationError::Empty));
        assert_eq!(split_interpolation("a } b"), Err(InterpolationError::Unmatched));
    }
}
