use thiserror::Error;

/// Surface base-type names and their runtime counterparts. Names missing
/// from this table (user classes, `std::` paths) pass through unchanged.
pub static TYPE_MAP: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "byte" => "EspressoByte",
    "short" => "EspressoShort",
    "int" => "EspressoInt",
    "long" => "EspressoLong",
    "dlong" => "EspressoLongLong",
    "ubyte" => "EspressoUByte",
    "ushort" => "EspressoUShort",
    "uint" => "EspressoUInt",
    "ulong" => "EspressoULong",
    "dulong" => "EspressoULongLong",
    "float8" => "EspressoFloat8",
    "float16" => "EspressoFloat16",
    "float" => "EspressoFloat",
    "double" => "EspressoDouble",
    "decimal" => "EspressoDecimal",
    "fixed16_16" => "EspressoFixed16_16",
    "fixed32_32" => "EspressoFixed32_32",
    "bin" => "EspressoBits",
    "hex" => "EspressoBits",
    "oct" => "EspressoBits",
    "char" => "EspressoChar",
    "string" => "EspressoString",
    "bool" => "bool",
    "void" => "void",
    "auto" => "auto",
    "any" => "EspressoAny",
    "list" => "EspressoList",
    "collection" => "EspressoCollection",
    "map" => "EspressoDict",
    "set" => "EspressoSet",
    "tuple" => "EspressoTuple",
    "union" => "EspressoUnion",
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeMapError {
    #[error("unmatched `{found}` at offset {offset} in type `{text}`")]
    Unmatched {
        found: char,
        offset: usize,
        text: String,
    },
    #[error("unclosed `{open}` in type `{text}`")]
    Unclosed { open: char, text: String },
}

/// Rewrites a surface type (`map[string, list[int]]`) into its C++
/// spelling (`EspressoDict<EspressoString, EspressoList<EspressoInt>>`).
///
/// Already-angled generics (`list<int>`) are accepted too, so converting
/// converted text is a no-op.
pub fn convert(text: &str) -> Result<String, TypeMapError> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut word = String::new();
    let mut stack = Vec::new();
    let mut spaced = false;

    for (offset, c) in text.char_indices() {
        match c {
            '[' | '<' => {
                flush(&mut out, &mut word, &mut spaced);
                stack.push(c);
                out.push('<');
            }
            ']' | '>' => {
                flush(&mut out, &mut word, &mut spaced);
                let open = if c == ']' { '[' } else { '<' };
                if stack.pop() != Some(open) {
                    return Err(TypeMapError::Unmatched {
                        found: c,
                        offset,
                        text: text.to_owned(),
                    });
                }
                out.push('>');
                spaced = false;
            }
            ',' => {
                flush(&mut out, &mut word, &mut spaced);
                out.push_str(", ");
                spaced = false;
            }
            c if c.is_whitespace() => {
                flush(&mut out, &mut word, &mut spaced);
                spaced = true;
            }
            c if c.is_alphanumeric() || matches!(c, '_' | ':' | '.') => word.push(c),
            other => {
                flush(&mut out, &mut word, &mut spaced);
                separate(&mut out, &mut spaced);
                out.push(other);
            }
        }
    }
    flush(&mut out, &mut word, &mut spaced);

    if let Some(open) = stack.pop() {
        return Err(TypeMapError::Unclosed {
            open,
            text: text.to_owned(),
        });
    }
    Ok(out)
}

fn flush(out: &mut String, word: &mut String, spaced: &mut bool) {
    if word.is_empty() {
        return;
    }
    separate(out, spaced);
    out.push_str(TYPE_MAP.get(word.as_str()).copied().unwrap_or(word));
    word.clear();
}

/// Re-emits one space for whitespace that separated two items.
fn separate(out: &mut String, spaced: &mut bool) {
    if *spaced && !out.is_empty() && !out.ends_with(['<', ' ']) {
        out.push(' ');
    }
    *spaced = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_convert() {
        let cases = [
            ("int", "EspressoInt"),
            ("list[int]", "EspressoList<EspressoInt>"),
            ("list<int>", "EspressoList<EspressoInt>"),
            (
                "map[string, list[int]]",
                "EspressoDict<EspressoString, EspressoList<EspressoInt>>",
            ),
            ("map[string,int]", "EspressoDict<EspressoString, EspressoInt>"),
            ("Vector", "Vector"),
            ("io::File", "io::File"),
            ("A[B[C], D]", "A<B<C>, D>"),
            ("Box<T = int>", "Box<T = EspressoInt>"),
            ("const string", "const EspressoString"),
            ("array[int, 3]", "array<EspressoInt, 3>"),
        ];
        for (input, expected) in cases {
            assert_eq!(convert(input).unwrap(), expected, "input: {input}");
        }
    }

    #[test]
    fn test_convert_is_idempotent() {
        for input in ["list[map[string, int]]", "tuple[int, float, Point]", "set<ulong>"] {
            let once = convert(input).unwrap();
            assert_eq!(convert(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_bracket_mismatch() {
        assert_eq!(
            convert("list[int>").unwrap_err(),
            TypeMapError::Unmatched {
                found: '>',
                offset: 8,
                text: "list[int>".into(),
            }
        );
        assert_eq!(
            convert("list[list[int]").unwrap_err(),
            TypeMapError::Unclosed {
                open: '[',
                text: "list[list[int]".into(),
            }
        );
        assert!(convert("int]").is_err());
    }
}
