use espresso::{transpile, Config, Error, LexError, ParseErrorKind};
use indoc::indoc;
use pretty_assertions::assert_eq;

static SHOWCASE: &str = include_str!("../demos/showcase.esp");

#[test]
fn test_showcase_transpiles() {
    let cpp = transpile(SHOWCASE, &Config::default()).unwrap();

    let includes: Vec<_> = cpp.lines().take_while(|line| !line.is_empty()).collect();
    assert_eq!(
        includes,
        [
            "#include <format>",
            "#include <runtime.hpp>",
            "#include <vector>",
        ]
    );
    for expected in [
        "#define LIMIT 10",
        "using Grid = EspressoList<EspressoList<EspressoInt>>;",
        "EspressoInt add(EspressoInt a, EspressoInt b = 2) {",
        "struct add_Params {",
        "template<typename T, EspressoInt N = 4>",
        "class Square : public Shape {",
        "int main() {",
        "EspressoULong big = 0xFFULL;",
        "scaled = [&](EspressoInt v) {",
        "std::format(\"value {0} of {1}\", v, total)",
        "add({._a = 1, ._b = total})",
        "} catch (const Error& e) {",
        "//UNSAFE:",
        "int* raw = nullptr;",
    ] {
        assert!(cpp.contains(expected), "missing {expected:?} in:\n{cpp}");
    }
}

#[test]
fn test_comments_survive_when_enabled() {
    let config = Config {
        comments: true,
        ..Config::default()
    };
    let cpp = transpile(SHOWCASE, &config).unwrap();
    assert!(cpp.contains("// A tour of the language, in brace layout."));

    let cpp = transpile(SHOWCASE, &Config::default()).unwrap();
    assert!(!cpp.contains("A tour of the language"));
}

#[test]
fn test_indented_layout() {
    let src = indoc! {"
        class Counter:
            public:
                int count = 0
                void func bump():
                    count += 1
        main:
            int n = 0
            bump()
    "};
    let config = Config {
        indentation: true,
        ..Config::default()
    };
    let cpp = transpile(src, &config).unwrap();
    assert!(cpp.contains("class Counter {"), "{cpp}");
    assert!(cpp.contains("count = count + 1;"), "{cpp}");
    assert!(cpp.contains("int main() {"), "{cpp}");
}

#[test]
fn test_lex_errors_surface() {
    let error = transpile("s = \"open", &Config::default()).unwrap_err();
    assert!(
        matches!(error, Error::Lex(LexError::Unterminated { .. })),
        "{error:?}"
    );
}

#[test]
fn test_parse_errors_surface() {
    let error = transpile("a = 1\nb = (2 + )\n", &Config::default()).unwrap_err();
    let Error::Parse(error) = error else {
        panic!("expected a parse error, got {error:?}");
    };
    assert_eq!(error.pos.line, 2);
    assert!(matches!(error.kind, ParseErrorKind::Unexpected { .. }));
}
