use crate::{lexer, parser, util::fmt::print_program_string};

/// Each variant contains the input.
pub enum Test {
    Program(&'static str),
    Indented(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    /// The emitted code after the include block.
    CppOk(&'static str),
    /// The emitted `#include` lines.
    IncludesOk(&'static [&'static str]),
    ExpectedErrors(&'static [&'static str]),
}

pub struct Outcome {
    pub tree: String,
    pub cpp: String,
    pub errors: Vec<String>,
}

#[track_caller]
pub fn run_pipeline(test: Test) -> Outcome {
    let lexed = match test {
        Test::Program(input) => lexer::tokenize(input),
        Test::Indented(input) => lexer::tokenize_indented(input),
    };
    let (tokens, blocks) = match lexed {
        Ok(lexed) => lexed,
        Err(error) => {
            return Outcome {
                tree: String::new(),
                cpp: String::new(),
                errors: vec![error.to_string()],
            }
        }
    };

    let (program, errors) = match parser::parse_recovering(&tokens, &blocks) {
        Ok(program) => (program, vec![]),
        Err((program, errors)) => (program, errors),
    };
    let mut errors: Vec<_> = errors.iter().map(ToString::to_string).collect();
    let tree = print_program_string(&program).unwrap();

    let mut cpp = String::new();
    if errors.is_empty() {
        match program.render() {
            Ok(code) => cpp = code,
            Err(error) => errors.push(error.to_string()),
        }
    }
    Outcome { tree, cpp, errors }
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, outcome: &Outcome) {
    let no_errors: &[&str] = &[];
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            ::pretty_assertions::assert_eq!(outcome.errors, no_errors);
            ::pretty_assertions::assert_eq!(outcome.tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(outcome.tree.trim(), expected_tree.trim());
        }
        Assertion::CppOk(expected_code) => {
            ::pretty_assertions::assert_eq!(outcome.errors, no_errors);
            let code = outcome
                .cpp
                .split_once("\n\n")
                .map_or(outcome.cpp.as_str(), |(_, code)| code);
            ::pretty_assertions::assert_eq!(code.trim(), expected_code.trim());
        }
        Assertion::IncludesOk(expected_includes) => {
            ::pretty_assertions::assert_eq!(outcome.errors, no_errors);
            let includes: Vec<_> = outcome
                .cpp
                .lines()
                .take_while(|line| line.starts_with("#include"))
                .collect();
            ::pretty_assertions::assert_eq!(includes, expected_includes);
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(outcome.errors, expected_errors);
        }
    }
}

/// Declares one test per function. The first `let` names the source kind
/// (`program` for braces, `indented` for the layout mode); the following
/// ones are assertions on the outcome.
macro_rules! transpile_tests {
    (
        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:literal;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    transpile_tests!(@@get_test($source_kind), $source);
                let outcome = crate::util::test_utils::run_pipeline(test);
                transpile_tests!(@@expand_assertions, outcome, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $outcome:expr, []) => {};
    (@@expand_assertions, $outcome:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            transpile_tests!(@@assertion, $assertion, $assertion_expected),
            &$outcome,
        );
        transpile_tests!(@@expand_assertions, $outcome, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, cpp_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::CppOk(::indoc::indoc! { $expected })
    };
    (@@assertion, includes_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::IncludesOk($expected)
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(program), $source:literal) => {
        crate::util::test_utils::Test::Program(::indoc::indoc! { $source })
    };
    (@@get_test(indented), $source:literal) => {
        crate::util::test_utils::Test::Indented(::indoc::indoc! { $source })
    };
}
pub(crate) use transpile_tests;
