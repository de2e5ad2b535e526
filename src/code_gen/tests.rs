use pretty_assertions::assert_eq;

use super::*;
use crate::{
    lexer::{self, Config},
    parser,
    util::test_utils::transpile_tests,
};

transpile_tests!(
    fn test_c_style_for() {
        let program = "for (int i = 0; i < 3; i += 1) { print(i); }";
        let cpp_ok = "
            for (EspressoInt i = 0; i < 3; i = i + 1) {
                print(i);
            }
        ";
        let includes_ok = &["#include <runtime.hpp>"];
    }

    fn test_typed_list_declaration() {
        let program = "list[int] x = [1, 2, 3]";
        let cpp_ok = "EspressoList<EspressoInt> x = {1, 2, 3};";
    }

    fn test_nested_types_and_maps() {
        let program = r#"
            map[string, list[int]] groups
            map<string, int> ages = {"ada": 36, "alan": 41}
            tuple[int, float] pair = (1, 2.5f)
        "#;
        let cpp_ok = r#"
            EspressoDict<EspressoString, EspressoList<EspressoInt>> groups;
            EspressoDict<EspressoString, EspressoInt> ages = {{"ada", 36}, {"alan", 41}};
            EspressoTuple<EspressoInt, EspressoFloat> pair = {1, 2.5F};
        "#;
    }

    fn test_number_encodings() {
        let program = "
            ulong big = 0xFFul
            long y = -0x1l
            float f = 2f
            byte b = -0b1
        ";
        let cpp_ok = "
            EspressoULong big = 0xFFULL;
            EspressoLong y = 0xFFFFFFFFFFFFFFFFLL;
            EspressoFloat f = 2.0F;
            EspressoByte b = 0b11111111;
        ";
    }

    fn test_function_dual_emission() {
        let program = "
            func add(int a, int b = 2) -> int {
                return a + b
            }
            x = add(a = 1, b = 3)
            y = add(1)
        ";
        let cpp_ok = "
            EspressoInt add(EspressoInt a, EspressoInt b = 2) {
                return a + b;
            }

            struct add_Params {
                EspressoInt _a;
                EspressoInt _b = 2;
            };

            EspressoInt add(add_Params params) {
                EspressoInt a = params._a;
                EspressoInt b = params._b;
                return a + b;
            }
            x = add({._a = 1, ._b = 3});
            y = add(1);
        ";
    }

    fn test_untyped_parameters_become_struct_templates() {
        let program = "func scale(x, int k = 2) => x * k";
        let cpp_ok = "
            auto scale(auto x, EspressoInt k = 2) {
                return x * k;
            }

            template<typename T_x>
            struct scale_Params {
                T_x _x;
                EspressoInt _k = 2;
            };

            template<typename T_x>
            auto scale(scale_Params<T_x> params) {
                T_x x = params._x;
                EspressoInt k = params._k;
                return x * k;
            }
        ";
    }

    fn test_lambdas() {
        let program = "
            f = (int x) => x + 1
            apply(xs, lambda[&](int v) -> int { return v * k })
            g = lambda() => 42
        ";
        let cpp_ok = "
            f = [](EspressoInt x) {
                return x + 1;
            };
            apply(xs, [&](EspressoInt v) -> EspressoInt {
                return v * k;
            });
            g = []() {
                return 42;
            };
        ";
    }

    fn test_constructor_member_initializers() {
        let program = "
            class Point {
            public:
                int x
                int y
                Point(int x, int y) : x(x), y(y) {}
            }
        ";
        let cpp_ok = "
            class Point {
            public:
                EspressoInt x;
                EspressoInt y;
                Point(EspressoInt x, EspressoInt y) : x(x), y(y) {
                }

                struct Point_Params {
                    EspressoInt _x;
                    EspressoInt _y;
                };

                Point(Point_Params params) : Point(params._x, params._y) {
                }
            };
        ";
    }

    fn test_parameterless_function() {
        let program = "void func reset() { count = 0 }";
        let cpp_ok = "
            void reset() {
                count = 0;
            }
        ";
    }

    fn test_generic_function() {
        let program = "func first<T>(list[T] xs) -> T => xs[0]";
        let cpp_ok = "
            template<typename T>
            T first(EspressoList<T> xs) {
                return xs[0];
            }

            template<typename T>
            struct first_Params {
                EspressoList<T> _xs;
            };

            template<typename T>
            T first(first_Params<T> params) {
                EspressoList<T> xs = params._xs;
                return xs[0];
            }
        ";
    }

    fn test_class() {
        let program = "
            class Square : Shape {
            public:
                double side = 1.0
                Square(double side) {
                    this.side = side
                }
                override double func area() => side * side
            }
        ";
        let cpp_ok = "
            class Square : public Shape {
            public:
                EspressoDouble side = 1.0;
                Square(EspressoDouble side) {
                    this->side = side;
                }

                struct Square_Params {
                    EspressoDouble _side;
                };

                Square(Square_Params params) {
                    EspressoDouble side = params._side;
                    this->side = side;
                }
                EspressoDouble area() override {
                    return side * side;
                }
            };
        ";
    }

    fn test_generic_class() {
        let program = "class Box[T, int N = 4] { list[T] items }";
        let cpp_ok = "
            template<typename T, EspressoInt N = 4>
            class Box {
                EspressoList<T> items;
            };
        ";
    }

    fn test_decimal_with_leading_zero() {
        let program = "int x = 010";
        let cpp_ok = "EspressoInt x = 10;";
    }

    fn test_includes_are_not_repeated() {
        let program = r#"
            print($"{a}")
            print($"{b}")
        "#;
        let includes_ok = &["#include <format>", "#include <runtime.hpp>"];
    }

    fn test_interpolation() {
        let program = r#"print($"{a} + {b} = {a + b} {{ok}}")"#;
        let cpp_ok = r#"print(std::format("{0} + {1} = {2} {{ok}}", a, b, a + b));"#;
        let includes_ok = &["#include <format>", "#include <runtime.hpp>"];
    }

    fn test_literals() {
        let program = r#"
            p = null
            r = r"a\d"
            done = !false
            c = 'x'
        "#;
        let cpp_ok = r#"
            p = nullptr;
            r = R"(a\d)";
            done = !false;
            c = 'x';
        "#;
    }

    fn test_operators() {
        let program = "
            flags = a << 2 | b & ~mask
            ok = x >= 1 and not y or z != 0
            n = - -k
            m = cond ? &a : *b
        ";
        let cpp_ok = "
            flags = a << 2 | b & ~mask;
            ok = x >= 1 && !y || z != 0;
            n = - -k;
            m = cond ? &a : *b;
        ";
    }

    fn test_if_while_for_in() {
        let program = "
            if x > 0 { up() } elif x < 0 { down() } else { stay() }
            while (busy) { wait() }
            for v in values { use(v) }
            for string s in names {}
        ";
        let cpp_ok = "
            if (x > 0) {
                up();
            } else if (x < 0) {
                down();
            } else {
                stay();
            }
            while (busy) {
                wait();
            }
            for (auto&& v : values) {
                use(v);
            }
            for (EspressoString s : names) {
            }
        ";
    }

    fn test_match_lowers_to_if_chain() {
        let program = "
            match x {
                case 1 => a()
                case 2 => b()
                default => c()
            }
        ";
        let cpp_ok = "
            if (x == 1) {
                a();
            } else if (x == 2) {
                b();
            } else {
                c();
            }
        ";
    }

    fn test_switch_cases_do_not_fall_through() {
        let program = "
            switch (x) {
                case 1 { a() }
                case 2 { return }
                default: b()
            }
        ";
        let cpp_ok = "
            switch (x) {
                case 1: {
                    a();
                    break;
                }
                case 2: {
                    return;
                }
                default: {
                    b();
                    break;
                }
            }
        ";
    }

    fn test_throw_needs_value() {
        let program = "try { a() } catch (Error e) { log(e) } catch { throw }";
        let expected_errors = &["1:54: expected expression, found `}`"];
    }

    fn test_try_handlers() {
        let program = "try { a() } catch (Error e) { log(e) } catch { b() }";
        let cpp_ok = "
            try {
                a();
            } catch (const Error& e) {
                log(e);
            } catch (...) {
                b();
            }
        ";
    }

    fn test_finally_without_handlers_rethrows() {
        let program = "try { risky() } finally { cleanup() }";
        let cpp_ok = "
            try {
                risky();
            } catch (...) {
                cleanup();
                throw;
            }
            {
                cleanup();
            }
        ";
    }

    fn test_annotations() {
        let program = r#"
            @include <vector>
            @define LIMIT 10
            @assert(LIMIT > 0)
            @assert(LIMIT < 100, "too big")
            @alias Grid = list[list[int]]
            @using namespace std
            @panic("bad")
        "#;
        let cpp_ok = r#"
            #define LIMIT 10
            assert(LIMIT > 0);
            if (!(LIMIT < 100)) {
                throw std::runtime_error("too big");
            }
            using Grid = EspressoList<EspressoList<EspressoInt>>;
            using namespace std;
            std::cerr << "bad" << std::endl;
            std::abort();
        "#;
        let includes_ok = &[
            "#include <cassert>",
            "#include <cstdlib>",
            "#include <iostream>",
            "#include <runtime.hpp>",
            "#include <stdexcept>",
            "#include <vector>",
        ];
    }

    fn test_namespace_and_main() {
        let program = "
            namespace geo {
                int origin = 0
            }
            main {
                return geo::origin
            }
        ";
        let cpp_ok = "
            namespace geo {
                EspressoInt origin = 0;
            }
            int main() {
                return geo::origin;
            }
        ";
    }

    fn test_foreign_block_is_dedented() {
        let program = "
            @unsafe
            @cpp {

                int* p = nullptr;
                if (p) {
                    *p = 1;
                }

            }
            x = 1
        ";
        let cpp_ok = "
            //UNSAFE:
            int* p = nullptr;
            if (p) {
                *p = 1;
            }
            x = 1;
        ";
    }

    fn test_indented_program() {
        let indented = r#"
            func greet(string name):
                print($"Hello, {name}!")
            main:
                greet("Ada")
        "#;
        let cpp_ok = r#"
            auto greet(EspressoString name) {
                print(std::format("Hello, {0}!", name));
            }

            struct greet_Params {
                EspressoString _name;
            };

            auto greet(greet_Params params) {
                EspressoString name = params._name;
                print(std::format("Hello, {0}!", name));
            }
            int main() {
                greet("Ada");
            }
        "#;
    }
);

#[test]
fn test_bitwise_arity() {
    let operand = || Node::Ident("a".into()).boxed();
    let mut cx = Context::default();

    let missing = Node::Bitwise(Bitwise {
        op: BitOp::And,
        lhs: operand(),
        rhs: None,
    });
    assert_eq!(
        missing.render(&mut cx),
        Err(RenderError::MissingOperand { op: "&" })
    );

    let extra = Node::Bitwise(Bitwise {
        op: BitOp::Not,
        lhs: operand(),
        rhs: Some(operand()),
    });
    assert_eq!(
        extra.render(&mut cx),
        Err(RenderError::ExtraOperand { op: "~" })
    );
}

#[test]
fn test_bad_type_fails_rendering() {
    let program = Program {
        includes: BTreeSet::new(),
        body: Body::new(vec![Node::TypeName("list[int>".into())], 0),
    };
    let error = program.render().unwrap_err();
    assert_eq!(
        error.to_string(),
        "unmatched `>` at offset 8 in type `list[int>`"
    );
}

#[test]
fn test_comments_are_kept() {
    let config = Config {
        comments: true,
        ..Config::default()
    };
    let (tokens, blocks) = lexer::tokenize_with("// lead\nx = 1 /* trailing */", &config).unwrap();
    let program = parser::parse(&tokens, &blocks).unwrap();
    assert_eq!(
        program.render().unwrap(),
        "#include <runtime.hpp>\n\n// lead\nx = 1;\n/* trailing */\n"
    );
}

#[test]
fn test_dedent_keeps_comment_lines() {
    assert_eq!(dedent("\n    a;\n  // note\n    b;\n"), "a;\n  // note\nb;");
}

#[test]
fn test_indent_skips_blank_lines() {
    assert_eq!(indent("a\n\nb", 2), "        a\n\n        b");
}
