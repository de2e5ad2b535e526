use criterion::{criterion_group, criterion_main, Criterion};
use espresso::{lexer, parser};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/showcase.esp");

fn criterion_benchmark(c: &mut Criterion) {
    let (tokens, blocks) = lexer::tokenize(INPUT).unwrap();

    c.bench_function("parser", |b| {
        b.iter(|| {
            let program = parser::parse(black_box(&tokens), &blocks).unwrap();
            black_box(program);
        })
    });

    c.bench_function("transpile", |b| {
        b.iter(|| {
            let cpp = espresso::transpile(black_box(INPUT), &lexer::Config::default()).unwrap();
            black_box(cpp);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
