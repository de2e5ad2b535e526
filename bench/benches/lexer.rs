use criterion::{criterion_group, criterion_main, Criterion};
use espresso::lexer;
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/showcase.esp");

fn lexer(input: &str) {
    let (tokens, blocks) = lexer::tokenize(input).unwrap();
    black_box((tokens.len(), blocks.len()));
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lexer", |b| {
        b.iter(|| {
            black_box(lexer(black_box(INPUT)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
