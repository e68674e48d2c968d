//! Benchmarks for highlight compositing
//!
//! Run with: `cargo bench --bench compose_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use subgloss::annotate::{
    align_tokens, parse_fragment, render, AnnotatedWord, Compositor, Token,
};

const TEXT: &str = "今日は東京で寿司を食べてから大阪に行きました";

const MARKUP: &str = "<ruby>今日<rt>きょう</rt></ruby>は<ruby>東京<rt>とうきょう</rt></ruby>で\
                      <ruby>寿司<rt>すし</rt></ruby>を<ruby>食<rt>た</rt></ruby>べてから\
                      <ruby>大阪<rt>おおさか</rt></ruby>に<ruby>行<rt>い</rt></ruby>きました";

fn words() -> Vec<AnnotatedWord> {
    let tokens = [
        ("今日", "キョウ"),
        ("は", "ハ"),
        ("東京", "トウキョウ"),
        ("で", "デ"),
        ("寿司", "スシ"),
        ("を", "ヲ"),
        ("食べ", "タベ"),
        ("て", "テ"),
        ("から", "カラ"),
        ("大阪", "オオサカ"),
        ("に", "ニ"),
        ("行き", "イキ"),
        ("まし", "マシ"),
        ("た", "タ"),
    ]
    .map(|(surface, reading)| Token::new(surface, reading, "名詞"));

    let mut words = align_tokens(TEXT, &tokens);
    for word in &mut words {
        word.meaning = Some(format!("gloss for {}", word.word));
    }
    words
}

fn bench_compose(c: &mut Criterion) {
    let compositor = Compositor::new();
    let tree = parse_fragment(MARKUP);
    let plain = parse_fragment(TEXT);
    let words = words();

    c.bench_function("tree_merge", |b| {
        b.iter(|| compositor.compose(black_box(TEXT), black_box(&tree), black_box(&words)));
    });

    c.bench_function("overlay", |b| {
        b.iter(|| compositor.compose(black_box(TEXT), black_box(&plain), black_box(&words)));
    });

    c.bench_function("align_and_render", |b| {
        b.iter(|| {
            let words = words();
            compositor
                .compose(TEXT, &tree, &words)
                .map(|nodes| render(&nodes))
        });
    });
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_fragment", |b| {
        b.iter(|| parse_fragment(black_box(MARKUP)));
    });
}

criterion_group!(benches, bench_compose, bench_parse);
criterion_main!(benches);
