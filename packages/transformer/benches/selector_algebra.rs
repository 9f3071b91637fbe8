use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stylescope_parser::parse;
use stylescope_transformer::{create_class_subset_root, scope_selector};

fn scope_selectors(c: &mut Criterion) {
    c.bench_function("scope_selector_simple", |b| {
        b.iter(|| scope_selector(black_box(".root"), black_box(".label:hover"), false))
    });

    c.bench_function("scope_selector_cartesian", |b| {
        b.iter(|| {
            scope_selector(
                black_box(".a, .b, .c"),
                black_box("&:hover .x, .y > &, :not(&) .z"),
                true,
            )
        })
    });
}

fn class_subsets(c: &mut Criterion) {
    let mut source = String::new();
    for i in 0..100 {
        source.push_str(&format!(
            ".btn {{ color: red; }} .btn:hover .icon{i} {{ color: blue; }} .other{i} .btn {{ x: 1; }}\n\
             @media (max-width: {i}px) {{ .btn {{ display: none; }} }}\n"
        ));
    }
    let sheet = parse(&source).expect("bench source parses");

    c.bench_function("create_class_subset_root", |b| {
        b.iter(|| create_class_subset_root(black_box(&sheet.nodes), ".btn", false))
    });
}

criterion_group!(benches, scope_selectors, class_subsets);
criterion_main!(benches);
