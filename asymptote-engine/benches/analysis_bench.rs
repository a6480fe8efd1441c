//! Benchmarks for whole-module analysis.
//!
//! ```bash
//! cargo bench --bench analysis_bench
//! ```
//!
//! Inputs are the syntax trees under `tests/programs`, so timings include
//! lowering through the Python adapter.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use asymptote_engine::nodes::{BinOp, FunctionNode, SyntaxNode};
use asymptote_engine::{analyze_python_ast, Analyzer, EngineConfig};

fn load(name: &str) -> serde_json::Value {
    let path = format!("{}/tests/programs/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let source = std::fs::read_to_string(&path).expect("fixture is readable");
    serde_json::from_str(&source).expect("fixture is valid JSON")
}

fn bench_fixture(c: &mut Criterion, name: &str) {
    let module = load(name);
    let config = EngineConfig::default();
    c.bench_function(name, |b| {
        b.iter(|| analyze_python_ast(black_box(&module), &config).expect("analysis failed"))
    });
}

fn bench_binary_search(c: &mut Criterion) {
    bench_fixture(c, "binary_search");
}

fn bench_merge_sort(c: &mut Criterion) {
    bench_fixture(c, "merge_sort");
}

fn bench_fibonacci(c: &mut Criterion) {
    bench_fixture(c, "fibonacci");
}

/// Loops nested `depth` deep, each running to `n`.
fn nested(depth: usize) -> FunctionNode {
    let mut body = SyntaxNode::assign(
        "acc",
        SyntaxNode::binary(BinOp::Add, SyntaxNode::ident("acc"), SyntaxNode::lit(1)),
    );
    for level in 0..depth {
        body = SyntaxNode::for_range(
            &format!("i{level}"),
            SyntaxNode::lit(0),
            SyntaxNode::ident("n"),
            SyntaxNode::lit(1),
            body,
        );
    }
    FunctionNode::new("nested", &["n"], vec![body])
}

fn bench_deeply_nested(c: &mut Criterion) {
    let function = nested(12);
    let analyzer = Analyzer::default();
    c.bench_function("deeply_nested", |b| {
        b.iter(|| {
            analyzer
                .analyze_function(black_box(&function))
                .expect("analysis failed")
        })
    });
}

criterion_group!(
    benches,
    bench_binary_search,
    bench_merge_sort,
    bench_fibonacci,
    bench_deeply_nested
);

criterion_main!(benches);
