//! Extraction and scan benchmarks.
//!
//! - Single-file extraction of the fixture modules
//! - Cold scan (empty cache) vs warm scan (every file a cache hit)

use std::fs;
use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pygoto::index::db::CacheStore;
use pygoto::index::Parser;
use pygoto::indexer::parser::PythonParser;
use pygoto::indexer::{ScanRequest, Scanner};
use tempfile::TempDir;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_python_project").join(name);
    fs::read_to_string(path).unwrap()
}

/// A project of `num_files` modules built from the fixture files.
fn create_project(num_files: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let sources = [fixture("shapes.py"), fixture("inventory.py")];
    for i in 0..num_files {
        let package = dir.path().join(format!("pkg{}", i / 10));
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join(format!("mod{}.py", i)), &sources[i % 2]).unwrap();
    }
    dir
}

fn bench_extract(c: &mut Criterion) {
    let parser = PythonParser::new();
    let mut group = c.benchmark_group("extract");

    for name in ["shapes.py", "inventory.py"] {
        let content = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), &content, |b, content| {
            b.iter(|| parser.extract(black_box(name), black_box(content)))
        });
    }

    let large = fixture("shapes.py").repeat(50);
    group.bench_function("shapes_x50", |b| {
        b.iter(|| parser.extract(black_box("large.py"), black_box(&large)))
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for num_files in [10, 100] {
        let project = create_project(num_files);
        let request = ScanRequest::full(vec![project.path().to_path_buf()], Vec::new(), Vec::new());

        group.bench_with_input(BenchmarkId::new("cold", num_files), &request, |b, request| {
            let scanner = Scanner::new(Arc::new(PythonParser::new()), None);
            b.iter(|| scanner.run_scan(black_box(request), |_| {}).unwrap())
        });

        let cache_dir = TempDir::new().unwrap();
        let cache = CacheStore::open(cache_dir.path().join("cache.db")).unwrap();
        let scanner = Scanner::new(Arc::new(PythonParser::new()), Some(cache));
        scanner.run_scan(&request, |_| {}).unwrap();

        group.bench_with_input(BenchmarkId::new("warm", num_files), &request, |b, request| {
            b.iter(|| scanner.run_scan(black_box(request), |_| {}).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_scan);
criterion_main!(benches);
