use std::fmt::Write as _;
use std::fs;
use std::hint::black_box;
use std::path::Path;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use specweave_core::codec::{self, Format};
use specweave_core::{Bundler, Node};

/// Writes a root document referencing `count` schema files, each sharing a common file.
fn synthetic_tree(dir: &Path, count: usize) -> std::io::Result<()> {
    let mut main = String::from("openapi: 3.0.3\ninfo:\n  title: Bench\n  version: 1.0.0\npaths:\n");
    for index in 0..count {
        let _ = write!(
            main,
            "  /items{index}:\n    get:\n      responses:\n        '200':\n          description: ok\n          content:\n            application/json:\n              schema:\n                $ref: ./schemas/item{index}.yaml\n"
        );
        fs::write(
            dir.join(format!("schemas/item{index}.yaml")),
            format!(
                "type: object\nproperties:\n  id:\n    type: integer\n  error:\n    $ref: ../common.yaml#/Error\n  owner:\n    $ref: ../common.yaml#/Owner\n  rank:\n    type: integer\n    default: {index}\n"
            ),
        )?;
    }
    fs::write(dir.join("main.yaml"), main)?;
    fs::write(
        dir.join("common.yaml"),
        "Error:\n  type: object\n  properties:\n    message:\n      type: string\nOwner:\n  type: object\n  properties:\n    name:\n      type: string\n    error:\n      $ref: '#/Error'\n",
    )?;
    Ok(())
}

fn benchmark_bundle(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("a tokio runtime");
    let mut group = c.benchmark_group("bundle");

    for count in [10, 100] {
        let dir = tempfile::tempdir().expect("a temp dir");
        fs::create_dir(dir.path().join("schemas")).expect("schemas dir");
        synthetic_tree(dir.path(), count).expect("synthetic tree");
        let input = dir.path().join("main.yaml").display().to_string();
        let bundler = Bundler::default();

        group.bench_with_input(BenchmarkId::new("files", count), &input, |b, input| {
            b.iter(|| {
                let root = runtime
                    .block_on(bundler.bundle(black_box(input)))
                    .expect("bundle should succeed");
                black_box(root);
            });
        });
    }

    group.finish();
}

fn benchmark_codec(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("a temp dir");
    fs::create_dir(dir.path().join("schemas")).expect("schemas dir");
    synthetic_tree(dir.path(), 100).expect("synthetic tree");
    let yaml = fs::read(dir.path().join("main.yaml")).expect("main document");
    let node: Node = codec::decode(&yaml, Some(Format::Yaml), "main.yaml").expect("valid YAML");

    let mut group = c.benchmark_group("codec");
    group.bench_function("decode_yaml", |b| {
        b.iter(|| black_box(codec::decode(black_box(&yaml), Some(Format::Yaml), "main.yaml")));
    });
    for format in [Format::Yaml, Format::Json] {
        group.bench_with_input(BenchmarkId::new("encode", format), &node, |b, node| {
            b.iter(|| black_box(codec::encode(black_box(node), format)));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_bundle, benchmark_codec);
criterion_main!(benches);
