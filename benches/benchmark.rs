//! Benchmarks for columnstore performance.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use columnstore::{
    ColumnInfo, ColumnstoreReader, ColumnstoreWriter, Compression, DocId, MemoryDirectory,
    Options, EOF_DOC,
};
use std::sync::Arc;
use tempfile::TempDir;

fn value(doc: DocId) -> Vec<u8> {
    format!("value{:08}", doc).into_bytes()
}

/// Write `count` documents with the given id step into segment `_0`.
fn build(dir: &MemoryDirectory, compression: Compression, count: u32, step: u32) {
    let mut writer = ColumnstoreWriter::new(Options::default()).unwrap();
    writer.prepare(Arc::new(dir.clone()), "_0").unwrap();
    let id = writer.push_column(ColumnInfo::new(compression)).unwrap();
    for i in 0..count {
        let doc = 1 + i * step;
        writer.write(id, doc, &value(doc)).unwrap();
    }
    writer.commit().unwrap();
}

/// Benchmark column writes per compression.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(100_000));

    for compression in [Compression::None, Compression::Lz4, Compression::Snappy] {
        group.bench_with_input(
            BenchmarkId::from_parameter(compression),
            &compression,
            |b, &compression| {
                b.iter(|| {
                    let dir = MemoryDirectory::new();
                    build(&dir, compression, 100_000, 1);
                    black_box(dir)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark writing to disk.
fn bench_write_fs(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_fs");
    group.throughput(Throughput::Elements(50_000));

    group.bench_function("50000_docs", |b| {
        b.iter_with_setup(
            || TempDir::new().unwrap(),
            |tmp| {
                let dir = Arc::new(columnstore::FsDirectory::open(tmp.path()).unwrap());
                let mut writer = ColumnstoreWriter::new(Options::default()).unwrap();
                writer.prepare(dir, "_0").unwrap();
                let id = writer.push_column(ColumnInfo::default()).unwrap();
                for doc in 1..=50_000 {
                    writer.write(id, doc, &value(doc)).unwrap();
                }
                black_box(writer.commit().unwrap())
            },
        );
    });

    group.finish();
}

/// Benchmark full scans.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for step in [1u32, 3] {
        let dir = MemoryDirectory::new();
        build(&dir, Compression::Lz4, 100_000, step);
        let reader = ColumnstoreReader::open(&dir, "_0", &Options::default())
            .unwrap()
            .unwrap();
        let column = reader.column(0).unwrap();

        group.throughput(Throughput::Elements(100_000));
        group.bench_with_input(BenchmarkId::new("next", step), &step, |b, _| {
            b.iter(|| {
                let mut iter = column.iter();
                let mut n = 0u32;
                while iter.next().unwrap() {
                    n += 1;
                }
                black_box(n)
            });
        });
        group.bench_with_input(BenchmarkId::new("visit", step), &step, |b, _| {
            b.iter(|| {
                let mut n = 0u32;
                column
                    .visit(|_, v| {
                        n += v.len() as u32;
                        true
                    })
                    .unwrap();
                black_box(n)
            });
        });
    }

    group.finish();
}

/// Benchmark seeks on dense and sparse columns.
fn bench_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("seek");

    for (name, step) in [("dense_fixed", 1u32), ("sparse", 7)] {
        let dir = MemoryDirectory::new();
        build(&dir, Compression::Lz4, 100_000, step);
        let reader = ColumnstoreReader::open(&dir, "_0", &Options::default())
            .unwrap()
            .unwrap();
        let column = reader.column(0).unwrap();
        let max = 1 + 99_999 * step;

        group.throughput(Throughput::Elements(1000));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut iter = column.iter();
                let mut target = 1;
                while target <= max {
                    let doc = iter.seek(target).unwrap();
                    if doc == EOF_DOC {
                        break;
                    }
                    target = doc + max / 1000;
                }
                black_box(target)
            });
        });
    }

    group.finish();
}

/// Benchmark random point lookups.
fn bench_get(c: &mut Criterion) {
    let dir = MemoryDirectory::new();
    build(&dir, Compression::Lz4, 100_000, 2);
    let reader = ColumnstoreReader::open(&dir, "_0", &Options::default())
        .unwrap()
        .unwrap();
    let column = reader.column(0).unwrap();

    let docs: Vec<DocId> = (0..10_000).map(|i| 1 + (i * 7919) % 200_000).collect();

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(docs.len() as u64));
    group.bench_function("10000_lookups", |b| {
        b.iter(|| {
            let mut found = 0;
            for &doc in &docs {
                if column.get(doc).unwrap().is_some() {
                    found += 1;
                }
            }
            black_box(found)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_write,
    bench_write_fs,
    bench_scan,
    bench_seek,
    bench_get
);

criterion_main!(benches);
