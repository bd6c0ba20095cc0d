// Transform benchmark - measure records → partitioned RecordBatch conversion
//
// Isolates schema inference and Arrow building from Parquet serialization,
// then measures the full transform including writes to in-memory storage.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gastos2parquet::transform::infer_schema;
use gastos2parquet::{PartitionedWriter, Transformer};
use opendal::{services, Operator};

mod fixtures;
use fixtures::{generate_records, WorkloadSize};

fn memory_transformer() -> Transformer {
    let op = Operator::new(services::Memory::default())
        .expect("memory operator")
        .finish();
    Transformer::new(PartitionedWriter::new(op, "bronze"))
}

/// Benchmark schema inference alone
fn bench_infer_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer_schema");

    for size in [WorkloadSize::Small, WorkloadSize::Medium] {
        let records = generate_records(size);
        group.throughput(Throughput::Elements(size.record_count() as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", size)),
            &records,
            |b, records| {
                b.iter(|| black_box(infer_schema(records)));
            },
        );
    }

    group.finish();
}

/// Benchmark building the partitioned batch
fn bench_build_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_table");
    let transformer = memory_transformer();

    for size in [WorkloadSize::Small, WorkloadSize::Medium] {
        let records = generate_records(size);
        group.throughput(Throughput::Elements(size.record_count() as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", size)),
            &records,
            |b, records| {
                b.iter(|| black_box(transformer.build_table(records).unwrap()));
            },
        );
    }

    group.finish();
}

/// Benchmark the full transform, Parquet encoding included
fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    group.sample_size(10);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let transformer = memory_transformer();

    let records = generate_records(WorkloadSize::Medium);
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("medium", |b| {
        b.iter(|| {
            let report = runtime.block_on(transformer.transform(&records)).unwrap();
            black_box(report);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_infer_schema, bench_build_table, bench_transform);
criterion_main!(benches);
