//! Criterion benchmarks for ANP forward passes.

use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::Distribution;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use neural_anp::{AnpConfig, AnpModel};

type BenchBackend = NdArray;

fn make_model(cross_attention: &str) -> AnpModel<BenchBackend> {
    AnpConfig::new(2, 1, vec![64, 64], 64)
        .with_cross_attention_type(cross_attention.into())
        .with_num_heads(4)
        .init(&Default::default())
        .unwrap()
}

fn random(shape: [usize; 3]) -> Tensor<BenchBackend, 3> {
    Tensor::random(shape, Distribution::Uniform(0.0, 1.0), &Default::default())
}

fn bench_cross_attention(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference_by_cross_attention");

    let context_x = random([4, 100, 2]);
    let context_y = random([4, 100, 1]);
    let target_x = random([4, 256, 2]);

    for kind in ["uniform", "laplace", "dot", "multihead"] {
        let model = make_model(kind);
        group.bench_function(kind, |b| {
            b.iter(|| {
                black_box(
                    model
                        .forward(
                            context_x.clone(),
                            context_y.clone(),
                            black_box(target_x.clone()),
                            None,
                        )
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

fn bench_target_count(c: &mut Criterion) {
    let model = make_model("multihead");
    let context_x = random([4, 50, 2]);
    let context_y = random([4, 50, 1]);

    let mut group = c.benchmark_group("training_forward");

    for n_target in [64, 256, 784] {
        let target_x = random([4, n_target, 2]);
        let target_y = random([4, n_target, 1]);

        group.throughput(Throughput::Elements((4 * n_target) as u64));
        group.bench_with_input(BenchmarkId::new("targets", n_target), &n_target, |b, _| {
            b.iter(|| {
                black_box(
                    model
                        .forward(
                            context_x.clone(),
                            context_y.clone(),
                            target_x.clone(),
                            Some(target_y.clone()),
                        )
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cross_attention, bench_target_count);
criterion_main!(benches);
