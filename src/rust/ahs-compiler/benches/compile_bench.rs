// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use ahs_compiler::Capabilities;
use ahs_compiler::passes::piecewise::{piecewise_constant, piecewise_linear};
use ahs_compiler::passes::tiling::tile;
use ahs_ir::{Assignments, AtomArrangement, BravaisLattice, Decimal, Waveform};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_tiling(c: &mut Criterion) {
    let limits = Capabilities::aquila()
        .and_then(|capabilities| capabilities.device_limits())
        .unwrap();
    let spacing = Decimal::from(10);
    let mut group = c.benchmark_group("tiling");

    for size in [1, 2, 4] {
        let register = AtomArrangement::from(BravaisLattice::square(size, size, 4).unwrap());
        group.bench_with_input(BenchmarkId::new("square", size), &register, |b, register| {
            b.iter(|| black_box(tile(register, &spacing, &limits, &Assignments::new()).unwrap()));
        });
    }

    group.finish();
}

fn ramp(segments: usize) -> Waveform {
    let durations = vec![0.1; segments];
    let values: Vec<f64> = (0..=segments).map(|i| (i % 7) as f64).collect();
    Waveform::piecewise_linear(durations, values).unwrap()
}

fn steps(segments: usize) -> Waveform {
    let durations = vec![0.1; segments];
    let values: Vec<f64> = (0..segments).map(|i| (i % 5) as f64).collect();
    Waveform::piecewise_constant(durations, values).unwrap()
}

fn bench_discretization(c: &mut Criterion) {
    let sizes = [8, 64, 256];
    let assignments = Assignments::new();
    let mut group = c.benchmark_group("discretization");

    for &size in &sizes {
        let linear = ramp(size);
        group.bench_with_input(BenchmarkId::new("linear", size), &linear, |b, waveform| {
            b.iter(|| black_box(piecewise_linear(waveform, &assignments).unwrap()));
        });
        let constant = steps(size);
        group.bench_with_input(BenchmarkId::new("constant", size), &constant, |b, waveform| {
            b.iter(|| black_box(piecewise_constant(waveform, &assignments).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tiling, bench_discretization);
criterion_main!(benches);
