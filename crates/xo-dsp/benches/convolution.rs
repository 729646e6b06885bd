//! Crossover design and streaming benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use xo_core::{AudioFilter, MemorySource};
use xo_dsp::crossover::{create_three_way, create_two_way};
use xo_dsp::filters::CrossoverFilter;
use xo_dsp::fourier::fft;
use rustfft::num_complex::Complex;

fn bench_fft(c: &mut Criterion) {
    let signal: Vec<Complex<f64>> = (0..4096)
        .map(|i| Complex::new((i as f64 * 0.01).sin(), 0.0))
        .collect();

    c.bench_function("fft_4096", |b| {
        b.iter(|| {
            let mut x = signal.clone();
            fft(black_box(&mut x)).unwrap();
        })
    });
}

fn bench_design(c: &mut Criterion) {
    c.bench_function("design_three_way", |b| {
        b.iter(|| {
            create_three_way(500.0, 4000.0, 200.0, 800.0, black_box(44100.0), true, false, 10.0)
                .unwrap()
        })
    });
}

fn bench_stream(c: &mut Criterion) {
    let crossover = create_two_way(2500.0, 500.0, 44100.0, true, false, 10.0).unwrap();
    let input: Vec<f64> = (0..2 * 44100).map(|i| (i as f64 * 0.01).sin()).collect();

    c.bench_function("stream_two_way_1s", |b| {
        b.iter(|| {
            let source = MemorySource::new(input.clone(), 2, 44100).unwrap();
            let mut filter = CrossoverFilter::new(source, &crossover).unwrap();
            let mut buf = vec![0.0; filter.optimal_read_size()];
            while filter.read(black_box(&mut buf)).unwrap() > 0 {}
        })
    });
}

criterion_group!(benches, bench_fft, bench_design, bench_stream);
criterion_main!(benches);
