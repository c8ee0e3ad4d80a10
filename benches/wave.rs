use criterion::{black_box, criterion_group, criterion_main, Criterion};

use beatfield::config::OrbitConfig;
use beatfield::engine::field::GeometryField;

fn wave_benchmark(c: &mut Criterion) {
    let config = OrbitConfig::default();
    let mut field = GeometryField::orbit(config.radius, &config).unwrap();

    c.bench_function("orbit wave", |b| {
        let mut note = 0.0f32;
        b.iter(|| {
            note = (note + 7.0) % 255.0;
            field.wave(black_box(note), config.smoothing);
        })
    });
}

criterion_group!(benches, wave_benchmark);
criterion_main!(benches);
