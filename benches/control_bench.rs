use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use thermovalve::actuator::Direction;
use thermovalve::actuator::filter::PositionFilter;
use thermovalve::control::SetpointPid;

fn pid_compute_bench(c: &mut Criterion) {
    let mut pid =
        SetpointPid::new(-5.0, -0.01, -0.1, 22.0, (1034, 24600)).with_sample_time(Duration::ZERO);
    pid.set_auto_mode(true, 8000.0);

    let mut temperature = 21.0;
    c.bench_function("pid_compute", |b| {
        b.iter(|| {
            temperature += 0.001;
            black_box(pid.compute(black_box(temperature)));
        })
    });
}

fn position_filter_bench(c: &mut Criterion) {
    let mut filter = PositionFilter::new(20);
    filter.apply(8000, Direction::Stop);

    let mut raw = 8000;
    c.bench_function("position_filter_apply", |b| {
        b.iter(|| {
            raw += 7;
            black_box(filter.apply(black_box(raw), Direction::Up));
        })
    });
}

criterion_group!(benches, pid_compute_bench, position_filter_bench);
criterion_main!(benches);
