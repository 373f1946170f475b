//! 粒子系统性能基准测试
//!
//! 测试每帧更新、分配/退役循环和上传的开销

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use particle_engine::config::ParticleSystemConfig;
use particle_engine::render::particles::{
    AllocatorSettings, EmitterShape, EmitterTransform, HostDevice, MinMaxValue,
    ParticleAllocator, ParticleLayout, ParticleSystem, SimulationSpace, SpawnAttributes,
};

fn bench_system_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("system_update");

    for rate in [1_000.0f32, 10_000.0, 100_000.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(rate), rate, |b, &rate| {
            let config = ParticleSystemConfig {
                capacity: 1 << 16,
                max_capacity: 1 << 18,
                emission_rate: MinMaxValue::constant(rate),
                start_lifetime: MinMaxValue::random_between(0.5, 2.0),
                shape: EmitterShape::Sphere { radius: 1.0 },
                seed: Some(1),
                ..Default::default()
            };
            let mut system = match ParticleSystem::new(config, HostDevice::default()) {
                Ok(system) => system,
                Err(e) => panic!("failed to create particle system: {}", e),
            };
            let transform = EmitterTransform::default();

            b.iter(|| {
                let _ = system.update(black_box(1.0 / 60.0), &transform);
                black_box(system.stats().alive_count)
            });
        });
    }

    group.finish();
}

fn bench_allocate_retire_cycle(c: &mut Criterion) {
    let layout = ParticleLayout::new(false, false, SimulationSpace::World);
    let mut allocator = ParticleAllocator::new(
        layout,
        AllocatorSettings {
            capacity: 4096,
            max_capacity: 4096,
            growth_increment: 0,
            retire_frame_delay: 1,
        },
    );
    let attrs = SpawnAttributes {
        lifetime: 0.0,
        ..Default::default()
    };
    let mut frame = 0u32;

    c.bench_function("allocate_retire_1000", |b| {
        b.iter(|| {
            frame = frame.wrapping_add(1);
            for _ in 0..1000 {
                allocator.allocate(black_box(&attrs));
            }
            allocator.mark_uploaded();
            allocator.retire_expired(0.0, frame);
            allocator.free_retired(frame.wrapping_add(1));
        });
    });
}

criterion_group!(benches, bench_system_update, bench_allocate_retire_cycle);
criterion_main!(benches);
