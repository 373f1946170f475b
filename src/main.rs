use particle_engine::config::EngineConfig;
use particle_engine::core::{init_logging, ParticleResult};
use particle_engine::render::particles::{EmitterTransform, HostDevice, ParticleSystem};

/// 无头运行的帧数
const FRAMES: u32 = 600;
const FRAME_TIME: f32 = 1.0 / 60.0;

fn run() -> ParticleResult<()> {
    let mut config = EngineConfig::load_or_default();
    config.apply_env_overrides();
    init_logging(&config.logging);
    config.validate()?;

    let mut system = ParticleSystem::new(config.particles, HostDevice::default())?;
    let transform = EmitterTransform::default();

    for frame in 0..FRAMES {
        system.update(FRAME_TIME, &transform)?;
        if frame % 60 == 59 {
            let stats = system.stats();
            tracing::info!(
                target: "particles",
                "t={:.1}s alive={} capacity={} emitted={} dropped={}",
                system.sim_time(),
                stats.alive_count,
                stats.capacity,
                stats.total_emitted,
                stats.total_dropped
            );
        }
    }

    let uploader = system.uploader();
    tracing::info!(
        target: "particles",
        "Finished {} frames: {} upload calls, {} bytes uploaded",
        FRAMES,
        uploader.total_upload_calls(),
        uploader.total_bytes_uploaded()
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Particle engine failed: {}", e);
        std::process::exit(1);
    }
}
