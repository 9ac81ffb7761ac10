//! Hardware assembly and command execution.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eyre::WrapErr;
use spider_config::Config;
use spider_core::behavior::BehaviorTuning;
use spider_core::engine::EngineCfg;
use spider_core::fusion::FusionCfg;
use spider_core::pose::{JOINTS_PER_LEG, LEGS};
use spider_core::{
    builtin_scripts, AnimationEngine, BehaviorController, PoseTable, ProximityFusion, ServoLink,
    FALLBACK_POSE,
};
use spider_traits::{Button, DistanceSensor, LightStrip, MonotonicClock, RespirationSensor,
    Transport};

type BoxTransport = Box<dyn Transport + Send>;
type BoxDistance = Box<dyn DistanceSensor + Send>;
type BoxRespiration = Box<dyn RespirationSensor + Send>;
type BoxButton = Box<dyn Button + Send>;
type BoxLights = Box<dyn LightStrip + Send>;

pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let cfg = if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        spider_config::load_toml(&text)
            .wrap_err_with(|| format!("parsing config {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    cfg.validate()?;
    Ok(cfg)
}

pub fn build_pose_table(cfg: &Config) -> eyre::Result<Arc<PoseTable>> {
    let poses_cfg = cfg
        .poses
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no [poses] file configured; pose commands need one"))?;
    let entries = spider_config::load_pose_file(&poses_cfg.file)?;
    Ok(Arc::new(PoseTable::new(entries, &cfg.routes)?))
}

#[cfg(feature = "hardware")]
pub fn build_transport(cfg: &Config) -> eyre::Result<BoxTransport> {
    let link = spider_hardware::serial::SerialLink::open(&cfg.serial.port, cfg.serial.baud)?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "hardware"))]
pub fn build_transport(_cfg: &Config) -> eyre::Result<BoxTransport> {
    tracing::info!("using simulated servo controllers");
    Ok(Box::new(spider_hardware::SimulatedServos::new()))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn build_peripherals(
    cfg: &Config,
) -> eyre::Result<(BoxDistance, BoxRespiration, BoxButton, BoxLights)> {
    use spider_hardware::adc::ads1115::Ads1115;
    use spider_hardware::{AdcBus, AdcButton, AdcRangefinders, RespirationBelt};

    const ADC_ADDRESS: u16 = 0x48;
    const LIGHT_ADDRESS: u16 = 0x04;
    const SUPPLY_VOLTS: f32 = 5.0;

    let bus = AdcBus::new(Ads1115::open(ADC_ADDRESS)?);
    let distance = Box::new(AdcRangefinders::new(bus.clone(), SUPPLY_VOLTS));
    let respiration = Box::new(RespirationBelt::new(bus.clone(), cfg.channels.respiration));
    let button = Box::new(AdcButton::new(
        bus,
        cfg.channels.button,
        cfg.behavior.button_threshold_mv,
    ));
    let lights = Box::new(spider_hardware::light::I2cLightStrip::open(LIGHT_ADDRESS)?);
    Ok((distance, respiration, button, lights))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn build_peripherals(
    cfg: &Config,
) -> eyre::Result<(BoxDistance, BoxRespiration, BoxButton, BoxLights)> {
    use spider_hardware::{AdcBus, AdcButton, AdcRangefinders, RespirationBelt, SimulatedAdc};

    let adc = SimulatedAdc::new();
    // Plausible idle values: button released, belt slack, nothing nearby.
    adc.set_millivolts(cfg.channels.button, 3300.0);
    adc.set_millivolts(cfg.channels.respiration, 500.0);
    for channel in cfg.channels.distance {
        adc.set_millivolts(channel, 2500.0);
    }

    let bus = AdcBus::new(adc);
    let distance = Box::new(AdcRangefinders::new(bus.clone(), 5.0));
    let respiration = Box::new(RespirationBelt::new(bus.clone(), cfg.channels.respiration));
    let button = Box::new(AdcButton::new(
        bus,
        cfg.channels.button,
        cfg.behavior.button_threshold_mv,
    ));
    let lights = Box::new(spider_hardware::SimulatedLightStrip::new());
    Ok((distance, respiration, button, lights))
}

fn build_engine(
    cfg: &Config,
    poses: Arc<PoseTable>,
) -> eyre::Result<AnimationEngine<BoxTransport, MonotonicClock>> {
    let link = ServoLink::new(build_transport(cfg)?);
    AnimationEngine::new(
        link,
        poses,
        MonotonicClock::new(),
        EngineCfg::from(&cfg.animation),
        FALLBACK_POSE,
    )
}

fn shutdown_flag() -> eyre::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let flag_in_handler = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown requested");
        flag_in_handler.store(true, Ordering::Relaxed);
    })
    .wrap_err("installing Ctrl-C handler")?;
    Ok(flag)
}

/// Run the behavior controller until Ctrl-C.
pub fn interact(cfg: &Config) -> eyre::Result<()> {
    let poses = build_pose_table(cfg)?;
    let engine = build_engine(cfg, poses)?;
    let (distance, respiration, button, lights) = build_peripherals(cfg)?;

    let fusion = ProximityFusion::new(
        distance,
        MonotonicClock::new(),
        FusionCfg::from(&cfg.proximity).with_channels(cfg.channels.distance),
    );
    let mut controller = BehaviorController::new(
        engine,
        fusion,
        respiration,
        button,
        lights,
        builtin_scripts(),
        BehaviorTuning::from(&cfg.behavior),
        MonotonicClock::new(),
    );

    let shutdown = shutdown_flag()?;
    controller.run(&shutdown)
}

pub fn play(cfg: &Config, name: &str) -> eyre::Result<()> {
    let scripts = builtin_scripts();
    let script = scripts
        .get(name)
        .ok_or_else(|| eyre::eyre!("unknown script {name:?}"))?;
    let poses = build_pose_table(cfg)?;
    let mut engine = build_engine(cfg, poses)?;
    let stop = AtomicBool::new(false);
    let outcome = engine.play(script, &stop)?;
    tracing::info!(script = name, ?outcome, "script finished");
    Ok(())
}

pub fn animate(cfg: &Config, pose: &str, duration_ms: u64) -> eyre::Result<()> {
    let poses = build_pose_table(cfg)?;
    let mut engine = build_engine(cfg, poses)?;
    let stop = AtomicBool::new(false);
    let outcome = engine.animate(pose, [duration_ms; LEGS], &stop)?;
    tracing::info!(pose, ?outcome, "animation finished");
    Ok(())
}

pub fn home(cfg: &Config) -> eyre::Result<()> {
    let mut link = ServoLink::new(build_transport(cfg)?);
    link.go_home()?;
    println!("controllers sent home");
    Ok(())
}

pub fn off(cfg: &Config) -> eyre::Result<()> {
    let mut link = ServoLink::new(build_transport(cfg)?);
    link.set_multiple(0, &[0; LEGS * JOINTS_PER_LEG])?;
    println!("all servos off");
    Ok(())
}

pub fn position(cfg: &Config, channel: u8) -> eyre::Result<()> {
    let mut link = ServoLink::new(build_transport(cfg)?);
    match link.get_position(channel)? {
        Some(pulse) => println!("channel {channel}: {pulse} us"),
        None => println!("channel {channel}: no response"),
    }
    Ok(())
}

pub fn moving(cfg: &Config) -> eyre::Result<()> {
    let mut link = ServoLink::new(build_transport(cfg)?);
    println!("moving: {}", link.get_moving()?);
    Ok(())
}

/// Probe both controllers' error registers.
pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    let mut link = ServoLink::new(build_transport(cfg)?);
    for device in 0..2u8 {
        match link.get_errors(device)? {
            Some(0) => println!("controller {device}: ok"),
            Some(bits) => println!("controller {device}: error bits {bits:#06x}"),
            None => println!("controller {device}: no response"),
        }
    }
    Ok(())
}
