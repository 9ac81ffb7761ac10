//! The Idle/Reactive/Breathing mode state machine.
//!
//! The controller owns all long-lived state. A persistent button worker
//! reports debounced presses over a channel; the main loop cycles the mode
//! on each press, joining the outgoing mode's workers before starting the
//! next mode's, so no two modes ever drive the serial line concurrently.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel as xch;
use rand::seq::SliceRandom;
use spider_traits::{Button, Clock, DistanceSensor, LightStrip, RespirationSensor, Transport};

use crate::engine::AnimationEngine;
use crate::error::{Result, SpiderError};
use crate::fusion::{ProximityFusion, Zone};
use crate::hw_error::map_hw_error;
use crate::script::{
    AnimationScript, BIG_BREATH_SCRIPT, BREATHING_SCRIPT, INTIMATE_SCRIPT, PERSONAL_PLAYLISTS,
    SOCIAL_PUBLIC_SCRIPT,
};
use crate::worker::Worker;

/// Color shown on the light strip for occupied zones.
const ZONE_COLOR: [u8; 3] = [255, 255, 180];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle = 0,
    Reactive = 1,
    Breathing = 2,
}

impl Mode {
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::Reactive,
            Self::Reactive => Self::Breathing,
            Self::Breathing => Self::Idle,
        }
    }

    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index {
            1 => Self::Reactive,
            2 => Self::Breathing,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BehaviorTuning {
    pub button_poll_ms: u64,
    pub zone_debounce_ms: u64,
    pub breath_min_v: f32,
    pub breath_max_v: f32,
    pub breath_interval_ms: u64,
    pub respiration_poll_ms: u64,
    pub idle_poll_ms: u64,
}

impl From<&spider_config::BehaviorCfg> for BehaviorTuning {
    fn from(cfg: &spider_config::BehaviorCfg) -> Self {
        Self {
            button_poll_ms: cfg.button_poll_ms,
            zone_debounce_ms: cfg.zone_debounce_ms,
            breath_min_v: cfg.breath_min_v,
            breath_max_v: cfg.breath_max_v,
            breath_interval_ms: cfg.breath_interval_ms,
            respiration_poll_ms: cfg.respiration_poll_ms,
            idle_poll_ms: cfg.idle_poll_ms,
        }
    }
}

/// Flags shared between the reactive workers. Fresh per mode entry.
struct ReactiveShared {
    /// Debounced zone index, written by the proximity worker.
    zone: AtomicU8,
    /// Latched by the respiration worker, consumed by the proximity worker.
    big_breath: AtomicBool,
}

pub struct BehaviorController<T, C, D, R, B, L>
where
    T: Transport + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
    D: DistanceSensor + Send + 'static,
    R: RespirationSensor + Send + 'static,
    B: Button + Send + 'static,
    L: LightStrip + Send + 'static,
{
    engine: Arc<Mutex<AnimationEngine<T, C>>>,
    fusion: Arc<Mutex<ProximityFusion<D, C>>>,
    respiration: Arc<Mutex<R>>,
    button: Option<B>,
    lights: Arc<Mutex<L>>,
    scripts: Arc<BTreeMap<String, AnimationScript>>,
    tuning: BehaviorTuning,
    clock: C,
    mode: Arc<AtomicU8>,
    fatal: Arc<Mutex<Option<crate::error::Report>>>,
}

impl<T, C, D, R, B, L> BehaviorController<T, C, D, R, B, L>
where
    T: Transport + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
    D: DistanceSensor + Send + 'static,
    R: RespirationSensor + Send + 'static,
    B: Button + Send + 'static,
    L: LightStrip + Send + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: AnimationEngine<T, C>,
        fusion: ProximityFusion<D, C>,
        respiration: R,
        button: B,
        lights: L,
        scripts: BTreeMap<String, AnimationScript>,
        tuning: BehaviorTuning,
        clock: C,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            fusion: Arc::new(Mutex::new(fusion)),
            respiration: Arc::new(Mutex::new(respiration)),
            button: Some(button),
            lights: Arc::new(Mutex::new(lights)),
            scripts: Arc::new(scripts),
            tuning,
            clock,
            mode: Arc::new(AtomicU8::new(Mode::Idle.index())),
            fatal: Arc::new(Mutex::new(None)),
        }
    }

    /// Current mode, readable from other threads (tests, status display).
    #[must_use]
    pub fn mode_handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.mode)
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        Mode::from_index(self.mode.load(Ordering::Relaxed))
    }

    /// Run the state machine until `shutdown` is raised or a worker hits
    /// an unrecoverable configuration fault.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let button = self
            .button
            .take()
            .ok_or_else(|| SpiderError::Config("behavior controller already ran".into()))?;
        let (press_tx, press_rx) = xch::bounded::<()>(1);
        let button_worker = self.spawn_button_worker(button, press_tx);

        let mut workers = self.start_mode_workers(self.mode());
        tracing::info!(mode = ?self.mode(), "behavior controller started");

        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                break Ok(());
            }
            if let Some(report) = self.take_fatal() {
                break Err(report);
            }
            if press_rx.try_recv().is_ok() {
                let next = self.mode().next();
                tracing::info!(from = ?self.mode(), to = ?next, "mode change requested");
                // Transactional switch: fully join the outgoing workers
                // before the next mode touches the serial line.
                for worker in workers.drain(..) {
                    worker.stop_and_join();
                }
                self.mode.store(next.index(), Ordering::Relaxed);
                workers = self.start_mode_workers(next);
            }
            self.clock
                .sleep(Duration::from_millis(self.tuning.idle_poll_ms));
        };

        for worker in workers.drain(..) {
            worker.stop_and_join();
        }
        button_worker.stop_and_join();
        tracing::info!("behavior controller stopped");
        outcome
    }

    fn take_fatal(&self) -> Option<crate::error::Report> {
        self.fatal.lock().ok().and_then(|mut slot| slot.take())
    }

    fn spawn_button_worker(&self, mut button: B, press_tx: xch::Sender<()>) -> Worker {
        let clock = self.clock.clone();
        let poll = Duration::from_millis(self.tuning.button_poll_ms);
        Worker::spawn("button", move |stop| {
            let mut already_down = false;
            while !stop.load(Ordering::Relaxed) {
                clock.sleep(poll);
                match button.is_pressed() {
                    Ok(true) => {
                        if !already_down {
                            // Drop the press if the main loop is behind.
                            let _ = press_tx.try_send(());
                        }
                        already_down = true;
                    }
                    Ok(false) => already_down = false,
                    Err(e) => {
                        tracing::warn!(error = %map_hw_error(e.as_ref()), "button read failed");
                    }
                }
            }
        })
    }

    fn start_mode_workers(&self, mode: Mode) -> Vec<Worker> {
        match mode {
            Mode::Idle => vec![self.spawn_idle_worker()],
            Mode::Breathing => vec![self.spawn_breathing_worker()],
            Mode::Reactive => {
                let shared = Arc::new(ReactiveShared {
                    zone: AtomicU8::new(Zone::Public.index()),
                    big_breath: AtomicBool::new(false),
                });
                vec![
                    self.spawn_proximity_worker(Arc::clone(&shared)),
                    self.spawn_respiration_worker(shared),
                ]
            }
        }
    }

    /// No-op waiter; exists so the stop flag is observed promptly.
    fn spawn_idle_worker(&self) -> Worker {
        let clock = self.clock.clone();
        let poll = Duration::from_millis(self.tuning.idle_poll_ms);
        Worker::spawn("idle", move |stop| {
            while !stop.load(Ordering::Relaxed) {
                clock.sleep(poll);
            }
        })
    }

    fn spawn_breathing_worker(&self) -> Worker {
        let engine = Arc::clone(&self.engine);
        let scripts = Arc::clone(&self.scripts);
        let fatal = Arc::clone(&self.fatal);
        Worker::spawn("breathing", move |stop| {
            while !stop.load(Ordering::Relaxed) {
                if !play_script(&engine, &scripts, BREATHING_SCRIPT, &stop, &fatal) {
                    break;
                }
            }
        })
    }

    fn spawn_proximity_worker(&self, shared: Arc<ReactiveShared>) -> Worker {
        let engine = Arc::clone(&self.engine);
        let fusion = Arc::clone(&self.fusion);
        let lights = Arc::clone(&self.lights);
        let scripts = Arc::clone(&self.scripts);
        let fatal = Arc::clone(&self.fatal);
        let clock = self.clock.clone();
        let debounce_ms = self.tuning.zone_debounce_ms;
        let retry = Duration::from_millis(self.tuning.idle_poll_ms);

        Worker::spawn("proximity", move |stop| {
            let mut rng = rand::thread_rng();
            let mut playlist = *PERSONAL_PLAYLISTS
                .choose(&mut rng)
                .unwrap_or(&PERSONAL_PLAYLISTS[0]);
            let mut progress = 0usize;

            let mut zone = Zone::Public;
            let mut candidate = zone;
            let mut candidate_since = clock.now();

            while !stop.load(Ordering::Relaxed) {
                let reading = match fusion.lock() {
                    Ok(mut f) => f.sample(),
                    Err(_) => {
                        store_fatal(
                            &fatal,
                            SpiderError::Config("fusion lock poisoned".into()).into(),
                        );
                        break;
                    }
                };
                let reading = match reading {
                    Ok(r) => r,
                    Err(e) => {
                        // Transient sensor faults skip the cycle.
                        tracing::warn!(error = %e, "proximity sample failed");
                        clock.sleep(retry);
                        continue;
                    }
                };

                if reading.zone != zone {
                    if reading.zone != candidate {
                        candidate = reading.zone;
                        candidate_since = clock.now();
                    } else if clock.ms_since(candidate_since) >= debounce_ms {
                        zone = candidate;
                        shared.zone.store(zone.index(), Ordering::Relaxed);
                        tracing::debug!(?zone, distance = reading.distance_cm, "zone changed");
                        drive_lights(&lights, zone);
                    }
                } else {
                    candidate = zone;
                }

                let script = if shared.big_breath.swap(false, Ordering::Relaxed) {
                    progress = 0;
                    playlist = *PERSONAL_PLAYLISTS
                        .choose(&mut rng)
                        .unwrap_or(&PERSONAL_PLAYLISTS[0]);
                    BIG_BREATH_SCRIPT
                } else {
                    match zone {
                        Zone::Intimate => {
                            progress = 0;
                            INTIMATE_SCRIPT
                        }
                        Zone::Personal => {
                            let s = playlist[progress];
                            progress = (progress + 1).min(playlist.len() - 1);
                            s
                        }
                        Zone::Social | Zone::Public => {
                            progress = 0;
                            SOCIAL_PUBLIC_SCRIPT
                        }
                    }
                };

                if !play_script(&engine, &scripts, script, &stop, &fatal) {
                    break;
                }
            }
        })
    }

    fn spawn_respiration_worker(&self, shared: Arc<ReactiveShared>) -> Worker {
        let respiration = Arc::clone(&self.respiration);
        let fatal = Arc::clone(&self.fatal);
        let clock = self.clock.clone();
        let poll = Duration::from_millis(self.tuning.respiration_poll_ms);
        let interval_ms = self.tuning.breath_interval_ms;
        let (min_v, max_v) = (self.tuning.breath_min_v, self.tuning.breath_max_v);

        Worker::spawn("respiration", move |stop| {
            let epoch = clock.now();
            let mut last_event_ms: Option<u64> = None;
            while !stop.load(Ordering::Relaxed) {
                let volts = match respiration.lock() {
                    Ok(mut belt) => belt.read_voltage(),
                    Err(_) => {
                        store_fatal(
                            &fatal,
                            SpiderError::Config("respiration lock poisoned".into()).into(),
                        );
                        break;
                    }
                };
                match volts {
                    Ok(v) if v >= min_v && v < max_v => {
                        let now_ms = clock.ms_since(epoch);
                        let quiet = last_event_ms
                            .is_none_or(|last| now_ms.saturating_sub(last) >= interval_ms);
                        if quiet {
                            last_event_ms = Some(now_ms);
                            shared.big_breath.store(true, Ordering::Relaxed);
                            tracing::debug!(volts = v, "big breath detected");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %map_hw_error(e.as_ref()), "respiration read failed");
                    }
                }
                clock.sleep(poll);
            }
        })
    }
}

/// Play one script, absorbing transient faults. Returns false when the
/// worker should stop (fatal configuration error or poisoned lock).
fn play_script<T, C>(
    engine: &Arc<Mutex<AnimationEngine<T, C>>>,
    scripts: &BTreeMap<String, AnimationScript>,
    name: &str,
    stop: &AtomicBool,
    fatal: &Arc<Mutex<Option<crate::error::Report>>>,
) -> bool
where
    T: Transport,
    C: Clock,
{
    let Some(script) = scripts.get(name) else {
        store_fatal(fatal, SpiderError::Config(format!("unknown script {name:?}")).into());
        return false;
    };
    let result = match engine.lock() {
        Ok(mut engine) => engine.play(script, stop),
        Err(_) => {
            store_fatal(fatal, SpiderError::Config("engine lock poisoned".into()).into());
            return false;
        }
    };
    match result {
        Ok(_) => true,
        Err(report) => {
            let transient = matches!(
                report.downcast_ref::<SpiderError>(),
                Some(SpiderError::Transport(_) | SpiderError::Sensor(_))
            );
            if transient {
                tracing::warn!(script = name, error = %report, "transient fault during script");
                true
            } else {
                store_fatal(fatal, report);
                false
            }
        }
    }
}

fn store_fatal(fatal: &Arc<Mutex<Option<crate::error::Report>>>, report: crate::error::Report) {
    tracing::error!(error = %report, "unrecoverable behavior fault");
    if let Ok(mut slot) = fatal.lock() {
        slot.get_or_insert(report);
    }
}

fn drive_lights<L: LightStrip>(lights: &Arc<Mutex<L>>, zone: Zone) {
    let Ok(mut lights) = lights.lock() else {
        return;
    };
    let result = match zone {
        Zone::Public => lights.set_off(),
        occupied => lights.set_zone_color(occupied.index(), ZONE_COLOR),
    };
    if let Err(e) = result {
        tracing::warn!(error = %map_hw_error(e.as_ref()), "light strip update failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AnimationEngine, EngineCfg};
    use crate::fusion::{FusionCfg, ProximityFusion};
    use crate::mocks::{MockButton, MockDistance, MockLights, MockRespiration, MockTransport};
    use crate::pose::PoseTable;
    use crate::protocol::ServoLink;
    use crate::script::builtin_scripts;
    use spider_config::PoseEntry;
    use spider_traits::MonotonicClock;

    type TestController = BehaviorController<
        MockTransport,
        MonotonicClock,
        MockDistance,
        MockRespiration,
        MockButton,
        MockLights,
    >;

    fn controller() -> TestController {
        let entries = vec![PoseEntry {
            name: "park".to_string(),
            legs: [[1500; 4]; 6],
        }];
        let poses = Arc::new(PoseTable::new(entries, &BTreeMap::new()).unwrap());
        let engine = AnimationEngine::new(
            ServoLink::new(MockTransport::new()),
            poses,
            MonotonicClock::new(),
            EngineCfg {
                poll_ms: 1,
                motion_timeout_ms: 10,
                default_duration_ms: 10,
                settle_ms: 0,
            },
            "park",
        )
        .unwrap();
        let fusion = ProximityFusion::new(
            MockDistance::new(),
            MonotonicClock::new(),
            FusionCfg {
                channels: [2, 3],
                filter_length: 1,
                rejection_threshold_cm: 30.0,
                valid_min_cm: 20.0,
                valid_max_cm: 770.0,
                warn_interval_s: 5,
            },
        );
        let button = MockButton::new();
        // Held from the start: the first poll requests Reactive mode.
        button.handle().store(true, Ordering::Relaxed);
        BehaviorController::new(
            engine,
            fusion,
            MockRespiration::new(),
            button,
            MockLights::new(),
            builtin_scripts(),
            BehaviorTuning {
                button_poll_ms: 1,
                zone_debounce_ms: 10,
                breath_min_v: 1.36,
                breath_max_v: 4.5,
                breath_interval_ms: 10,
                respiration_poll_ms: 1,
                idle_poll_ms: 1,
            },
            MonotonicClock::new(),
        )
    }

    fn poison<T: Send + 'static>(lock: Arc<Mutex<T>>) {
        let _ = std::thread::spawn(move || {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        })
        .join();
    }

    #[test]
    fn poisoned_fusion_lock_is_fatal_not_silent() {
        let mut controller = controller();
        poison(Arc::clone(&controller.fusion));
        let shutdown = AtomicBool::new(false);
        // The proximity worker dies on its first sample; run() must learn
        // about it rather than idling with a dead worker.
        assert!(controller.run(&shutdown).is_err());
    }

    #[test]
    fn poisoned_respiration_lock_is_fatal_not_silent() {
        let mut controller = controller();
        poison(Arc::clone(&controller.respiration));
        let shutdown = AtomicBool::new(false);
        assert!(controller.run(&shutdown).is_err());
    }
}
