use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{info, warn};

use crate::error::{ControlError, GpioError};
use crate::gpio::{GpioPort, FAN, PELTIER, TANK_TEMP};
use crate::params::Params;
use crate::state::{Phase, State};
use crate::status::{StatusMessage, StatusSink};

/// Per-tick outcome: each sub-tick succeeds or fails independently, and a
/// failure in the peltier half never prevents the fan half from running.
#[derive(Debug)]
pub struct TickReport {
    pub peltier: Result<(), GpioError>,
    pub fan: Result<(), GpioError>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.peltier.is_ok() && self.fan.is_ok()
    }
}

struct Shared {
    /// `Some` exactly while the loop is running. A tick holds this lock
    /// across both sub-ticks, so a snapshot never observes a state spanning
    /// them.
    state: Mutex<Option<State>>,
    /// Cooperative cancellation, checked at tick boundaries.
    stop: AtomicBool,
    /// Signalled when the loop clears `state` on exit.
    done: Condvar,
}

/// The temperature-regulation state machine.
///
/// Two phases, `cool` and `idle`, with a hysteresis band between `low` and
/// `high`: in `cool` the peltier is on until the temperature drops below
/// `low`; in `idle` it stays off until the temperature reaches `high`. The
/// fan keeps running for `fan_retain` seconds after the peltier switches
/// off. Actuation is issued only when the observed device state disagrees
/// with the desired one.
pub struct Controller<G> {
    params: Params,
    gpio: G,
    shared: Arc<Shared>,
}

impl<G: GpioPort> Controller<G> {
    /// Params are assumed validated by the caller (the process entry points
    /// validate argv and RPC payloads before constructing a controller).
    pub fn new(params: Params, gpio: G) -> Self {
        Self {
            params,
            gpio,
            shared: Arc::new(Shared {
                state: Mutex::new(None),
                stop: AtomicBool::new(false),
                done: Condvar::new(),
            }),
        }
    }

    /// The active params. Never mutated while the loop runs.
    pub fn params(&self) -> Params {
        self.params
    }

    /// Run the loop until [`Controller::stop`] is called. Only one run may
    /// be active per controller; a second concurrent `run()` fails without
    /// touching the existing state.
    ///
    /// Each iteration times its own duration and sleeps the remainder of
    /// `tick_time`; an iteration that overruns the period starts the next
    /// tick immediately, with no catch-up ticks queued.
    pub fn run(&self, sink: &mut dyn StatusSink) -> Result<(), ControlError> {
        {
            let mut guard = self.lock_state();
            if guard.is_some() {
                return Err(ControlError::AlreadyRunning);
            }
            *guard = Some(State::INITIAL);
            self.shared.stop.store(false, Ordering::SeqCst);
        }

        info!(params = ?self.params, "cooling service started");
        sink.emit(&StatusMessage::Params(self.params));

        loop {
            let started = Instant::now();

            sink.emit(&StatusMessage::Running);
            let report = self.tick();
            if let Err(err) = &report.peltier {
                warn!(%err, "peltier tick failed");
                sink.emit(&StatusMessage::PeltierFail(err.to_string()));
            }
            if let Err(err) = &report.fan {
                warn!(%err, "fan tick failed");
                sink.emit(&StatusMessage::FanFail(err.to_string()));
            }
            if let Some(state) = self.snapshot() {
                sink.emit(&StatusMessage::State(state));
            }
            sink.emit(&StatusMessage::Done);

            if self.shared.stop.load(Ordering::SeqCst) {
                break;
            }

            let elapsed = started.elapsed();
            if let Some(remaining) = self.params.tick_duration().checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }

            if self.shared.stop.load(Ordering::SeqCst) {
                break;
            }
        }

        let mut guard = self.lock_state();
        *guard = None;
        self.shared.done.notify_all();
        info!("tick loop ended");
        Ok(())
    }

    /// Request graceful termination and block until the loop has actually
    /// exited. Safe to call from any thread; a no-op when the loop is not
    /// running — `stop_when_not_running_is_a_noop` pins that contract.
    ///
    /// Stop cannot interrupt a tick in progress or a blocking RPC call
    /// inside one, so a hung peripheral service stalls shutdown.
    pub fn stop(&self) {
        let mut guard = self.lock_state();
        if guard.is_none() {
            return;
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        while guard.is_some() {
            guard = self
                .shared
                .done
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        info!("cooling service stopped");
    }

    /// Whether a run is currently active.
    pub fn is_running(&self) -> bool {
        self.lock_state().is_some()
    }

    /// A copy of the current state, `None` when not running. Guarded by the
    /// same lock a tick holds, so the copy never spans sub-ticks.
    pub fn snapshot(&self) -> Option<State> {
        *self.lock_state()
    }

    /// One full tick: peltier sub-tick, then fan sub-tick. Each failure is
    /// caught independently; the report reflects both outcomes.
    fn tick(&self) -> TickReport {
        let mut guard = self.lock_state();
        let Some(state) = guard.as_mut() else {
            // Only reachable if stop raced the loop exit; nothing to do.
            return TickReport {
                peltier: Ok(()),
                fan: Ok(()),
            };
        };

        let peltier = self.peltier_tick(state);
        let fan = self.fan_tick(state);

        TickReport { peltier, fan }
    }

    /// Read the temperature, transition the phase, actuate the peltier.
    fn peltier_tick(&self, state: &mut State) -> Result<(), GpioError> {
        let temperature = self.gpio.read(TANK_TEMP)?;

        match state.phase {
            Phase::Cool if temperature < self.params.low => {
                state.phase = Phase::Idle;
                info!(temperature, "changed to idle phase");
            }
            Phase::Idle if temperature >= self.params.high => {
                state.phase = Phase::Cool;
                info!(temperature, "changed to cool phase");
            }
            _ => {}
        }

        let peltier_on = self.gpio.is_on(PELTIER)?;
        match (peltier_on, state.phase) {
            (true, Phase::Idle) => {
                self.gpio.turn_off(PELTIER)?;
                info!("turning peltier off");
            }
            (false, Phase::Cool) => {
                self.gpio.turn_on(PELTIER)?;
                info!("turning peltier on");
            }
            _ => {}
        }

        Ok(())
    }

    /// Read the peltier state, update the retain counter, actuate the fan.
    ///
    /// The fan decision uses the count of *completed* ticks since the
    /// peltier was last observed on: the tick in which it turns off still
    /// counts as zero, so the fan stays on through
    /// `ceil(fan_retain / tick_time)` further ticks and turns off at the
    /// first tick where `last_peltier_on * tick_time >= fan_retain`.
    fn fan_tick(&self, state: &mut State) -> Result<(), GpioError> {
        let peltier_on = self.gpio.is_on(PELTIER)?;

        let since_cooling;
        if peltier_on {
            state.last_peltier_on = 0;
            since_cooling = 0.0;
        } else {
            since_cooling = state.last_peltier_on as f64 * self.params.tick_time;
            state.last_peltier_on += 1;
        }

        let fan_on = self.gpio.is_on(FAN)?;
        if since_cooling < self.params.fan_retain && !fan_on {
            self.gpio.turn_on(FAN)?;
            info!("turning fan on");
        } else if since_cooling >= self.params.fan_retain && fan_on {
            self.gpio.turn_off(FAN)?;
            info!("turning fan off");
        }

        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<State>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
