//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which drives a
//! [`StepOrchestrator`] frame by frame in a background thread, including
//! start, pause, resume, single-step and reset, and publishes a particle
//! snapshot after every frame.

use fluid_kernel::FluidMetrics;
use glam::Vec3;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SimulationConfig;
use crate::stepper::{StepCompleted, StepOrchestrator, FIXED_FRAME_TIME};

/// Longest measured frame fed to the simulation (seconds)
pub const MAX_FRAME_TIME: f32 = 1.0 / 30.0;

/// Poll interval of the runner thread while idle
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Runner state enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively running
    Running,
    /// Simulation paused
    Paused,
    /// Simulation finished (reached stopping condition or runner dropped)
    Finished,
    /// Simulation state became non-finite; only a reset recovers
    Error,
}

/// Runner options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunnerOptions {
    /// Feed fixed 1/60 s frames instead of measured wall time
    pub fixed_time_step: bool,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

impl RunnerOptions {
    /// Options from a validated configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            fixed_time_step: config.fixed_time_step,
            max_frames: config.max_frames,
        }
    }
}

/// Particle state published after a frame
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSnapshot {
    /// Frame count when the snapshot was taken
    pub frame: u64,
    /// Positions
    pub positions: Vec<Vec3>,
    /// Velocities
    pub velocities: Vec<Vec3>,
    /// Kernel metrics
    pub metrics: FluidMetrics,
}

/// Requests queued by the control interface for the runner thread
#[derive(Default)]
struct PendingRequests {
    reset: bool,
    single_step: bool,
    subscribers: Vec<SyncSender<StepCompleted>>,
}

/// Shared state between the runner thread and control interface
struct SharedState {
    /// Current runner state
    state: RunnerState,
    /// Current simulation time (seconds)
    sim_time: f64,
    /// Number of steps executed
    step_count: u64,
    /// Number of frames executed
    frame_count: u64,
    /// Most recent error message (if state is Error)
    error_message: Option<String>,
    /// Latest published particle state
    snapshot: Option<ParticleSnapshot>,
    /// Work for the runner thread
    pending: PendingRequests,
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    /// Shared state (protected by mutex)
    shared: Arc<Mutex<SharedState>>,
    /// Handle to the background thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SimulationRunner {
    /// Move `orchestrator` onto a background thread. The runner waits in
    /// [`RunnerState::Created`] until [`start`](Self::start) is called.
    pub fn new(orchestrator: StepOrchestrator, options: RunnerOptions) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            sim_time: 0.0,
            step_count: 0,
            frame_count: 0,
            error_message: None,
            snapshot: None,
            pending: PendingRequests::default(),
        }));

        let shared_clone = Arc::clone(&shared);

        // Spawn background thread
        let thread_handle = thread::spawn(move || {
            run_simulation_loop(orchestrator, shared_clone, options);
        });

        Self {
            shared,
            thread_handle: Some(thread_handle),
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        lock(&self.shared).state.clone()
    }

    /// Get current simulation time (seconds)
    pub fn sim_time(&self) -> f64 {
        lock(&self.shared).sim_time
    }

    /// Get current step count
    pub fn step_count(&self) -> u64 {
        lock(&self.shared).step_count
    }

    /// Get current frame count
    pub fn frame_count(&self) -> u64 {
        lock(&self.shared).frame_count
    }

    /// Get error message if state is Error
    pub fn error_message(&self) -> Option<String> {
        lock(&self.shared).error_message.clone()
    }

    /// Latest particle snapshot, if any frame has run
    pub fn snapshot(&self) -> Option<ParticleSnapshot> {
        lock(&self.shared).snapshot.clone()
    }

    /// Metrics of the latest snapshot
    pub fn metrics(&self) -> Option<FluidMetrics> {
        lock(&self.shared).snapshot.as_ref().map(|s| s.metrics)
    }

    /// Receive a notification for every step from now on
    pub fn subscribe(&self, capacity: usize) -> Receiver<StepCompleted> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        lock(&self.shared).pending.subscribers.push(tx);
        rx
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Created {
            state.state = RunnerState::Running;
        }
    }

    /// Pause the simulation
    pub fn pause(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Running {
            state.state = RunnerState::Paused;
        }
    }

    /// Resume the simulation
    pub fn resume(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Paused {
            state.state = RunnerState::Running;
        }
    }

    /// Pause if running, resume if paused
    pub fn toggle_pause(&self) {
        let mut state = lock(&self.shared);
        state.state = match state.state {
            RunnerState::Running => RunnerState::Paused,
            RunnerState::Paused => RunnerState::Running,
            ref other => other.clone(),
        };
    }

    /// Pause and advance by exactly one step
    pub fn single_step(&self) {
        let mut state = lock(&self.shared);
        if matches!(state.state, RunnerState::Running | RunnerState::Paused) {
            state.state = RunnerState::Paused;
            state.pending.single_step = true;
        }
    }

    /// Restore the spawn state; the runner is paused afterwards
    pub fn reset(&self) {
        let mut state = lock(&self.shared);
        if state.state != RunnerState::Finished {
            state.pending.reset = true;
        }
    }

    /// Wait for the simulation thread to complete
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Thread panicked".to_string())?;
        }
        Ok(())
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Set state to Finished to signal thread to exit
        if let Ok(mut state) = self.shared.lock() {
            state.state = RunnerState::Finished;
        }
    }
}

/// Copy the orchestrator's counters and particles into the shared state.
/// Returns `false` once the runner should stop.
fn publish(
    orchestrator: &StepOrchestrator,
    shared: &Mutex<SharedState>,
    metrics: FluidMetrics,
    options: &RunnerOptions,
) -> bool {
    let kernel = orchestrator.kernel();
    let snapshot = ParticleSnapshot {
        frame: orchestrator.frame_count(),
        positions: kernel.positions().to_vec(),
        velocities: kernel.velocities().to_vec(),
        metrics,
    };

    let mut guard = lock(shared);
    guard.sim_time = orchestrator.sim_time();
    guard.step_count = orchestrator.step_count();
    guard.frame_count = orchestrator.frame_count();
    guard.snapshot = Some(snapshot);

    if orchestrator.is_corrupted() && guard.state != RunnerState::Error {
        guard.state = RunnerState::Error;
        guard.error_message = Some(format!(
            "{} particles hold non-finite values after frame {}",
            metrics.non_finite,
            orchestrator.frame_count()
        ));
        tracing::warn!("Simulation entered error state; reset to recover");
    }

    if let Some(max_frames) = options.max_frames {
        if orchestrator.frame_count() >= max_frames && guard.state == RunnerState::Running {
            tracing::info!("Simulation finished: reached max_frames = {}", max_frames);
            guard.state = RunnerState::Finished;
            return false;
        }
    }
    true
}

/// Main simulation loop executed in background thread
fn run_simulation_loop(
    mut orchestrator: StepOrchestrator,
    shared: Arc<Mutex<SharedState>>,
    options: RunnerOptions,
) {
    // Wait for start signal
    loop {
        let state = lock(&shared).state.clone();
        match state {
            RunnerState::Created => thread::sleep(IDLE_POLL),
            RunnerState::Running => break,
            _ => return, // Exit if finished before start
        }
    }

    orchestrator.start();
    let start_wall_time = Instant::now();
    let mut last_frame = Instant::now();

    loop {
        let (state, pending) = {
            let mut guard = lock(&shared);
            (guard.state.clone(), std::mem::take(&mut guard.pending))
        };

        for tx in pending.subscribers {
            orchestrator.add_subscriber(tx);
        }

        if pending.reset {
            match orchestrator.reset() {
                Ok(()) => {
                    let metrics = orchestrator.kernel().metrics();
                    publish(&orchestrator, &shared, metrics, &options);
                    let mut guard = lock(&shared);
                    if guard.state != RunnerState::Finished {
                        guard.state = RunnerState::Paused;
                        guard.error_message = None;
                    }
                }
                Err(e) => {
                    let mut guard = lock(&shared);
                    guard.state = RunnerState::Error;
                    guard.error_message = Some(e.to_string());
                }
            }
            last_frame = Instant::now();
            continue;
        }

        match state {
            RunnerState::Running => {
                let frame_time = if options.fixed_time_step {
                    FIXED_FRAME_TIME
                } else {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;
                    elapsed.min(MAX_FRAME_TIME)
                };

                orchestrator.resume();
                let report = orchestrator.run_frame(frame_time);
                if !publish(&orchestrator, &shared, report.metrics, &options) {
                    break;
                }

                // Log progress periodically
                if orchestrator.frame_count() % 60 == 0 {
                    tracing::debug!(
                        "Frame {}: sim_time={:.4}s, dt={:.6}s, wall_time={:.2}s, max_speed={:.3}",
                        orchestrator.frame_count(),
                        orchestrator.sim_time(),
                        report.dt,
                        start_wall_time.elapsed().as_secs_f64(),
                        report.metrics.max_speed,
                    );
                }
            }
            RunnerState::Paused | RunnerState::Error => {
                orchestrator.pause();
                if pending.single_step && state == RunnerState::Paused {
                    let report = orchestrator.single_step(FIXED_FRAME_TIME);
                    publish(&orchestrator, &shared, report.metrics, &options);
                } else {
                    thread::sleep(IDLE_POLL);
                }
                last_frame = Instant::now();
            }
            RunnerState::Finished | RunnerState::Created => break,
        }
    }

    tracing::info!(
        "Simulation thread exiting: {} frames, {} steps, {:.4}s simulated",
        orchestrator.frame_count(),
        orchestrator.step_count(),
        orchestrator.sim_time()
    );
}
