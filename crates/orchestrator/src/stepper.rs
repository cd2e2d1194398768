//! Frame sequencing on top of a [`SimulationKernel`].
//!
//! A frame is split into `iterations_per_frame` steps of equal length:
//!
//! ```text
//! dt = frame_time / iterations_per_frame * time_scale
//! ```
//!
//! Each step runs the full pass pipeline to completion, so pausing or
//! resetting always happens between steps. Every finished step is announced
//! to subscribers on bounded channels; a subscriber that falls behind misses
//! notifications instead of stalling the simulation.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use fluid_kernel::{FluidMetrics, KernelError, SimulationKernel};
use serde::Serialize;

use crate::config::SimulationConfig;

/// Frame length used when the simulation runs on a fixed time step.
pub const FIXED_FRAME_TIME: f32 = 1.0 / 60.0;

/// Whether a step is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepState {
    /// Between steps
    Idle,
    /// Executing the pass pipeline
    RunningStep,
}

/// Notification posted after every simulation step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepCompleted {
    /// Steps completed since the last reset, including this one
    pub step: u64,
    /// Simulated time after this step (seconds)
    pub sim_time: f64,
    /// Length of this step (seconds)
    pub dt: f32,
}

/// Summary of one `run_frame` or `single_step` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameReport {
    /// Steps executed by the call (zero when paused)
    pub steps_run: u32,
    /// Step length used
    pub dt: f32,
    /// Kernel metrics after the call
    pub metrics: FluidMetrics,
}

/// Time stepping settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    /// Multiplier applied to every frame time
    pub time_scale: f32,
    /// Steps per frame (at least 1)
    pub iterations_per_frame: u32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            iterations_per_frame: 3,
        }
    }
}

impl FrameSettings {
    /// Settings from a validated configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            time_scale: config.time_scale,
            iterations_per_frame: config.iterations_per_frame,
        }
    }

    /// Step length for a frame of `frame_time` seconds
    pub fn step_dt(&self, frame_time: f32) -> f32 {
        frame_time / self.iterations_per_frame.max(1) as f32 * self.time_scale
    }
}

/// Drives a kernel frame by frame
pub struct StepOrchestrator {
    /// Simulation back-end
    kernel: Box<dyn SimulationKernel + Send>,
    /// Time stepping settings
    settings: FrameSettings,
    /// Step in progress marker
    state: StepState,
    /// Frames are skipped while set
    paused: bool,
    /// Set when the kernel state held non-finite values after a frame
    corrupted: bool,
    /// Steps since the last reset
    step_count: u64,
    /// Frames since the last reset
    frame_count: u64,
    /// Simulated seconds since the last reset
    sim_time: f64,
    /// Open notification channels
    subscribers: Vec<SyncSender<StepCompleted>>,
    /// Notifications dropped because a channel was full
    dropped_notifications: u64,
}

impl StepOrchestrator {
    /// Wrap `kernel`. The orchestrator starts paused; call
    /// [`start`](Self::start) to let frames run.
    pub fn new(kernel: Box<dyn SimulationKernel + Send>, settings: FrameSettings) -> Self {
        Self {
            kernel,
            settings,
            state: StepState::Idle,
            paused: true,
            corrupted: false,
            step_count: 0,
            frame_count: 0,
            sim_time: 0.0,
            subscribers: Vec::new(),
            dropped_notifications: 0,
        }
    }

    /// Allow frames to run
    pub fn start(&mut self) {
        self.paused = false;
        tracing::info!(particles = self.kernel.particle_count(), "simulation started");
    }

    /// Stop running frames after the current step
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Continue running frames
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Flip the paused flag
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Returns `true` while frames are skipped
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current step state
    pub fn state(&self) -> StepState {
        self.state
    }

    /// Returns `true` once a frame left non-finite values in the kernel.
    /// Cleared by [`reset`](Self::reset).
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Steps since the last reset
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Frames since the last reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Simulated seconds since the last reset
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Notifications lost to full channels
    pub fn dropped_notifications(&self) -> u64 {
        self.dropped_notifications
    }

    /// Time stepping settings
    pub fn settings(&self) -> FrameSettings {
        self.settings
    }

    /// Replace the time stepping settings
    pub fn set_settings(&mut self, settings: FrameSettings) {
        self.settings = settings;
    }

    /// The driven kernel
    pub fn kernel(&self) -> &dyn SimulationKernel {
        self.kernel.as_ref()
    }

    /// Receive a [`StepCompleted`] for every step. At most `capacity`
    /// undelivered notifications are buffered.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<StepCompleted> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    /// Register an existing channel
    pub fn add_subscriber(&mut self, sender: SyncSender<StepCompleted>) {
        self.subscribers.push(sender);
    }

    /// Run one frame of `frame_time` seconds. Does nothing while paused.
    pub fn run_frame(&mut self, frame_time: f32) -> FrameReport {
        let dt = self.settings.step_dt(frame_time);
        if self.paused {
            return self.report(0, dt);
        }
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(frame_time, "ignoring frame with invalid time");
            return self.report(0, dt);
        }

        let iterations = self.settings.iterations_per_frame;
        for _ in 0..iterations {
            self.run_step(dt);
        }
        self.finish_frame(iterations, dt)
    }

    /// Run exactly one step with the step length of a `frame_time` frame,
    /// even while paused. The orchestrator is paused afterwards.
    pub fn single_step(&mut self, frame_time: f32) -> FrameReport {
        let dt = self.settings.step_dt(frame_time);
        self.paused = true;
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(frame_time, "ignoring single step with invalid time");
            return self.report(0, dt);
        }
        self.run_step(dt);
        self.finish_frame(1, dt)
    }

    /// Restore the spawn state, zero all counters and pause.
    pub fn reset(&mut self) -> Result<(), KernelError> {
        self.kernel.reset()?;
        self.paused = true;
        self.corrupted = false;
        self.state = StepState::Idle;
        self.step_count = 0;
        self.frame_count = 0;
        self.sim_time = 0.0;
        tracing::info!("simulation reset to spawn state");
        Ok(())
    }

    fn run_step(&mut self, dt: f32) {
        self.state = StepState::RunningStep;
        self.kernel.step(dt);
        self.step_count += 1;
        self.sim_time += dt as f64;
        self.state = StepState::Idle;

        self.notify(StepCompleted {
            step: self.step_count,
            sim_time: self.sim_time,
            dt,
        });
    }

    fn notify(&mut self, event: StepCompleted) {
        let mut dropped = 0;
        self.subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        if dropped > 0 {
            self.dropped_notifications += dropped;
            tracing::trace!(step = event.step, dropped, "step notification dropped");
        }
    }

    fn finish_frame(&mut self, steps_run: u32, dt: f32) -> FrameReport {
        self.frame_count += 1;
        let report = self.report(steps_run, dt);

        if !report.metrics.is_finite() && !self.corrupted {
            self.corrupted = true;
            tracing::warn!(
                frame = self.frame_count,
                non_finite = report.metrics.non_finite,
                "simulation state became non-finite"
            );
        }

        tracing::debug!(
            frame = self.frame_count,
            step = self.step_count,
            sim_time = self.sim_time,
            dt,
            max_speed = report.metrics.max_speed,
            mean_density = report.metrics.mean_density,
            "frame complete"
        );
        report
    }

    fn report(&self, steps_run: u32, dt: f32) -> FrameReport {
        FrameReport {
            steps_run,
            dt,
            metrics: self.kernel.metrics(),
        }
    }
}
