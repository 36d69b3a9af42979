//! Weighted multi-step progress tracking
//!
//! Each step carries a weight; reported progress is the weight of completed
//! steps plus the completed fraction of the current step times its weight.
//! Samples never decrease and the final sample is exactly 100.

use std::sync::Arc;

use fieldvisit_domain::{SyncMode, SyncProgress, SyncStep};

use super::ports::SyncObserver;

/// Step weights of the initial full sync
pub const INITIAL_SYNC_WEIGHTS: [(SyncStep, u32); 4] = [
    (SyncStep::Schedule, 10),
    (SyncStep::GeofenceAnchors, 15),
    (SyncStep::Visits, 50),
    (SyncStep::NewCustomers, 25),
];

/// Step weights of background and manual drain sessions
pub const DRAIN_WEIGHTS: [(SyncStep, u32); 3] =
    [(SyncStep::GeofenceAnchors, 20), (SyncStep::Visits, 55), (SyncStep::NewCustomers, 25)];

pub fn weights_for(mode: SyncMode) -> &'static [(SyncStep, u32)] {
    match mode {
        SyncMode::InitialFull => &INITIAL_SYNC_WEIGHTS,
        SyncMode::Background | SyncMode::Manual => &DRAIN_WEIGHTS,
    }
}

pub struct ProgressTracker {
    mode: SyncMode,
    steps: Vec<(SyncStep, f64)>,
    /// Sum of the weights of finished steps, scaled to 100
    completed: f64,
    current: Option<usize>,
    reported: f64,
    observer: Arc<dyn SyncObserver>,
}

impl ProgressTracker {
    /// Weights are rescaled so they always add up to 100.
    pub fn new(
        mode: SyncMode,
        weights: &[(SyncStep, u32)],
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        let total: u32 = weights.iter().map(|(_, weight)| weight).sum();
        let scale = if total == 0 { 0.0 } else { 100.0 / f64::from(total) };
        let steps =
            weights.iter().map(|(step, weight)| (*step, f64::from(*weight) * scale)).collect();

        Self { mode, steps, completed: 0.0, current: None, reported: 0.0, observer }
    }

    pub fn for_mode(mode: SyncMode, observer: Arc<dyn SyncObserver>) -> Self {
        Self::new(mode, weights_for(mode), observer)
    }

    pub fn percent(&self) -> f64 {
        self.reported
    }

    /// Enter `step`, closing any step still open.
    pub fn begin_step(&mut self, step: SyncStep) {
        self.complete_step();
        self.current = self.steps.iter().position(|(candidate, _)| *candidate == step);
        self.emit(self.completed, Some(step), None);
    }

    /// `done` of `total` items of the current step are processed.
    pub fn advance(&mut self, done: usize, total: usize) {
        let Some((step, weight)) = self.current.map(|index| self.steps[index]) else {
            return;
        };

        let fraction = if total == 0 { 1.0 } else { (done.min(total) as f64) / (total as f64) };
        self.emit(self.completed + weight * fraction, Some(step), None);
    }

    /// Close the current step at its full weight.
    pub fn complete_step(&mut self) {
        if let Some(index) = self.current.take() {
            let (step, weight) = self.steps[index];
            self.completed += weight;
            self.emit(self.completed, Some(step), None);
        }
    }

    /// Report a message alongside the current percentage.
    pub fn message(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.observer.on_message(self.mode, &message);
        let step = self.current.map(|index| self.steps[index].0);
        self.emit(self.reported, step, Some(message));
    }

    /// Final sample, exactly 100.
    pub fn finish(&mut self) {
        self.current = None;
        self.completed = 100.0;
        self.reported = 100.0;
        self.observer.on_progress(&SyncProgress {
            mode: self.mode,
            percent: 100.0,
            step: None,
            message: None,
        });
    }

    fn emit(&mut self, value: f64, step: Option<SyncStep>, message: Option<String>) {
        // Float sums of the weights may land a hair above 100 before finish().
        let value = value.clamp(0.0, 100.0).max(self.reported);
        self.reported = value;
        self.observer.on_progress(&SyncProgress { mode: self.mode, percent: value, step, message });
    }
}
