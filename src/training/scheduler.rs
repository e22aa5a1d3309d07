//! Learning-rate schedules.
//!
//! The schedule produces a multiplier applied to each parameter group's base
//! learning rate. It advances once per epoch, after the train, validation
//! and test passes of that epoch; the multiplier in effect during an epoch
//! is the one computed before stepping. The whole schedule state serializes
//! into the checkpoint so a resumed run continues the curve exactly.

use std::f64::consts::PI;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Schedule selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum SchedulerKind {
    WarmupCosine,
    StepDecay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ScheduleCurve {
    WarmupCosine {
        init_ratio: f64,
        min_lr_ratio: f64,
        warmup_steps: f64,
        max_steps: f64,
    },
    StepDecay {
        step_size: usize,
        gamma: f64,
    },
}

/// A stepped multiplier schedule with serializable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrSchedule {
    curve: ScheduleCurve,
    step: usize,
    multiplier: f64,
}

impl LrSchedule {
    /// Linear ramp from `init_ratio` over the first tenth of the run, then
    /// cosine decay down to `min_lr_ratio`.
    pub fn warmup_cosine(total_epochs: usize, init_ratio: f64, min_lr_ratio: f64) -> Self {
        let curve = ScheduleCurve::WarmupCosine {
            init_ratio,
            min_lr_ratio,
            warmup_steps: total_epochs as f64 / 10.0,
            max_steps: total_epochs as f64,
        };
        let multiplier = multiplier_at(&curve, 0);
        Self {
            curve,
            step: 0,
            multiplier,
        }
    }

    /// Multiplier `gamma^floor(step / step_size)`.
    pub fn step_decay(step_size: usize, gamma: f64) -> Self {
        let curve = ScheduleCurve::StepDecay { step_size, gamma };
        let multiplier = multiplier_at(&curve, 0);
        Self {
            curve,
            step: 0,
            multiplier,
        }
    }

    /// Multiplier in effect for the current epoch.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Advances to the next epoch and returns the new multiplier.
    pub fn step(&mut self) -> f64 {
        self.step += 1;
        self.multiplier = multiplier_at(&self.curve, self.step);
        self.multiplier
    }
}

fn multiplier_at(curve: &ScheduleCurve, step: usize) -> f64 {
    match curve {
        ScheduleCurve::WarmupCosine {
            init_ratio,
            min_lr_ratio,
            warmup_steps,
            max_steps,
        } => {
            let s = step as f64;
            let ramp_end = warmup_steps - 1.0;
            if s < ramp_end {
                init_ratio + (1.0 - init_ratio) / ramp_end * s
            } else {
                let progress = (s - ramp_end) / (max_steps - ramp_end);
                min_lr_ratio + (1.0 - min_lr_ratio) * 0.5 * ((PI * progress).cos() + 1.0)
            }
        }
        ScheduleCurve::StepDecay { step_size, gamma } => gamma.powi((step / step_size) as i32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_cosine_boundaries() {
        // 100 epochs: warmup over the first 10 steps, cosine after.
        let schedule = LrSchedule::warmup_cosine(100, 0.1, 0.001);
        assert!((schedule.multiplier() - 0.1).abs() < 1e-12);

        let mut schedule = schedule;
        for _ in 0..9 {
            schedule.step();
        }
        // End of the ramp reaches the full rate.
        assert!((schedule.multiplier() - 1.0).abs() < 1e-12);

        for _ in 9..99 {
            schedule.step();
        }
        // Final epoch multiplier sits just above the floor.
        assert_eq!(schedule.current_step(), 99);
        assert!(schedule.multiplier() > 0.001);
        assert!(schedule.multiplier() < 0.002);
    }

    #[test]
    fn warmup_ramp_is_linear() {
        let mut schedule = LrSchedule::warmup_cosine(100, 0.1, 0.001);
        let m0 = schedule.multiplier();
        let m1 = schedule.step();
        let m2 = schedule.step();
        assert!(((m1 - m0) - (m2 - m1)).abs() < 1e-12);
        assert!(m1 > m0);
    }

    #[test]
    fn cosine_tail_is_monotonically_decreasing() {
        let mut schedule = LrSchedule::warmup_cosine(50, 0.1, 0.001);
        for _ in 0..4 {
            schedule.step();
        }
        let mut previous = schedule.multiplier();
        for _ in 4..49 {
            let current = schedule.step();
            assert!(current < previous);
            previous = current;
        }
    }

    #[test]
    fn step_decay_plateaus() {
        let mut schedule = LrSchedule::step_decay(30, 0.1);
        assert!((schedule.multiplier() - 1.0).abs() < 1e-12);
        for _ in 0..29 {
            schedule.step();
        }
        assert!((schedule.multiplier() - 1.0).abs() < 1e-12);
        schedule.step();
        assert!((schedule.multiplier() - 0.1).abs() < 1e-12);
        for _ in 30..60 {
            schedule.step();
        }
        assert!((schedule.multiplier() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn schedule_state_round_trips_through_json() {
        let mut schedule = LrSchedule::warmup_cosine(100, 0.1, 0.001);
        for _ in 0..17 {
            schedule.step();
        }
        let json = serde_json::to_string(&schedule).unwrap();
        let restored: LrSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, schedule);

        // The restored schedule continues the same curve.
        let mut a = schedule;
        let mut b = restored;
        assert!((a.step() - b.step()).abs() < 1e-15);
    }
}
