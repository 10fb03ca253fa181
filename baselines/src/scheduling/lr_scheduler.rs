//! Learning rate schedules.
//!
//! - `ConstantLR`: fixed learning rate
//! - `LinearDecay`: linear interpolation from a start to an end rate
//!
//! Schedules are evaluated on training progress measured in optimizer
//! iterations. In debug builds invalid arguments panic; in release they are
//! sanitized to finite, non-negative values.

/// Learning rate schedule.
pub trait LRScheduler: Send + Sync {
    /// Learning rate for a given step.
    fn get_lr(&self, step: usize) -> f64;
}

/// Constant learning rate.
#[derive(Debug, Clone)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    pub fn new(lr: f64) -> Self {
        debug_assert!(lr.is_finite() && lr >= 0.0, "ConstantLR: invalid lr {}", lr);
        Self {
            lr: sanitize(lr),
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }
}

impl LRScheduler for ConstantLR {
    fn get_lr(&self, _step: usize) -> f64 {
        self.lr
    }
}

/// Linear decay from `start_lr` to `end_lr` over `total_steps`, then flat.
#[derive(Debug, Clone)]
pub struct LinearDecay {
    start_lr: f64,
    end_lr: f64,
    total_steps: usize,
}

impl LinearDecay {
    pub fn new(start_lr: f64, end_lr: f64, total_steps: usize) -> Self {
        debug_assert!(total_steps > 0, "LinearDecay: total_steps must be > 0");
        debug_assert!(
            start_lr.is_finite() && start_lr >= 0.0,
            "LinearDecay: invalid start_lr {}",
            start_lr
        );
        debug_assert!(
            end_lr.is_finite() && end_lr >= 0.0,
            "LinearDecay: invalid end_lr {}",
            end_lr
        );

        Self {
            start_lr: sanitize(start_lr),
            end_lr: sanitize(end_lr),
            total_steps,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

impl LRScheduler for LinearDecay {
    fn get_lr(&self, step: usize) -> f64 {
        if self.total_steps == 0 {
            return self.start_lr;
        }
        let progress = (step as f64 / self.total_steps as f64).min(1.0);
        self.start_lr + (self.end_lr - self.start_lr) * progress
    }
}

fn sanitize(lr: f64) -> f64 {
    if lr.is_finite() && lr >= 0.0 {
        lr
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_lr() {
        let sched = ConstantLR::new(3e-4);
        assert_eq!(sched.get_lr(0), 3e-4);
        assert_eq!(sched.get_lr(1_000_000), 3e-4);
    }

    #[test]
    fn test_linear_decay_endpoints() {
        let sched = LinearDecay::new(1e-3, 0.0, 10);
        assert!((sched.get_lr(0) - 1e-3).abs() < 1e-12);
        assert!((sched.get_lr(5) - 5e-4).abs() < 1e-12);
        assert_eq!(sched.get_lr(10), 0.0);
        assert_eq!(sched.get_lr(50), 0.0);
    }

    #[test]
    fn test_linear_decay_is_monotonic() {
        let sched = LinearDecay::new(3e-4, 1e-5, 100);
        let lrs: Vec<f64> = (0..=100).map(|s| sched.get_lr(s)).collect();
        assert!(lrs.windows(2).all(|w| w[1] <= w[0]));
    }
}
