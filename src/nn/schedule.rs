//! Step-wise exponential learning-rate decay

/// Multiply the rate by `decay` every `decay_steps` steps (never at steps 0 and 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    pub starter: f64,
    pub decay: f64,
    pub decay_steps: usize,
}

impl LearningRateSchedule {
    pub fn new(starter: f64, decay: f64, decay_steps: usize) -> Self {
        Self {
            starter,
            decay,
            decay_steps,
        }
    }

    /// Whether the rate drops when entering `step`
    pub fn decays_at(&self, step: usize) -> bool {
        self.decay_steps > 0 && step % self.decay_steps == 0 && step > 1
    }

    /// Rate in effect at every step `0..num_steps`
    pub fn rates(&self, num_steps: usize) -> Vec<f64> {
        let mut rate = self.starter;
        (0..num_steps)
            .map(|step| {
                if self.decays_at(step) {
                    rate *= self.decay;
                }
                rate
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_every_interval() {
        let schedule = LearningRateSchedule::new(0.19, 0.7, 100);
        let rates = schedule.rates(400);
        assert_eq!(rates.len(), 400);
        assert_eq!(rates[0], 0.19);
        assert_eq!(rates[99], 0.19);
        assert!((rates[100] - 0.19 * 0.7).abs() < 1e-12);
        assert!((rates[399] - 0.19 * 0.7f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn test_no_decay_at_first_steps() {
        let schedule = LearningRateSchedule::new(1.0, 0.5, 1);
        // step 0 and 1 keep the starter rate
        assert_eq!(schedule.rates(4), vec![1.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_zero_interval_never_decays() {
        let schedule = LearningRateSchedule::new(0.3, 0.5, 0);
        assert!(schedule.rates(10).iter().all(|&r| r == 0.3));
    }
}
