//! Bandit arm-selection policies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ridge_types::{config_error, PolicyKind, RidgeResult, SoftmaxRule};

/// Picks which arm gets the next unit of exploration budget.
///
/// `means[i]` is `None` while arm `i` has no observations.
pub trait BanditPolicy: Send {
    fn name(&self) -> &str;

    /// Must return an index in `0..means.len()`.
    fn select_arm(&mut self, means: &[Option<f64>], counts: &[u64]) -> usize;

    /// Observe a reward. Policies whose choice depends only on the running
    /// means can ignore this.
    fn record_observation(&mut self, _arm: usize, _reward: f64) {}
}

/// Per-arm visit counts and cumulative rewards.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmStats {
    counts: Vec<u64>,
    sums: Vec<f64>,
}

impl ArmStats {
    pub fn new(arms: usize) -> RidgeResult<Self> {
        if arms == 0 {
            return Err(config_error!("Invalid arms: {}", arms));
        }
        Ok(Self {
            counts: vec![0; arms],
            sums: vec![0.0; arms],
        })
    }

    pub fn arms(&self) -> usize {
        self.counts.len()
    }

    pub fn record(&mut self, arm: usize, reward: f64) -> RidgeResult<()> {
        if arm >= self.arms() {
            return Err(config_error!(
                "Arm index {} out of range for {} arms",
                arm,
                self.arms()
            ));
        }
        self.counts[arm] += 1;
        self.sums[arm] += reward;
        Ok(())
    }

    /// Running mean reward, `None` before the first observation.
    pub fn mean(&self, arm: usize) -> Option<f64> {
        match self.counts.get(arm) {
            Some(&n) if n > 0 => Some(self.sums[arm] / n as f64),
            _ => None,
        }
    }

    pub fn means(&self) -> Vec<Option<f64>> {
        (0..self.arms()).map(|i| self.mean(i)).collect()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// A policy plus the arm statistics it decides from.
pub struct Bandit {
    policy: Box<dyn BanditPolicy>,
    stats: ArmStats,
}

impl Bandit {
    pub fn new(policy: Box<dyn BanditPolicy>, arms: usize) -> RidgeResult<Self> {
        Ok(Self {
            policy,
            stats: ArmStats::new(arms)?,
        })
    }

    pub fn from_kind(kind: PolicyKind, temperature: f64, arms: usize) -> RidgeResult<Self> {
        let policy: Box<dyn BanditPolicy> = match kind {
            PolicyKind::Softmax { rule } => Box::new(SoftMax::new(temperature, rule)?),
            PolicyKind::EpsilonGreedy { epsilon, seed } => Box::new(EpsilonGreedy::new(epsilon, seed)?),
            PolicyKind::Ucb1 { exploration } => Box::new(Ucb1::new(exploration)?),
        };
        Self::new(policy, arms)
    }

    pub fn select_arm(&mut self) -> usize {
        let means = self.stats.means();
        let arm = self.policy.select_arm(&means, self.stats.counts());
        arm.min(self.stats.arms() - 1)
    }

    pub fn record_observation(&mut self, arm: usize, reward: f64) -> RidgeResult<()> {
        self.stats.record(arm, reward)?;
        self.policy.record_observation(arm, reward);
        Ok(())
    }

    pub fn stats(&self) -> &ArmStats {
        &self.stats
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }
}

fn first_unvisited(counts: &[u64]) -> Option<usize> {
    counts.iter().position(|&n| n == 0)
}

/// Softmax over running means with temperature `tau` in (0, 1].
pub struct SoftMax {
    tau: f64,
    rule: SoftmaxRule,
    rng: StdRng,
}

impl SoftMax {
    pub fn new(tau: f64, rule: SoftmaxRule) -> RidgeResult<Self> {
        Self::with_seed(tau, rule, 0x5EED)
    }

    pub fn with_seed(tau: f64, rule: SoftmaxRule, seed: u64) -> RidgeResult<Self> {
        if !(tau > 0.0 && tau <= 1.0) {
            return Err(config_error!("Invalid temperature param: {}", tau));
        }
        Ok(Self {
            tau,
            rule,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// `exp(mean_i / (tau * sum_j exp(mean_j / tau)))` for every arm.
    pub fn transformed_weights(&self, means: &[f64]) -> Vec<f64> {
        let exp_sum: f64 = means.iter().map(|m| (m / self.tau).exp()).sum();
        means
            .iter()
            .map(|m| (m / (self.tau * exp_sum)).exp())
            .collect()
    }
}

impl BanditPolicy for SoftMax {
    fn name(&self) -> &str {
        "softmax"
    }

    fn select_arm(&mut self, means: &[Option<f64>], counts: &[u64]) -> usize {
        if let Some(arm) = first_unvisited(counts) {
            return arm;
        }
        let means: Vec<f64> = means.iter().map(|m| m.unwrap_or(0.0)).collect();

        match self.rule {
            SoftmaxRule::LowestWeight => {
                let weights = self.transformed_weights(&means);
                weights
                    .iter()
                    .enumerate()
                    .fold((0, f64::INFINITY), |(best, best_w), (i, &w)| {
                        if w < best_w {
                            (i, w)
                        } else {
                            (best, best_w)
                        }
                    })
                    .0
            }
            SoftmaxRule::Boltzmann => {
                // Shift by the max mean so exp() cannot overflow.
                let max = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let weights: Vec<f64> = means.iter().map(|m| ((m - max) / self.tau).exp()).collect();
                let total: f64 = weights.iter().sum();
                let mut draw = self.rng.random::<f64>() * total;
                for (i, w) in weights.iter().enumerate() {
                    if draw < *w {
                        return i;
                    }
                    draw -= w;
                }
                weights.len() - 1
            }
        }
    }
}

/// Explore a uniformly random arm with probability `epsilon`, otherwise
/// exploit the best running mean.
pub struct EpsilonGreedy {
    epsilon: f64,
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64, seed: u64) -> RidgeResult<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(config_error!("Invalid epsilon: {}", epsilon));
        }
        Ok(Self {
            epsilon,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl BanditPolicy for EpsilonGreedy {
    fn name(&self) -> &str {
        "epsilon-greedy"
    }

    fn select_arm(&mut self, means: &[Option<f64>], counts: &[u64]) -> usize {
        if let Some(arm) = first_unvisited(counts) {
            return arm;
        }
        if self.rng.random::<f64>() < self.epsilon {
            return self.rng.random_range(0..means.len());
        }
        argmax(means)
    }
}

/// UCB1: mean plus `exploration * sqrt(2 ln(total) / n_i)`; unvisited arms
/// score infinity.
pub struct Ucb1 {
    exploration: f64,
}

impl Ucb1 {
    pub fn new(exploration: f64) -> RidgeResult<Self> {
        if !(exploration >= 0.0) {
            return Err(config_error!("Invalid exploration coefficient: {}", exploration));
        }
        Ok(Self { exploration })
    }
}

impl BanditPolicy for Ucb1 {
    fn name(&self) -> &str {
        "ucb1"
    }

    fn select_arm(&mut self, means: &[Option<f64>], counts: &[u64]) -> usize {
        let total: u64 = counts.iter().sum();
        let scores: Vec<Option<f64>> = means
            .iter()
            .zip(counts)
            .map(|(mean, &n)| match mean {
                Some(m) if n > 0 => {
                    let bonus = self.exploration * ((2.0 * (total as f64).ln()) / n as f64).sqrt();
                    Some(m + bonus)
                }
                _ => Some(f64::INFINITY),
            })
            .collect();
        argmax(&scores)
    }
}

/// Index of the largest defined value; ties go to the lowest index.
fn argmax(values: &[Option<f64>]) -> usize {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .fold(None::<(usize, f64)>, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridge_types::RidgeError;

    fn softmax(rule: SoftmaxRule) -> Bandit {
        Bandit::new(Box::new(SoftMax::new(0.5, rule).unwrap()), 3).unwrap()
    }

    #[test]
    fn zero_arms_is_a_config_error() {
        assert!(matches!(ArmStats::new(0), Err(RidgeError::Config(_))));
        assert!(Bandit::from_kind(PolicyKind::default(), 0.5, 0).is_err());
    }

    #[test]
    fn invalid_temperature_is_rejected() {
        assert!(SoftMax::new(0.0, SoftmaxRule::LowestWeight).is_err());
        assert!(SoftMax::new(1.01, SoftmaxRule::LowestWeight).is_err());
        assert!(SoftMax::new(1.0, SoftmaxRule::LowestWeight).is_ok());
        assert!(EpsilonGreedy::new(-0.1, 1).is_err());
        assert!(Ucb1::new(-1.0).is_err());
    }

    #[test]
    fn mean_is_average_of_observations() {
        let mut stats = ArmStats::new(2).unwrap();
        assert_eq!(stats.mean(0), None);

        for r in [0.6, 0.7, 0.8, 0.95] {
            stats.record(1, r).unwrap();
        }
        let mean = stats.mean(1).unwrap();
        assert!((mean - 0.7625).abs() < 1e-12);
        assert_eq!(stats.counts(), &[0, 4]);
        assert_eq!(stats.total(), 4);
        assert!(stats.record(2, 1.0).is_err());
    }

    #[test]
    fn unvisited_arms_are_tried_first() {
        let mut bandit = softmax(SoftmaxRule::LowestWeight);
        assert_eq!(bandit.select_arm(), 0);
        bandit.record_observation(0, 0.9).unwrap();
        assert_eq!(bandit.select_arm(), 1);
        bandit.record_observation(1, 0.1).unwrap();
        assert_eq!(bandit.select_arm(), 2);
    }

    /// The legacy rule picks the arm with the *lowest* transformed weight,
    /// which is the arm with the lowest mean reward. Conventional softmax
    /// would favor the highest mean; this test pins the legacy behavior
    /// until the intended direction is confirmed.
    #[test]
    fn legacy_softmax_favors_lowest_mean() {
        let mut bandit = softmax(SoftmaxRule::LowestWeight);
        bandit.record_observation(0, 0.9).unwrap();
        bandit.record_observation(1, 0.2).unwrap();
        bandit.record_observation(2, 0.5).unwrap();

        assert_eq!(bandit.select_arm(), 1);

        let policy = SoftMax::new(0.5, SoftmaxRule::LowestWeight).unwrap();
        let weights = policy.transformed_weights(&[0.9, 0.2, 0.5]);
        assert!(weights[1] < weights[2] && weights[2] < weights[0]);
    }

    #[test]
    fn boltzmann_softmax_favors_highest_mean() {
        let mut policy = SoftMax::with_seed(0.1, SoftmaxRule::Boltzmann, 7).unwrap();
        let means = [Some(0.9), Some(0.2), Some(0.5)];
        let counts = [5, 5, 5];

        let mut picks = [0usize; 3];
        for _ in 0..1000 {
            picks[policy.select_arm(&means, &counts)] += 1;
        }
        assert!(picks[0] > picks[2] && picks[2] > picks[1]);
        assert!(picks[0] > 900);
    }

    #[test]
    fn epsilon_zero_is_greedy() {
        let mut policy = EpsilonGreedy::new(0.0, 3).unwrap();
        let means = [Some(0.3), Some(0.8), Some(0.8)];
        for _ in 0..20 {
            assert_eq!(policy.select_arm(&means, &[2, 2, 2]), 1);
        }
    }

    #[test]
    fn epsilon_one_explores_every_arm() {
        let mut policy = EpsilonGreedy::new(1.0, 11).unwrap();
        let means = [Some(0.3), Some(0.8), Some(0.5)];
        let mut seen = [false; 3];
        for _ in 0..200 {
            seen[policy.select_arm(&means, &[1, 1, 1])] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn ucb_prefers_unvisited_then_uncertain() {
        let mut policy = Ucb1::new(1.414).unwrap();
        assert_eq!(policy.select_arm(&[Some(0.9), None], &[10, 0]), 1);
        // Same mean, far fewer samples: bigger bonus.
        assert_eq!(policy.select_arm(&[Some(0.5), Some(0.5)], &[100, 2]), 1);
        // No exploration: pure exploitation.
        let mut greedy = Ucb1::new(0.0).unwrap();
        assert_eq!(greedy.select_arm(&[Some(0.4), Some(0.6)], &[1, 50]), 1);
    }

    #[test]
    fn selected_arm_is_always_in_range() {
        for kind in [
            PolicyKind::Softmax {
                rule: SoftmaxRule::LowestWeight,
            },
            PolicyKind::Softmax {
                rule: SoftmaxRule::Boltzmann,
            },
            PolicyKind::EpsilonGreedy {
                epsilon: 0.3,
                seed: 5,
            },
            PolicyKind::Ucb1 { exploration: 1.0 },
        ] {
            let mut bandit = Bandit::from_kind(kind, 0.7, 4).unwrap();
            for i in 0..50 {
                let arm = bandit.select_arm();
                assert!(arm < 4, "{} selected {}", bandit.policy_name(), arm);
                bandit.record_observation(arm, (i % 7) as f64 / 7.0).unwrap();
            }
        }
    }
}
