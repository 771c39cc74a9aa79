/// Skill-check resolution.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckRoll {
    pub success: bool,
    /// The raw die face.
    pub roll: u32,
    /// Die face plus voice level.
    pub total: i32,
}

impl CheckRoll {
    pub fn is_critical(&self) -> bool {
        self.roll == 20
    }

    pub fn is_fumble(&self) -> bool {
        self.roll == 1
    }
}

/// Decides whether a check of `level` against `difficulty` succeeds.
pub trait SkillResolver: Send {
    fn resolve(&mut self, level: i32, difficulty: i32) -> CheckRoll;
}

/// d20 plus level against difficulty. A natural 20 always succeeds and a
/// natural 1 always fails.
pub struct D20Resolver {
    rng: StdRng,
}

impl D20Resolver {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl SkillResolver for D20Resolver {
    fn resolve(&mut self, level: i32, difficulty: i32) -> CheckRoll {
        let roll: u32 = self.rng.gen_range(1..=20);
        let total = (roll as i32).saturating_add(level);
        let success = match roll {
            20 => true,
            1 => false,
            _ => total >= difficulty,
        };
        CheckRoll {
            success,
            roll,
            total,
        }
    }
}

/// Always returns the same outcome. For tests and scripted playthroughs.
pub struct FixedResolver {
    outcomes: Vec<bool>,
    next: usize,
}

impl FixedResolver {
    pub fn always(success: bool) -> Self {
        Self {
            outcomes: vec![success],
            next: 0,
        }
    }

    /// Cycle through `outcomes` in order.
    pub fn sequence(outcomes: Vec<bool>) -> Self {
        Self { outcomes, next: 0 }
    }
}

impl SkillResolver for FixedResolver {
    fn resolve(&mut self, level: i32, _difficulty: i32) -> CheckRoll {
        let success = if self.outcomes.is_empty() {
            false
        } else {
            let outcome = self.outcomes[self.next % self.outcomes.len()];
            self.next += 1;
            outcome
        };
        let roll = if success { 20 } else { 1 };
        CheckRoll {
            success,
            roll,
            total: (roll as i32).saturating_add(level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d20_is_deterministic_per_seed() {
        let mut a = D20Resolver::new(42);
        let mut b = D20Resolver::new(42);
        for _ in 0..50 {
            assert_eq!(a.resolve(3, 12), b.resolve(3, 12));
        }
    }

    #[test]
    fn d20_natural_rolls_override_difficulty() {
        let mut resolver = D20Resolver::new(7);
        for _ in 0..500 {
            let result = resolver.resolve(0, 100);
            assert!((1..=20).contains(&result.roll));
            assert_eq!(result.success, result.is_critical());

            let result = resolver.resolve(100, 0);
            assert_eq!(result.success, !result.is_fumble());
        }
    }

    #[test]
    fn d20_total_includes_level() {
        let mut resolver = D20Resolver::new(1);
        let result = resolver.resolve(5, 10);
        assert_eq!(result.total, result.roll as i32 + 5);
    }

    #[test]
    fn fixed_sequence_cycles() {
        let mut resolver = FixedResolver::sequence(vec![true, false]);
        assert!(resolver.resolve(0, 10).success);
        assert!(!resolver.resolve(0, 10).success);
        assert!(resolver.resolve(0, 10).success);
    }

    #[test]
    fn extreme_levels_saturate() {
        let mut resolver = D20Resolver::new(3);
        assert_eq!(resolver.resolve(i32::MAX, 10).total, i32::MAX);
        let mut fixed = FixedResolver::always(true);
        assert_eq!(fixed.resolve(i32::MAX, 10).total, i32::MAX);
    }
}
