use rand::SeedableRng;
use rand::rngs::StdRng;

/// Construction-time settings for a [`crate::machine::Machine`]
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Seed for the RND generator. `None` seeds once from the OS.
    pub rng_seed: Option<u64>,
    /// Discard a stop request left over from a previous run when starting
    pub clear_stop_on_start: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,
            clear_stop_on_start: true,
        }
    }
}

impl MachineConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Build the machine's single random generator
    pub fn build_rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_default_config() {
        let config = MachineConfig::default();
        assert_eq!(config.rng_seed, None);
        assert!(config.clear_stop_on_start);
    }

    #[test]
    fn test_seeded_rng_is_repeatable() {
        let config = MachineConfig::with_seed(7);
        let mut first = config.build_rng();
        let mut second = config.build_rng();
        let a: Vec<u16> = (0..8).map(|_| first.random_range(0..1000)).collect();
        let b: Vec<u16> = (0..8).map(|_| second.random_range(0..1000)).collect();
        assert_eq!(a, b);
    }
}
