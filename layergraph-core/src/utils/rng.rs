use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Randomness capability handed to layers at setup.
///
/// One generator is shared by every layer of a graph so that a seeded run is
/// reproducible regardless of how many layers draw from it.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// A generator with a fixed seed.
pub fn seeded_rng(seed: u64) -> SharedRng {
    Arc::new(Mutex::new(StdRng::seed_from_u64(seed)))
}

/// A generator seeded from the operating system.
pub fn entropy_rng() -> SharedRng {
    Arc::new(Mutex::new(StdRng::from_entropy()))
}
