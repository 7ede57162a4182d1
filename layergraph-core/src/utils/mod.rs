pub mod rng;
pub mod testing;
