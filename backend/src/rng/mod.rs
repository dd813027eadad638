//! Deterministic random number generation
//!
//! Every stochastic choice in a step (tie-breaks, softmax action sampling,
//! outcome sampling) draws from the world's single [`RngManager`], seeded from
//! `WorldConfig::rng_seed`. The planner itself never draws: it works with
//! whole distributions, so planning is reproducible regardless of how many
//! branches it explores.

mod xorshift;

pub use xorshift::RngManager;
