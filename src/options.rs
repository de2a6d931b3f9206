//! Options influencing solver behaviour.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Options for the solvers; passing the random generator explicitly allows
/// seeding the polarity tie-breaks of the decision heuristic.
#[derive(Debug)]
pub struct SolverOptions {
    pub random_generator: SmallRng,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            random_generator: SmallRng::seed_from_u64(42),
        }
    }
}
