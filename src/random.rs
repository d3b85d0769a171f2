//! Named, independently seeded random number streams
//!
//! Every stochastic subsystem of the simulation (admissions, length of
//! stay, colonization, detection, surveillance, importation) draws from its
//! own named stream so that runs are reproducible and changing the draw
//! pattern of one subsystem does not perturb the others. Streams are seeded
//! lazily from the base seed plus a hash of the stream name.

use crate::context::Context;
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;
use std::any::{Any, TypeId};
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;

/// Use this to define a unique type which will be used as a key to retrieve
/// an independent rng instance when calling `.get_rng`.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = rand::rngs::StdRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;

pub trait RngId: Any {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// This is a wrapper which allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// Registers a data container which stores:
// * base_seed: A base seed for all rngs
// * rng_holders: A map of rngs, keyed by their RngId. Note that this is
//   stored in a RefCell to allow for mutable borrow without requiring a
//   mutable borrow of the Context itself.
crate::context::define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::new()),
    }
);

// This is a trait extension on Context
pub trait ContextRandomExt {
    fn init_random(&mut self, base_seed: u64);

    fn get_rng<R: RngId>(&self) -> RefMut<R::RngType>;

    /// Sample from the given distribution using the stream keyed by
    /// `rng_id`
    fn sample_distr<R: RngId, T>(&self, rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Draw a Bernoulli sample: `true` with probability `p`
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;

    /// Draw a value uniformly from the given range
    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;
}

impl ContextRandomExt for Context {
    /// Initializes the `RngPlugin` data container to store rngs as well as
    /// a base seed. Note that rngs are created lazily when `get_rng` is
    /// called.
    fn init_random(&mut self, base_seed: u64) {
        let data_container = self.get_data_container_mut(RngPlugin);
        data_container.base_seed = base_seed;

        // Clear any existing Rngs to ensure they get re-seeded when
        // `get_rng` is called
        let mut rng_map = data_container.rng_holders.try_borrow_mut().unwrap();
        rng_map.clear();
    }

    /// Gets a mutable reference to the random number generator associated
    /// with the given `RngId`. If the rng has not been used before, one
    /// will be created, seeded from the base seed and the stream name.
    /// Note that this will panic if `init_random` was not called yet.
    fn get_rng<R: RngId>(&self) -> RefMut<R::RngType> {
        let data_container = self
            .get_data_container(RngPlugin)
            .expect("You must initialize the random number generator with a base seed");

        let rng_holders = data_container.rng_holders.try_borrow_mut().unwrap();
        RefMut::map(rng_holders, |holders| {
            holders
                .entry(TypeId::of::<R>())
                // Create a new rng holder if it doesn't exist yet
                .or_insert_with(|| {
                    let base_seed = data_container.base_seed;
                    let seed_offset = xxhash_rust::xxh3::xxh3_64(R::get_name().as_bytes());
                    RngHolder {
                        rng: Box::new(R::RngType::seed_from_u64(
                            base_seed.wrapping_add(seed_offset),
                        )),
                    }
                })
                .rng
                .downcast_mut::<R::RngType>()
                .unwrap()
        })
    }

    fn sample_distr<R: RngId, T>(&self, _rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let mut rng = self.get_rng::<R>();
        distribution.sample(&mut *rng)
    }

    fn sample_bool<R: RngId>(&self, _rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        let mut rng = self.get_rng::<R>();
        rng.random_bool(p)
    }

    fn sample_range<R: RngId, S, T>(&self, _rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        let mut rng = self.get_rng::<R>();
        rng.random_range(range)
    }
}
