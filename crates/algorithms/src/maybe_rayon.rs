//! Row-parallel execution with or without rayon.
//!
//! With the `parallel` feature this re-exports rayon's parallel iterators.
//! Without it, `into_par_iter()` falls back to `into_iter()` so the same
//! `(0..rows).into_par_iter().flat_map(..).collect()` chains compile
//! sequentially.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
