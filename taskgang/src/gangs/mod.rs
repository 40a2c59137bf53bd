// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! Ready-made gangs used by the `taskgang` binary.

pub mod gcd_gang;
pub mod search_gang;

pub use gcd_gang::{gcd, random_batches, run_gcd, GcdResult};
pub use search_gang::{run_search, SearchResult, WordSearcher};
