//! Case definitions and loading

mod data;
pub mod loader;

pub use data::{Allocation, Balances, Case, Constraints, Health, Objective, Person, Sex};
pub use loader::{load_case, load_case_from_reader};

#[cfg(test)]
pub(crate) use data::tests::single_case;
