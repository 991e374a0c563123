#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod crypto;
pub mod decimal;
pub mod staking;

pub use decimal::{Amount, Decimal};
