//! One module per subcommand, each taking its own `*Args` struct plus
//! the shared [`crate::env::CfwEnv`] and returning whatever summary
//! type its underlying stage produces.

pub mod all;
pub mod benchmarks;
pub mod cfw_processing;
pub mod composites;
pub mod training;
pub mod tuning;
