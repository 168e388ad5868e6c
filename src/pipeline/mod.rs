pub mod filter;
pub mod runner;

pub use filter::{DateFilter, DateFilterMode};
pub use runner::{PipelineRunner, RunReport};
