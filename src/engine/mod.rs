pub mod check;
pub mod dataset;
pub mod forward_test;
pub mod live;
pub mod pipeline;
pub mod results;

pub use check::run_check;
pub use pipeline::SignalPipeline;
