pub mod artifacts;
pub mod features;
pub mod model;
pub mod persistence;
pub mod scaler;

pub use persistence::ModelLoader;
