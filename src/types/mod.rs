pub mod bar;
pub mod signal;
pub mod timeframe;

pub use bar::*;
pub use signal::*;
pub use timeframe::*;
