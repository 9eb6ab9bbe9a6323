pub mod point;
pub mod selection;
pub mod dataset;
pub mod config;
pub mod errors;

pub use point::*;
pub use selection::*;
pub use dataset::*;
pub use config::*;
pub use errors::*;
