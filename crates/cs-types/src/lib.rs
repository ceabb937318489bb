pub mod args;
pub mod params;
pub mod outcome;
pub mod errors;

pub use args::*;
pub use params::*;
pub use outcome::*;
pub use errors::*;
