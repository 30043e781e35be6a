mod poly;
mod unwrap;

pub use poly::*;
pub use unwrap::*;
