pub mod binomial;
pub mod curvature;
pub mod error;
pub mod floating_point;

pub use binomial::*;
pub use curvature::*;
pub use error::*;
pub use floating_point::*;
