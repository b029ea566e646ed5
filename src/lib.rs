#![allow(clippy::needless_range_loop)]

mod bounding_box;
mod knot;
mod misc;
mod surface;
mod tessellation;

pub mod prelude {
    pub use crate::bounding_box::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::surface::*;
    pub use crate::tessellation::*;
}
