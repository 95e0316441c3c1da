pub mod builder;
pub mod distortion;
pub mod field;
pub mod grid;
pub mod mask;
pub mod product;

pub use builder::*;
pub use distortion::*;
pub use field::*;
pub use grid::*;
pub use mask::*;
pub use product::*;
