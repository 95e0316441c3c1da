pub mod animation;
pub mod animator;
pub mod canvas;
pub mod particle;

pub use animation::*;
pub use animator::*;
pub use canvas::*;
pub use particle::*;
