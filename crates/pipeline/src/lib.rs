pub mod catalog;
pub mod config;
pub mod globe;
pub mod graph;
pub mod input;
pub mod mesh;
pub mod overlay;
pub mod renderer;
pub mod resources;
pub mod surfaces;

#[cfg(test)]
mod fixtures;

pub use catalog::*;
pub use config::*;
pub use globe::*;
pub use graph::*;
pub use input::*;
pub use mesh::*;
pub use overlay::*;
pub use renderer::*;
pub use resources::*;
pub use surfaces::*;
