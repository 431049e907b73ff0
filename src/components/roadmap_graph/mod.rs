mod component;
mod forces;
mod layout;
mod render;
mod state;
mod transform;
mod types;

pub use component::RoadmapGraphCanvas;
pub use types::LoadedRoadmap;
