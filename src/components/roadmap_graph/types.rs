use std::sync::Arc;

use crate::roadmap::{Generation, Roadmap};

/// Per-node payload carried inside the force graph.
#[derive(Clone, Debug, Default)]
pub struct LayoutNode {
	pub id: String,
	pub label: String,
	pub level: u32,
}

/// A repaired roadmap tagged with the generation that produced it.
#[derive(Clone, Debug)]
pub struct LoadedRoadmap {
	pub generation: Generation,
	pub roadmap: Arc<Roadmap>,
}

impl PartialEq for LoadedRoadmap {
	fn eq(&self, other: &Self) -> bool {
		self.generation == other.generation
	}
}
