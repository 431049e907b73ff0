use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::{debug, info};

use super::forces::{self, Body};
use super::types::LayoutNode;
use crate::roadmap::{Generation, Roadmap};

/// Tuning for the simulation and the initial placement.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutSettings {
	pub force_charge: f32,
	pub force_spring: f32,
	pub force_max: f32,
	pub node_speed: f32,
	pub damping_factor: f32,
	pub node_mass: f32,
	/// Rest length of a parent-child link.
	pub link_distance: f32,
	pub link_strength: f32,
	pub center_strength: f32,
	/// Minimum distance between two node centres.
	pub collision_radius: f32,
	pub collision_strength: f32,
	/// Energy at which the simulation counts as settled.
	pub alpha_min: f32,
	/// Fraction of the gap to the target energy closed per tick.
	pub alpha_decay: f32,
	/// Energy target while a node is dragged.
	pub drag_alpha_target: f32,
	/// Energy after a re-layout where every node kept its position.
	pub reheat_alpha: f32,
	pub level_spacing: f32,
	pub sibling_spacing: f32,
	pub jitter: f32,
}

impl Default for LayoutSettings {
	fn default() -> Self {
		Self {
			force_charge: 4000.0,
			force_spring: 0.02,
			force_max: 280.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
			node_mass: 10.0,
			link_distance: 180.0,
			link_strength: 0.3,
			center_strength: 0.05,
			collision_radius: 90.0,
			collision_strength: 0.7,
			alpha_min: 0.001,
			alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
			drag_alpha_target: 0.3,
			reheat_alpha: 0.3,
			level_spacing: 200.0,
			sibling_spacing: 200.0,
			jitter: 50.0,
		}
	}
}

impl LayoutSettings {
	fn simulation_parameters(&self) -> SimulationParameters {
		SimulationParameters {
			force_charge: self.force_charge,
			force_spring: self.force_spring,
			force_max: self.force_max,
			node_speed: self.node_speed,
			damping_factor: self.damping_factor,
		}
	}
}

/// Stable pseudo-random value in `[-0.5, 0.5)` for a node id.
fn jitter(id: &str) -> f32 {
	let mut h = DefaultHasher::new();
	id.hash(&mut h);
	(h.finish() & 0xFFFF) as f32 / 65536.0 - 0.5
}

/// Initial position for every node of `roadmap`, in document order.
///
/// Known positions are reused verbatim. Other nodes are spread horizontally
/// across their level and stacked by level, growing downward from above the
/// centre.
pub fn seed_positions(
	roadmap: &Roadmap,
	known: &HashMap<String, (f32, f32)>,
	settings: &LayoutSettings,
	(width, height): (f64, f64),
) -> Vec<(f32, f32)> {
	let mut per_level: HashMap<u32, usize> = HashMap::new();
	for node in roadmap.nodes() {
		*per_level.entry(node.level).or_default() += 1;
	}
	let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
	let mut slot: HashMap<u32, usize> = HashMap::new();

	roadmap
		.nodes()
		.iter()
		.map(|node| {
			let index = slot.entry(node.level).or_default();
			let in_level = *index;
			*index += 1;
			if let Some(&pos) = known.get(&node.id) {
				return pos;
			}
			let count = per_level[&node.level] as f32;
			let x = cx
				+ (in_level as f32 - (count - 1.0) / 2.0) * settings.sibling_spacing
				+ jitter(&node.id) * settings.jitter;
			let y = cy + node.level as f32 * settings.level_spacing - 1.5 * settings.level_spacing;
			(x, y)
		})
		.collect()
}

/// The running force simulation for one roadmap generation.
///
/// Positions survive re-layouts through a map keyed by node id that outlives
/// any single graph: it is refreshed on drag release and whenever the engine
/// stops, and consulted on every seeding.
pub struct LayoutEngine {
	settings: LayoutSettings,
	graph: ForceGraph<LayoutNode, ()>,
	ids: HashMap<String, DefaultNodeIdx>,
	links: Vec<(DefaultNodeIdx, DefaultNodeIdx)>,
	positions: HashMap<String, (f32, f32)>,
	generation: Option<Generation>,
	running: bool,
	alpha: f32,
	alpha_target: f32,
	width: f64,
	height: f64,
}

impl LayoutEngine {
	pub fn new(settings: LayoutSettings, width: f64, height: f64) -> Self {
		Self {
			graph: ForceGraph::new(settings.simulation_parameters()),
			settings,
			ids: HashMap::new(),
			links: Vec::new(),
			positions: HashMap::new(),
			generation: None,
			running: false,
			alpha: 0.0,
			alpha_target: 0.0,
			width,
			height,
		}
	}

	/// Lays out `roadmap` as `generation`.
	///
	/// Loading the generation already shown is a no-op, so unrelated updates
	/// such as completion changes never move a node. Any other generation
	/// replaces the graph, carrying positions over by id.
	pub fn load(&mut self, generation: Generation, roadmap: &Roadmap) {
		if self.generation == Some(generation) {
			return;
		}
		self.remember_positions();

		let seeds = seed_positions(
			roadmap,
			&self.positions,
			&self.settings,
			(self.width, self.height),
		);
		let reused = roadmap
			.nodes()
			.iter()
			.filter(|n| self.positions.contains_key(&n.id))
			.count();

		self.graph = ForceGraph::new(self.settings.simulation_parameters());
		self.ids.clear();
		self.links.clear();
		for (node, &(x, y)) in roadmap.nodes().iter().zip(&seeds) {
			let idx = self.graph.add_node(NodeData {
				x,
				y,
				mass: self.settings.node_mass,
				is_anchor: false,
				user_data: LayoutNode {
					id: node.id.clone(),
					label: node.label.clone(),
					level: node.level,
				},
			});
			self.ids.insert(node.id.clone(), idx);
		}
		for edge in roadmap.edges() {
			let (Some(&src), Some(&tgt)) = (self.ids.get(edge.source), self.ids.get(edge.target)) else {
				continue;
			};
			self.graph.add_edge(src, tgt, EdgeData::default());
			self.links.push((src, tgt));
		}
		self.remember_positions();

		info!(
			"Laid out {generation}: {} nodes ({reused} reused positions)",
			roadmap.len()
		);
		self.generation = Some(generation);
		self.running = true;
		self.alpha = if reused == roadmap.len() {
			self.settings.reheat_alpha
		} else {
			1.0
		};
		self.alpha_target = 0.0;
	}

	/// Halts ticking, e.g. on teardown. Positions are kept for the next load.
	pub fn stop(&mut self) {
		if self.running {
			debug!("Stopping layout for {:?}", self.generation);
		}
		self.remember_positions();
		self.running = false;
		self.generation = None;
	}

	/// Advances one step if `generation` is still the one laid out and there
	/// is energy left. Returns whether anything moved.
	pub fn tick(&mut self, generation: Generation, dt: f32) -> bool {
		if self.generation != Some(generation) {
			debug!("Ignoring tick for stale {generation}");
			return false;
		}
		if !self.running {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.settings.alpha_decay;
		if self.alpha < self.settings.alpha_min {
			return false;
		}

		self.graph.update(dt * self.alpha);

		let mut slots = HashMap::with_capacity(self.ids.len());
		let mut bodies = Vec::with_capacity(self.ids.len());
		self.graph.visit_nodes(|node| {
			slots.insert(node.index(), bodies.len());
			bodies.push(Body {
				x: node.x(),
				y: node.y(),
				pinned: node.data.is_anchor,
			});
		});
		let links: Vec<(usize, usize)> = self
			.links
			.iter()
			.filter_map(|(a, b)| Some((*slots.get(a)?, *slots.get(b)?)))
			.collect();

		let s = &self.settings;
		forces::apply_links(&mut bodies, &links, s.link_distance, s.link_strength * self.alpha);
		forces::apply_centering(
			&mut bodies,
			(self.width as f32 / 2.0, self.height as f32 / 2.0),
			s.center_strength * self.alpha,
		);
		forces::resolve_collisions(&mut bodies, s.collision_radius, s.collision_strength);

		self.graph.visit_nodes_mut(|node| {
			if let Some(&slot) = slots.get(&node.index()) {
				let body = bodies[slot];
				if !body.pinned {
					node.data.x = body.x;
					node.data.y = body.y;
				}
			}
		});
		true
	}

	/// Pins `id` and raises the energy target so neighbours follow the drag.
	pub fn drag_start(&mut self, id: &str) -> bool {
		let Some(&idx) = self.ids.get(id) else {
			return false;
		};
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.is_anchor = true;
			}
		});
		self.alpha_target = self.settings.drag_alpha_target;
		self.running = self.generation.is_some();
		true
	}

	/// Moves the pinned node to a graph-space point.
	pub fn drag_to(&mut self, id: &str, x: f32, y: f32) {
		let Some(&idx) = self.ids.get(id) else {
			return;
		};
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.x = x;
				node.data.y = y;
			}
		});
	}

	/// Releases the pin, lets the energy decay and saves every position.
	pub fn drag_end(&mut self, id: &str) {
		if let Some(&idx) = self.ids.get(id) {
			self.release(id, idx);
		}
		self.alpha_target = 0.0;
		self.remember_positions();
	}

	/// Replaces a pinned node with a fresh, free copy at the same spot.
	///
	/// `force_graph` keeps accumulating spring force on anchors and only
	/// clears it when a free node integrates, so un-anchoring in place would
	/// fire everything gathered during the hold on the next tick.
	fn release(&mut self, id: &str, idx: DefaultNodeIdx) {
		let mut held = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				held = Some((node.x(), node.y(), node.data.mass, node.data.user_data.clone()));
			}
		});
		let Some((x, y, mass, user_data)) = held else {
			return;
		};
		self.graph.remove_node(idx);
		let fresh = self.graph.add_node(NodeData {
			x,
			y,
			mass,
			is_anchor: false,
			user_data,
		});
		for link in &mut self.links {
			if link.0 == idx {
				link.0 = fresh;
			}
			if link.1 == idx {
				link.1 = fresh;
			}
			if link.0 == fresh || link.1 == fresh {
				self.graph.add_edge(link.0, link.1, EdgeData::default());
			}
		}
		self.ids.insert(id.to_string(), fresh);
	}

	fn remember_positions(&mut self) {
		let positions = &mut self.positions;
		self.graph.visit_nodes(|node| {
			positions.insert(node.data.user_data.id.clone(), (node.x(), node.y()));
		});
	}

	/// Current position of every node.
	#[cfg(test)]
	pub fn live_positions(&self) -> HashMap<String, (f32, f32)> {
		let mut out = HashMap::with_capacity(self.ids.len());
		self.graph.visit_nodes(|node| {
			out.insert(node.data.user_data.id.clone(), (node.x(), node.y()));
		});
		out
	}

	/// Current position of one node.
	pub fn position(&self, id: &str) -> Option<(f32, f32)> {
		let idx = *self.ids.get(id)?;
		let mut found = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				found = Some((node.x(), node.y()));
			}
		});
		found
	}

	/// Position stored in the durable map.
	#[cfg(test)]
	pub fn saved_position(&self, id: &str) -> Option<(f32, f32)> {
		self.positions.get(id).copied()
	}

	/// Ids linked to `id` in either direction.
	pub fn neighbors(&self, id: &str) -> HashSet<String> {
		let Some(&idx) = self.ids.get(id) else {
			return HashSet::new();
		};
		let linked: HashSet<DefaultNodeIdx> = self
			.links
			.iter()
			.filter_map(|&(a, b)| match (a == idx, b == idx) {
				(true, _) => Some(b),
				(_, true) => Some(a),
				_ => None,
			})
			.collect();
		let mut out = HashSet::new();
		self.graph.visit_nodes(|node| {
			if linked.contains(&node.index()) {
				out.insert(node.data.user_data.id.clone());
			}
		});
		out
	}

	pub fn graph(&self) -> &ForceGraph<LayoutNode, ()> {
		&self.graph
	}

	pub fn generation(&self) -> Option<Generation> {
		self.generation
	}

	#[cfg(test)]
	pub fn is_running(&self) -> bool {
		self.running
	}

	/// True once the energy has decayed below the threshold with no drag in
	/// progress.
	#[cfg(test)]
	pub fn is_settled(&self) -> bool {
		self.alpha < self.settings.alpha_min && self.alpha_target < self.settings.alpha_min
	}

	#[cfg(test)]
	pub fn alpha(&self) -> f32 {
		self.alpha
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}
