use std::collections::HashSet;

use super::layout::{LayoutEngine, LayoutSettings};
use super::transform::{ViewTransform, Zoom, ZoomSettings};
use super::types::LoadedRoadmap;
use crate::roadmap::Generation;

/// Extra pick tolerance around a node, in graph units.
pub const HIT_PADDING: f64 = 4.0;

/// Drawn radius by level; everything at level 4 or deeper shares a size.
pub fn node_radius(level: u32) -> f64 {
	match level {
		0 => 52.0,
		1 => 44.0,
		2 => 38.0,
		3 => 32.0,
		_ => 28.0,
	}
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub node: Option<String>,
	pub moved: bool,
	/// Pointer minus node centre at grab time, in graph units.
	offset_x: f64,
	offset_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<String>,
	pub neighbors: HashSet<String>,
	pub highlight_t: f64,
	pub prev_node: Option<String>,
	pub prev_neighbors: HashSet<String>,
}

/// What a pointer release meant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerUp {
	/// Press and release on a node without moving it.
	Selected(String),
	/// Press and release on the background without panning.
	Deselected,
	/// End of a drag or pan, or a stray release.
	Nothing,
}

/// Everything the canvas needs between frames: the simulation, the view
/// transform and the transient pointer state.
pub struct RoadmapGraphState {
	pub engine: LayoutEngine,
	pub zoom: Zoom,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub selected: Option<String>,
	pub width: f64,
	pub height: f64,
	pub flow_time: f64,
}

impl RoadmapGraphState {
	pub fn new(width: f64, height: f64) -> Self {
		Self::with_settings(LayoutSettings::default(), ZoomSettings::default(), width, height)
	}

	pub fn with_settings(layout: LayoutSettings, zoom: ZoomSettings, width: f64, height: f64) -> Self {
		Self {
			engine: LayoutEngine::new(layout, width, height),
			zoom: Zoom::new(zoom),
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			selected: None,
			width,
			height,
			flow_time: 0.0,
		}
	}

	/// Switches to `loaded`, keeping positions of surviving ids. Pointer state
	/// that refers to the previous roadmap is dropped.
	pub fn load(&mut self, loaded: &LoadedRoadmap) {
		if self.engine.generation() == Some(loaded.generation) {
			return;
		}
		if let Some(id) = self.drag.node.take() {
			self.engine.drag_end(&id);
		}
		self.drag = DragState::default();
		self.hover = HoverState::default();
		self.selected = self.selected.take().filter(|id| loaded.roadmap.contains(id));
		self.engine.load(loaded.generation, &loaded.roadmap);
	}

	/// Cancels the simulation; called when the view goes away.
	pub fn stop(&mut self) {
		self.engine.stop();
	}

	pub fn transform(&self) -> ViewTransform {
		self.zoom.transform()
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		self.transform().screen_to_graph(sx, sy)
	}

	/// Closest node whose disc contains the screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<String> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found: Option<(f64, String)> = None;
		self.engine.graph().visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			let dist = (dx * dx + dy * dy).sqrt();
			// radius is in graph space, so it scales with zoom like the node
			if dist > node_radius(node.data.user_data.level) + HIT_PADDING {
				return;
			}
			if found.as_ref().is_none_or(|(best, _)| dist < *best) {
				found = Some((dist, node.data.user_data.id.clone()));
			}
		});
		found.map(|(_, id)| id)
	}

	/// Starts a node drag when the press lands on a node, a pan otherwise.
	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		if let Some(id) = self.node_at_position(sx, sy) {
			let (gx, gy) = self.screen_to_graph(sx, sy);
			let (nx, ny) = self.engine.position(&id).unwrap_or((gx as f32, gy as f32));
			self.engine.drag_start(&id);
			self.drag = DragState {
				node: Some(id),
				moved: false,
				offset_x: gx - nx as f64,
				offset_y: gy - ny as f64,
			};
		} else {
			let t = self.transform();
			self.pan = PanState {
				active: true,
				moved: false,
				start_x: sx,
				start_y: sy,
				transform_start_x: t.x,
				transform_start_y: t.y,
			};
		}
	}

	pub fn pointer_move(&mut self, sx: f64, sy: f64) {
		if let Some(id) = self.drag.node.clone() {
			let (gx, gy) = self.screen_to_graph(sx, sy);
			self.engine.drag_to(
				&id,
				(gx - self.drag.offset_x) as f32,
				(gy - self.drag.offset_y) as f32,
			);
			self.drag.moved = true;
		} else if self.pan.active {
			let (dx, dy) = (sx - self.pan.start_x, sy - self.pan.start_y);
			if dx != 0.0 || dy != 0.0 {
				self.pan.moved = true;
			}
			self.zoom
				.pan_to(self.pan.transform_start_x + dx, self.pan.transform_start_y + dy);
		} else {
			let hovered = self.node_at_position(sx, sy);
			self.set_hover(hovered);
		}
	}

	pub fn pointer_up(&mut self) -> PointerUp {
		let outcome = if let Some(id) = self.drag.node.take() {
			self.engine.drag_end(&id);
			if self.drag.moved {
				PointerUp::Nothing
			} else {
				self.selected = Some(id.clone());
				PointerUp::Selected(id)
			}
		} else if self.pan.active && !self.pan.moved {
			self.selected = None;
			PointerUp::Deselected
		} else {
			PointerUp::Nothing
		};
		self.drag = DragState::default();
		self.pan = PanState::default();
		outcome
	}

	/// Pointer left the canvas: end any drag or pan without selecting.
	pub fn pointer_leave(&mut self) {
		if let Some(id) = self.drag.node.take() {
			self.engine.drag_end(&id);
		}
		self.drag = DragState::default();
		self.pan = PanState::default();
		self.set_hover(None);
	}

	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) {
		self.zoom.wheel(sx, sy, delta_y);
	}

	pub fn zoom_in(&mut self) {
		self.zoom.zoom_in(self.width / 2.0, self.height / 2.0);
	}

	pub fn zoom_out(&mut self) {
		self.zoom.zoom_out(self.width / 2.0, self.height / 2.0);
	}

	pub fn reset_zoom(&mut self) {
		self.zoom.reset();
	}

	/// Pure selection change; the layout is untouched.
	pub fn select_node(&mut self, id: Option<String>) {
		self.selected = id;
	}

	pub fn set_hover(&mut self, node: Option<String>) {
		if self.hover.node == node {
			return;
		}
		// keep the outgoing highlight around so it can fade
		if self.hover.node.is_some() && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}
		self.hover.neighbors = node
			.as_deref()
			.map(|id| self.engine.neighbors(id))
			.unwrap_or_default();
		self.hover.node = node;
	}

	pub fn is_highlighted(&self, id: &str) -> bool {
		self.is_hovered(id)
			|| self.hover.neighbors.contains(id)
			|| self.hover.prev_neighbors.contains(id)
	}

	pub fn is_hovered(&self, id: &str) -> bool {
		self.hover.node.as_deref() == Some(id) || self.hover.prev_node.as_deref() == Some(id)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	/// One frame: a simulation step for `generation`, the zoom animation and
	/// the hover fade.
	pub fn tick(&mut self, generation: Generation, dt: f32) {
		self.engine.tick(generation, dt);
		self.zoom.advance(dt as f64);
		self.flow_time += dt as f64;

		let target = if self.hover.node.is_some() { 1.0 } else { 0.0 };
		self.hover.highlight_t += (target - self.hover.highlight_t) * 1.8 * dt as f64;
		if self.hover.node.is_none() && self.hover.highlight_t < 0.01 {
			self.hover.highlight_t = 0.0;
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.engine.resize(width, height);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use serde_json::json;

	use super::*;
	use crate::roadmap::repair_document;

	fn loaded(generation: u64) -> LoadedRoadmap {
		let roadmap = repair_document(json!({
			"nodes": [
				{ "id": "root", "level": 0, "children": ["left", "right"] },
				{ "id": "left", "level": 1 },
				{ "id": "right", "level": 1 }
			]
		}))
		.unwrap()
		.roadmap;
		LoadedRoadmap {
			generation: Generation(generation),
			roadmap: Arc::new(roadmap),
		}
	}

	fn state() -> RoadmapGraphState {
		let mut state = RoadmapGraphState::new(800.0, 600.0);
		state.load(&loaded(1));
		state
	}

	fn screen_pos(state: &RoadmapGraphState, id: &str) -> (f64, f64) {
		let (x, y) = state.engine.position(id).unwrap();
		state.transform().graph_to_screen(x as f64, y as f64)
	}

	#[test]
	fn click_on_node_selects_without_moving_it() {
		let mut state = state();
		let (sx, sy) = screen_pos(&state, "left");
		let before = state.engine.position("left");
		state.pointer_down(sx, sy);
		assert_eq!(state.pointer_up(), PointerUp::Selected("left".into()));
		assert_eq!(state.selected.as_deref(), Some("left"));
		assert_eq!(state.engine.position("left"), before);
	}

	#[test]
	fn dragging_moves_only_the_grabbed_node() {
		let mut state = state();
		let (sx, sy) = screen_pos(&state, "right");
		let root_before = state.engine.position("root");
		let transform_before = state.transform();

		state.pointer_down(sx + 3.0, sy);
		state.pointer_move(sx + 103.0, sy + 50.0);
		let (x, y) = state.engine.position("right").unwrap();
		let (ox, oy) = state.transform().screen_to_graph(sx + 100.0, sy + 50.0);
		assert!((x as f64 - ox).abs() < 1e-3 && (y as f64 - oy).abs() < 1e-3);
		assert_eq!(state.engine.position("root"), root_before);
		assert_eq!(state.transform(), transform_before, "drag never pans");

		assert_eq!(state.pointer_up(), PointerUp::Nothing);
		assert_eq!(state.engine.saved_position("right"), Some((x, y)));
	}

	#[test]
	fn background_drag_pans_and_background_click_deselects() {
		let mut state = state();
		state.select_node(Some("root".into()));
		let root_before = state.engine.position("root");

		state.pointer_down(5.0, 5.0);
		state.pointer_move(45.0, 25.0);
		assert_eq!(state.pointer_up(), PointerUp::Nothing);
		assert_eq!(state.transform().x, 40.0);
		assert_eq!(state.transform().y, 20.0);
		assert_eq!(state.engine.position("root"), root_before, "pan never moves nodes");
		assert_eq!(state.selected.as_deref(), Some("root"));

		state.pointer_down(5.0, 5.0);
		assert_eq!(state.pointer_up(), PointerUp::Deselected);
		assert_eq!(state.selected, None);
	}

	#[test]
	fn hover_highlights_neighbors_then_fades() {
		let mut state = state();
		let (sx, sy) = screen_pos(&state, "left");
		state.pointer_move(sx, sy);
		assert!(state.is_hovered("left"));
		assert!(state.is_highlighted("root"));
		assert!(!state.is_highlighted("right"));

		state.pointer_leave();
		assert!(state.has_active_highlight(), "fading out");
		for _ in 0..400 {
			state.tick(Generation(1), 0.016);
		}
		assert!(!state.has_active_highlight());
	}

	#[test]
	fn zoom_buttons_leave_nodes_alone() {
		let mut state = state();
		let before = state.engine.live_positions();
		state.zoom_in();
		state.tick(Generation(99), 1.0);
		assert!((state.transform().k - 1.2).abs() < 1e-9);
		state.reset_zoom();
		state.tick(Generation(99), 1.0);
		assert_eq!(state.transform(), ViewTransform::default());
		assert_eq!(state.engine.live_positions(), before);
	}

	#[test]
	fn new_generation_drops_stale_pointer_state() {
		let mut state = state();
		let (sx, sy) = screen_pos(&state, "left");
		state.pointer_down(sx, sy);
		state.select_node(Some("left".into()));
		state.load(&loaded(2));
		assert!(state.drag.node.is_none());
		assert_eq!(state.selected.as_deref(), Some("left"));
		assert_eq!(state.engine.generation(), Some(Generation(2)));
	}
}
