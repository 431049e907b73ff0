use std::collections::HashSet;
use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::{RoadmapGraphState, node_radius};
use super::transform::ease_out_cubic;

const BACKGROUND: &str = "#0f172a";
const COMPLETED: &str = "#10b981";
const LEVEL_COLORS: &[&str] = &["#6366f1", "#3b82f6", "#ec4899", "#10b981", "#f97316"];

fn level_color(level: u32) -> &'static str {
	LEVEL_COLORS[(level as usize).min(LEVEL_COLORS.len() - 1)]
}

pub fn render(state: &RoadmapGraphState, completed: &HashSet<String>, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	let t = state.transform();
	ctx.save();
	let _ = ctx.translate(t.x, t.y);
	let _ = ctx.scale(t.k, t.k);
	draw_edges(state, ctx);
	draw_nodes(state, completed, ctx);
	ctx.restore();
}

fn draw_edges(state: &RoadmapGraphState, ctx: &CanvasRenderingContext2d) {
	let (dash, gap) = (8.0, 8.0);
	let dash_offset = -(state.flow_time * 20.0) % (dash + gap);
	let t = ease_out_cubic(state.hover.highlight_t);

	state.engine.graph().visit_edges(|n1, n2, _| {
		let (x1, y1, x2, y2) = (n1.x() as f64, n1.y() as f64, n2.x() as f64, n2.y() as f64);
		let (dx, dy) = (x2 - x1, y2 - y1);
		if (dx * dx + dy * dy).sqrt() < 0.001 {
			return;
		}
		let (a, b) = (&n1.data.user_data, &n2.data.user_data);
		let highlighted = state.is_highlighted(&a.id) && state.is_highlighted(&b.id);
		let alpha = if highlighted { 0.6 + 0.3 * t } else { 0.6 - 0.45 * t };

		// colour runs from the parent's level to the child's
		let gradient = ctx.create_linear_gradient(x1, y1, x2, y2);
		let _ = gradient.add_color_stop(0.0, level_color(a.level));
		let _ = gradient.add_color_stop(1.0, level_color(b.level));
		#[allow(deprecated)]
		ctx.set_stroke_style(&gradient);
		ctx.set_global_alpha(alpha);
		ctx.set_line_width(2.5);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(dash),
			&JsValue::from_f64(gap),
		));
		ctx.set_line_dash_offset(dash_offset);

		ctx.begin_path();
		ctx.move_to(x1, y1);
		ctx.line_to(x2, y2);
		ctx.stroke();
	});
	ctx.set_global_alpha(1.0);
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_nodes(state: &RoadmapGraphState, completed: &HashSet<String>, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		state.transform().k,
	);

	state.engine.graph().visit_nodes(|node| {
		let info = &node.data.user_data;
		let (x, y) = (node.x() as f64, node.y() as f64);
		let done = completed.contains(&info.id);
		let dimmed = has_highlight && !state.is_highlighted(&info.id);
		let mut radius = node_radius(info.level);
		if state.is_hovered(&info.id) {
			radius *= 1.0 + 0.1 * t;
		}

		ctx.set_global_alpha(if dimmed { 1.0 - 0.6 * t } else { 1.0 });
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(if done { COMPLETED } else { level_color(info.level) });
		ctx.fill();
		ctx.set_stroke_style_str("#fff");
		ctx.set_line_width(2.5);
		ctx.stroke();

		if state.selected.as_deref() == Some(info.id.as_str()) {
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + 6.0, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str("rgba(255, 255, 255, 0.8)");
			ctx.set_line_width(2.0 / k);
			ctx.stroke();
		}

		if done {
			let (bx, by) = (x + radius * 0.55, y - radius * 0.55);
			ctx.begin_path();
			let _ = ctx.arc(bx, by, 14.0, 0.0, 2.0 * PI);
			ctx.set_fill_style_str("#fff");
			ctx.fill();
			ctx.set_fill_style_str(COMPLETED);
			ctx.set_font("900 16px sans-serif");
			ctx.set_text_align("center");
			ctx.set_text_baseline("middle");
			let _ = ctx.fill_text("✓", bx, by);
		}
		ctx.set_global_alpha(1.0);
	});

	// labels last so edges and badges never cover them
	ctx.set_fill_style_str("#fff");
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	state.engine.graph().visit_nodes(|node| {
		let info = &node.data.user_data;
		let size = if info.level == 0 { 15.0 } else { 12.0 };
		ctx.set_font(&format!("800 {size}px sans-serif"));
		draw_wrapped_label(ctx, &info.label, node.x() as f64, node.y() as f64);
	});
}

/// One line for single words, otherwise split at the middle word.
fn draw_wrapped_label(ctx: &CanvasRenderingContext2d, label: &str, x: f64, y: f64) {
	let words: Vec<&str> = label.split_whitespace().collect();
	if words.len() <= 1 {
		let _ = ctx.fill_text(label, x, y);
		return;
	}
	let mid = words.len().div_ceil(2);
	let _ = ctx.fill_text(&words[..mid].join(" "), x, y - 7.0);
	let _ = ctx.fill_text(&words[mid..].join(" "), x, y + 9.0);
}
