use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use leptos::prelude::*;
use log::debug;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::state::{PointerUp, RoadmapGraphState};
use super::types::LoadedRoadmap;

/// Seconds per simulation step; one step per animation frame.
const FRAME_DT: f32 = 0.016;

type SharedState = Rc<RefCell<Option<RoadmapGraphState>>>;
type SharedClosure = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Everything the frame loop keeps alive, released together on unmount.
struct FrameLoop<C> {
	state: SharedState,
	frame: Rc<RefCell<Option<C>>>,
	resize: Rc<RefCell<Option<C>>>,
}

impl<C> Clone for FrameLoop<C> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			frame: self.frame.clone(),
			resize: self.resize.clone(),
		}
	}
}

impl<C> FrameLoop<C> {
	/// Stops the engine, drops the state and hands back both callbacks.
	fn shutdown(&self) -> (Option<C>, Option<C>) {
		if let Some(mut s) = self.state.borrow_mut().take() {
			s.stop();
		}
		(self.frame.borrow_mut().take(), self.resize.borrow_mut().take())
	}
}

fn pointer_position(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get_untracked()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

#[component]
pub fn RoadmapGraphCanvas(
	#[prop(into)] roadmap: Signal<Option<LoadedRoadmap>>,
	#[prop(into)] completed: Signal<HashSet<String>>,
	#[prop(optional, into)] selected: Option<Signal<Option<String>>>,
	#[prop(optional, into)] on_select: Option<Callback<Option<String>>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: SharedClosure = Rc::new(RefCell::new(None));
	let resize_cb: SharedClosure = Rc::new(RefCell::new(None));
	let cancelled = Arc::new(AtomicBool::new(false));

	{
		let cancelled = cancelled.clone();
		on_cleanup(move || cancelled.store(true, Ordering::Relaxed));
	}

	let (state_init, animate_init, resize_cb_init) =
		(state.clone(), animate.clone(), resize_cb.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if state_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			viewport_size(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			log::error!("Canvas 2d context unavailable");
			return;
		};

		let mut initial = RoadmapGraphState::new(w, h);
		if let Some(loaded) = roadmap.get_untracked() {
			initial.load(&loaded);
		}
		*state_init.borrow_mut() = Some(initial);

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = viewport_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let frame_loop = FrameLoop {
			state: state_init.clone(),
			frame: animate_init.clone(),
			resize: resize_cb_init.clone(),
		};
		let (state_anim, animate_inner, cancelled) =
			(state_init.clone(), animate_init.clone(), cancelled.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if cancelled.load(Ordering::Relaxed) {
				teardown(&frame_loop);
				return;
			}
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				if let Some(generation) = roadmap.with_untracked(|r| r.as_ref().map(|l| l.generation)) {
					s.tick(generation, FRAME_DT);
				}
				completed.with_untracked(|done| render::render(s, done, &ctx));
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				if let Some(win) = web_sys::window() {
					let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
				}
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	// Swap models without rebuilding the state so positions carry over; a
	// cleared model cancels the simulation.
	let state_model = state.clone();
	Effect::new(move |_| {
		let loaded = roadmap.get();
		if let Some(ref mut s) = *state_model.borrow_mut() {
			match loaded {
				Some(loaded) => s.load(&loaded),
				None => s.stop(),
			}
		}
	});

	if let Some(selected) = selected {
		let state_sel = state.clone();
		Effect::new(move |_| {
			let id = selected.get();
			if let Some(ref mut s) = *state_sel.borrow_mut() {
				s.select_node(id);
			}
		});
	}

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = pointer_position(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_md.borrow_mut() {
			s.pointer_down(x, y);
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = pointer_position(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			s.pointer_move(x, y);
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		// release the borrow before running the callback
		let outcome = match *state_mu.borrow_mut() {
			Some(ref mut s) => s.pointer_up(),
			None => PointerUp::Nothing,
		};
		let Some(on_select) = on_select else {
			return;
		};
		match outcome {
			PointerUp::Selected(id) => on_select.run(Some(id)),
			PointerUp::Deselected => on_select.run(None),
			PointerUp::Nothing => {}
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.pointer_leave();
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = pointer_position(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			s.wheel(x, y, ev.delta_y());
		}
	};

	let zoom_button = move |apply: fn(&mut RoadmapGraphState)| {
		let state = state.clone();
		move |_: MouseEvent| {
			if let Some(ref mut s) = *state.borrow_mut() {
				apply(s);
			}
		}
	};

	view! {
		<div class="roadmap-graph">
			<canvas
				node_ref=canvas_ref
				class="roadmap-graph-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			<div class="roadmap-graph-controls">
				<button title="Zoom in" on:click=zoom_button(RoadmapGraphState::zoom_in)>"+"</button>
				<button title="Zoom out" on:click=zoom_button(RoadmapGraphState::zoom_out)>"−"</button>
				<button title="Reset view" on:click=zoom_button(RoadmapGraphState::reset_zoom)>"⟲"</button>
			</div>
		</div>
	}
}

/// Runs on the first frame after unmount: unhooks the resize listener and
/// breaks the frame closure's self-reference.
fn teardown(frame_loop: &FrameLoop<Closure<dyn FnMut()>>) {
	let (frame, resize) = frame_loop.shutdown();
	if let (Some(cb), Some(win)) = (resize, web_sys::window()) {
		let _ = win.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
	}
	// still executing inside this closure, so JS owns it from here and
	// frees it once unreferenced
	if let Some(cb) = frame {
		let _ = cb.into_js_value();
	}
	debug!("Roadmap canvas unmounted, animation loop ended");
}

fn viewport_size(window: &Window) -> (f64, f64) {
	let dim = |v: Result<JsValue, JsValue>, fallback: f64| {
		v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback)
	};
	(dim(window.inner_width(), 800.0), dim(window.inner_height(), 600.0))
}
