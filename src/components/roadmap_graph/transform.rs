//! Scene-wide zoom and pan. Independent of node coordinates: the simulation
//! never sees this transform, and the transform never moves a node.

pub fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ZoomSettings {
	pub min_scale: f64,
	pub max_scale: f64,
	/// Factor applied by one zoom-in / zoom-out button press.
	pub button_step: f64,
	/// Factor applied by one wheel notch.
	pub wheel_step: f64,
	/// Seconds.
	pub button_duration: f64,
	/// Seconds.
	pub reset_duration: f64,
}

impl Default for ZoomSettings {
	fn default() -> Self {
		Self {
			min_scale: 0.3,
			max_scale: 3.0,
			button_step: 1.2,
			wheel_step: 1.1,
			button_duration: 0.3,
			reset_duration: 0.5,
		}
	}
}

/// `screen = graph * k + (x, y)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	#[cfg(test)]
	pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
		(gx * self.k + self.x, gy * self.k + self.y)
	}

	/// Rescales to `k` keeping the graph point under `(sx, sy)` fixed.
	fn scaled_about(&self, sx: f64, sy: f64, k: f64) -> Self {
		let ratio = k / self.k;
		Self {
			x: sx - (sx - self.x) * ratio,
			y: sy - (sy - self.y) * ratio,
			k,
		}
	}

	fn lerp(&self, to: &Self, t: f64) -> Self {
		Self {
			x: self.x + (to.x - self.x) * t,
			y: self.y + (to.y - self.y) * t,
			k: self.k + (to.k - self.k) * t,
		}
	}
}

#[derive(Clone, Debug)]
struct Animation {
	from: ViewTransform,
	to: ViewTransform,
	elapsed: f64,
	duration: f64,
}

/// Zoom/pan state with eased button transitions.
#[derive(Clone, Debug, Default)]
pub struct Zoom {
	settings: ZoomSettings,
	current: ViewTransform,
	animation: Option<Animation>,
}

impl Zoom {
	pub fn new(settings: ZoomSettings) -> Self {
		Self {
			settings,
			..Self::default()
		}
	}

	pub fn transform(&self) -> ViewTransform {
		self.current
	}

	/// Where the transform is heading: the animation target, or the current
	/// transform when idle.
	pub fn target(&self) -> ViewTransform {
		self.animation.as_ref().map_or(self.current, |a| a.to)
	}

	#[cfg(test)]
	pub fn is_animating(&self) -> bool {
		self.animation.is_some()
	}

	fn clamp(&self, k: f64) -> f64 {
		k.clamp(self.settings.min_scale, self.settings.max_scale)
	}

	fn animate_to(&mut self, to: ViewTransform, duration: f64) {
		self.animation = Some(Animation {
			from: self.current,
			to,
			elapsed: 0.0,
			duration,
		});
	}

	/// One button step in, about the viewport point `(cx, cy)`.
	pub fn zoom_in(&mut self, cx: f64, cy: f64) {
		let target = self.target();
		let k = self.clamp(target.k * self.settings.button_step);
		self.animate_to(target.scaled_about(cx, cy, k), self.settings.button_duration);
	}

	/// One button step out, about the viewport point `(cx, cy)`.
	pub fn zoom_out(&mut self, cx: f64, cy: f64) {
		let target = self.target();
		let k = self.clamp(target.k / self.settings.button_step);
		self.animate_to(target.scaled_about(cx, cy, k), self.settings.button_duration);
	}

	/// Back to the identity transform.
	pub fn reset(&mut self) {
		self.animate_to(ViewTransform::default(), self.settings.reset_duration);
	}

	/// Wheel zoom anchored at the pointer. Immediate; cancels any animation.
	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 {
			1.0 / self.settings.wheel_step
		} else {
			self.settings.wheel_step
		};
		self.animation = None;
		let k = self.clamp(self.current.k * factor);
		self.current = self.current.scaled_about(sx, sy, k);
	}

	/// Sets the translation directly (background pan).
	pub fn pan_to(&mut self, x: f64, y: f64) {
		self.animation = None;
		self.current.x = x;
		self.current.y = y;
	}

	/// Steps the running animation by `dt` seconds.
	pub fn advance(&mut self, dt: f64) {
		let Some(anim) = self.animation.as_mut() else {
			return;
		};
		anim.elapsed += dt;
		let t = if anim.duration > 0.0 {
			(anim.elapsed / anim.duration).min(1.0)
		} else {
			1.0
		};
		self.current = anim.from.lerp(&anim.to, ease_out_cubic(t));
		if t >= 1.0 {
			self.current = anim.to;
			self.animation = None;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn finish(zoom: &mut Zoom) {
		for _ in 0..100 {
			zoom.advance(0.016);
		}
		assert!(!zoom.is_animating());
	}

	#[test]
	fn buttons_step_and_clamp() {
		let mut zoom = Zoom::new(ZoomSettings::default());
		zoom.zoom_in(400.0, 300.0);
		finish(&mut zoom);
		assert!((zoom.transform().k - 1.2).abs() < 1e-9);

		for _ in 0..20 {
			zoom.zoom_in(400.0, 300.0);
		}
		finish(&mut zoom);
		assert_eq!(zoom.transform().k, 3.0);

		for _ in 0..40 {
			zoom.zoom_out(400.0, 300.0);
		}
		finish(&mut zoom);
		assert_eq!(zoom.transform().k, 0.3);
	}

	#[test]
	fn zoom_keeps_the_anchor_fixed() {
		let mut zoom = Zoom::new(ZoomSettings::default());
		zoom.pan_to(50.0, -20.0);
		let before = zoom.transform().screen_to_graph(400.0, 300.0);
		zoom.zoom_in(400.0, 300.0);
		finish(&mut zoom);
		let after = zoom.transform().screen_to_graph(400.0, 300.0);
		assert!((before.0 - after.0).abs() < 1e-9 && (before.1 - after.1).abs() < 1e-9);

		zoom.wheel(10.0, 10.0, -1.0);
		let (gx, gy) = zoom.transform().screen_to_graph(10.0, 10.0);
		let (sx, sy) = zoom.transform().graph_to_screen(gx, gy);
		assert!((sx - 10.0).abs() < 1e-9 && (sy - 10.0).abs() < 1e-9);
	}

	#[test]
	fn reset_eases_back_to_identity() {
		let mut zoom = Zoom::new(ZoomSettings::default());
		zoom.wheel(0.0, 0.0, -1.0);
		zoom.pan_to(120.0, 80.0);
		zoom.reset();
		zoom.advance(0.25);
		let mid = zoom.transform();
		assert!(mid.x > 0.0 && mid.x < 120.0);
		zoom.advance(0.25);
		assert_eq!(zoom.transform(), ViewTransform::default());
		assert!(!zoom.is_animating());
	}

	#[test]
	fn wheel_cancels_animation() {
		let mut zoom = Zoom::new(ZoomSettings::default());
		zoom.zoom_in(0.0, 0.0);
		zoom.wheel(0.0, 0.0, 1.0);
		assert!(!zoom.is_animating());
		assert!((zoom.transform().k - 1.0 / 1.1).abs() < 1e-9);
	}
}
