//! Position passes run after each `ForceGraph::update`.
//!
//! `force_graph` integrates charge and a plain spring. These passes add what
//! it lacks: a rest length on links, a pull toward the canvas centre and a
//! hard minimum distance between nodes. They move positions directly and never
//! touch pinned bodies.

use std::f32::consts::TAU;

/// Snapshot of one node for a pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
	pub x: f32,
	pub y: f32,
	pub pinned: bool,
}

impl Body {
	#[cfg(test)]
	pub fn new(x: f32, y: f32) -> Self {
		Self {
			x,
			y,
			pinned: false,
		}
	}
}

/// Unit vector for coincident pairs, spread around the circle by slot so
/// stacked nodes separate in different directions.
fn fallback_direction(i: usize, j: usize) -> (f32, f32) {
	let angle = ((i as f32) * 0.618_034 + (j as f32) * 0.414_214) * TAU;
	(angle.cos(), angle.sin())
}

/// Moves `a` and `b` apart (positive `amount`) or together (negative) along
/// `(ux, uy)`. A pinned end stays put and the free end takes the whole shift.
fn push_apart(bodies: &mut [Body], a: usize, b: usize, (ux, uy): (f32, f32), amount: f32) {
	let (share_a, share_b) = match (bodies[a].pinned, bodies[b].pinned) {
		(true, true) => return,
		(true, false) => (0.0, 1.0),
		(false, true) => (1.0, 0.0),
		(false, false) => (0.5, 0.5),
	};
	bodies[a].x -= ux * amount * share_a;
	bodies[a].y -= uy * amount * share_a;
	bodies[b].x += ux * amount * share_b;
	bodies[b].y += uy * amount * share_b;
}

/// Pulls or pushes each linked pair toward `rest` distance by `strength` of
/// the error.
pub fn apply_links(bodies: &mut [Body], links: &[(usize, usize)], rest: f32, strength: f32) {
	for &(a, b) in links {
		let (dx, dy) = (bodies[b].x - bodies[a].x, bodies[b].y - bodies[a].y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 1e-3 {
			continue;
		}
		let error = (dist - rest) * strength;
		// negative amount moves the pair together
		push_apart(bodies, a, b, (dx / dist, dy / dist), -error);
	}
}

/// Shifts free bodies so their mean drifts toward `center`.
pub fn apply_centering(bodies: &mut [Body], center: (f32, f32), strength: f32) {
	if bodies.is_empty() {
		return;
	}
	let n = bodies.len() as f32;
	let (sx, sy) = bodies
		.iter()
		.fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
	let (dx, dy) = ((center.0 - sx / n) * strength, (center.1 - sy / n) * strength);
	for body in bodies.iter_mut().filter(|b| !b.pinned) {
		body.x += dx;
		body.y += dy;
	}
}

/// Separates every pair closer than `min_distance`, closing `strength` of the
/// overlap per call.
pub fn resolve_collisions(bodies: &mut [Body], min_distance: f32, strength: f32) {
	for i in 0..bodies.len() {
		for j in (i + 1)..bodies.len() {
			let (dx, dy) = (bodies[j].x - bodies[i].x, bodies[j].y - bodies[i].y);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist >= min_distance {
				continue;
			}
			let direction = if dist > 1e-4 {
				(dx / dist, dy / dist)
			} else {
				fallback_direction(i, j)
			};
			push_apart(bodies, i, j, direction, (min_distance - dist) * strength);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn distance(a: &Body, b: &Body) -> f32 {
		((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
	}

	#[test]
	fn collision_restores_minimum_distance() {
		let mut bodies = vec![Body::new(0.0, 0.0), Body::new(10.0, 0.0)];
		resolve_collisions(&mut bodies, 90.0, 1.0);
		assert!((distance(&bodies[0], &bodies[1]) - 90.0).abs() < 1e-3);
		// symmetric split
		assert!((bodies[0].x + 40.0).abs() < 1e-3);
	}

	#[test]
	fn collision_moves_only_the_free_body() {
		let mut bodies = vec![
			Body {
				pinned: true,
				..Body::new(0.0, 0.0)
			},
			Body::new(0.0, 30.0),
		];
		resolve_collisions(&mut bodies, 90.0, 1.0);
		assert_eq!(bodies[0], Body { pinned: true, ..Body::new(0.0, 0.0) });
		assert!((bodies[1].y - 90.0).abs() < 1e-3);
	}

	#[test]
	fn coincident_bodies_are_separated() {
		let mut bodies = vec![Body::new(5.0, 5.0), Body::new(5.0, 5.0)];
		resolve_collisions(&mut bodies, 20.0, 1.0);
		assert!((distance(&bodies[0], &bodies[1]) - 20.0).abs() < 1e-3);
	}

	#[test]
	fn links_approach_rest_length() {
		let mut bodies = vec![Body::new(0.0, 0.0), Body::new(400.0, 0.0)];
		apply_links(&mut bodies, &[(0, 1)], 180.0, 0.5);
		// error 220, half closed
		assert!((distance(&bodies[0], &bodies[1]) - 290.0).abs() < 1e-3);

		let mut bodies = vec![Body::new(0.0, 0.0), Body::new(0.0, 100.0)];
		apply_links(&mut bodies, &[(0, 1)], 180.0, 1.0);
		assert!((distance(&bodies[0], &bodies[1]) - 180.0).abs() < 1e-3);
	}

	#[test]
	fn centering_shifts_free_bodies_uniformly() {
		let mut bodies = vec![Body::new(0.0, 0.0), Body::new(100.0, 0.0), Body {
			pinned: true,
			..Body::new(200.0, 300.0)
		}];
		// mean (100, 100), center (400, 100): dx = 300 * 0.1
		apply_centering(&mut bodies, (400.0, 100.0), 0.1);
		assert_eq!(bodies[0].x, 30.0);
		assert_eq!(bodies[1].x, 130.0);
		assert_eq!(bodies[2].x, 200.0);
		assert_eq!(bodies[0].y, 0.0);
	}
}
