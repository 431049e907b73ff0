use std::collections::HashSet;

use leptos::prelude::*;
use log::{error, info};
use serde_json::{Value, json};

use crate::components::roadmap_graph::{LoadedRoadmap, RoadmapGraphCanvas};
use crate::roadmap::{
	Applied, CompletionStats, Generation, HistoryLog, Node, RoadmapSession,
};

type Session = StoredValue<RoadmapSession<HistoryLog>, LocalStorage>;

/// Canned generator output, deliberately imperfect: a skipped level, a
/// missing id, a dangling reference and an orphan.
fn sample_documents() -> Vec<Value> {
	vec![
		json!({
			"title": "Learning Rust",
			"nodes": [
				{"id": "rust", "label": "Rust", "level": 0, "children": ["basics", "ownership", "async"]},
				{"id": "basics", "label": "Language Basics", "level": 1, "children": ["types", "missing"],
				 "timeEstimate": "1 week", "category": "core"},
				{"id": "types", "label": "Types and Traits", "level": 3, "children": []},
				{"id": "ownership", "label": "Ownership", "level": 1, "children": ["lifetimes"],
				 "resources": [{"title": "The Book", "type": "book", "url": "https://doc.rust-lang.org/book/"}]},
				{"id": "lifetimes", "label": "Lifetimes", "level": 2},
				{"id": "async", "label": "Async Rust", "level": 1, "children": ["tokio"]},
				{"id": "tokio", "label": "Tokio", "level": 2},
				{"label": "Unsafe Code", "level": 2, "description": "Raw pointers and FFI"}
			]
		}),
		json!({
			"title": "Web Development",
			"nodes": [
				{"id": "web", "label": "Web", "level": 0, "children": ["html", "css", "js"]},
				{"id": "html", "label": "HTML", "level": 1, "children": ["forms"]},
				{"id": "forms", "label": "Forms", "level": 2},
				{"id": "css", "label": "CSS", "level": 1, "children": ["layout", "html"]},
				{"id": "layout", "label": "Flexbox and Grid", "level": 2},
				{"id": "js", "label": "JavaScript", "level": 1, "children": ["dom", "web"]},
				{"id": "dom", "label": "DOM", "level": 2}
			]
		}),
	]
}

/// Reactive mirror of the session.
#[derive(Clone, Copy)]
struct PageSignals {
	loaded: RwSignal<Option<LoadedRoadmap>>,
	completed: RwSignal<HashSet<String>>,
	selected: RwSignal<Option<String>>,
	stats: RwSignal<CompletionStats>,
	history: RwSignal<Vec<(Generation, String, u32)>>,
	error: RwSignal<Option<String>>,
}

impl PageSignals {
	fn new() -> Self {
		Self {
			loaded: RwSignal::new(None),
			completed: RwSignal::new(HashSet::new()),
			selected: RwSignal::new(None),
			stats: RwSignal::new(CompletionStats::default()),
			history: RwSignal::new(Vec::new()),
			error: RwSignal::new(None),
		}
	}

	fn publish(&self, session: &RoadmapSession<HistoryLog>) {
		let next = session.roadmap().map(|roadmap| LoadedRoadmap {
			generation: session.generation(),
			roadmap: roadmap.clone(),
		});
		if self.loaded.with_untracked(|current| current != &next) {
			self.loaded.set(next);
		}
		self.completed.set(session.completion().completed().clone());
		self.selected.set(session.selected().map(str::to_string));
		self.stats.set(session.stats());
		self.history.set(
			session
				.history()
				.entries()
				.map(|e| (e.id, e.title().to_string(), e.stats().percentage))
				.collect(),
		);
	}
}

fn regenerate(s: &mut RoadmapSession<HistoryLog>, signals: PageSignals, document: Value) {
	let ticket = s.begin_request();
	match s.apply_result(ticket, document) {
		Ok(Applied::Current(report)) => {
			info!("Roadmap repaired with {} fixes", report.total());
			signals.error.set(None);
		}
		Ok(Applied::Stale) => {}
		Err(e) => {
			error!("Generation failed: {e}");
			signals.error.set(Some(e.to_string()));
		}
	}
	signals.publish(s);
}

#[component]
fn NodeDetails(node: Node, done: bool) -> impl IntoView {
	let resources = node
		.resources
		.into_iter()
		.map(|r| {
			view! {
				<li>
					<a href=r.url target="_blank">{r.title}</a>
					<span class="resource-kind">{r.kind}</span>
				</li>
			}
		})
		.collect_view();
	view! {
		<h2>{node.label}</h2>
		<p class="node-meta">
			{format!("Level {}", node.level)}
			{(!node.category.is_empty()).then(|| format!(" · {}", node.category))}
			{node.time_estimate.map(|t| format!(" · {t}"))}
			{done.then_some(" · completed")}
		</p>
		<p>{node.description}</p>
		<ul class="resources">{resources}</ul>
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let samples = StoredValue::new(sample_documents());
	let next_sample = StoredValue::new(0usize);
	let signals = PageSignals::new();
	let session: Session = StoredValue::new_local(RoadmapSession::new(HistoryLog::new(js_sys::Date::now)));

	session.update_value(|s| regenerate(s, signals, samples.with_value(|d| d[0].clone())));

	// keep the session's selection validated against the applied roadmap
	Effect::new(move |_| {
		let id = signals.selected.get();
		session.update_value(|s| {
			s.select_node(id.as_deref());
		});
	});

	let on_select = Callback::new(move |id: Option<String>| signals.selected.set(id));

	let on_toggle = move |_| {
		let Some(id) = signals.selected.get_untracked() else {
			return;
		};
		session.update_value(|s| {
			if s.toggle(&id).is_some() {
				signals.publish(s);
			}
		});
	};

	let on_regenerate = move |_| {
		next_sample.update_value(|n| *n = (*n + 1) % samples.with_value(Vec::len));
		let document = samples.with_value(|d| d[next_sample.get_value()].clone());
		session.update_value(|s| regenerate(s, signals, document));
	};

	let reopen = move |id: Generation| {
		session.update_value(|s| {
			let Some(snapshot) = s.history().get(id).map(|e| e.snapshot.clone()) else {
				return;
			};
			if let Err(e) = s.load(snapshot) {
				error!("Could not reopen {id}: {e}");
				signals.error.set(Some(e.to_string()));
			}
			signals.publish(s);
		});
	};

	let forget = move |id: Generation| {
		session.update_value(|s| {
			s.history_mut().remove(id);
			signals.publish(s);
		});
	};

	let on_clear_history = move |_| {
		session.update_value(|s| {
			s.history_mut().clear();
			signals.publish(s);
		});
	};

	let details = move || {
		let id = signals.selected.get()?;
		let node = signals
			.loaded
			.with(|l| l.as_ref().and_then(|l| l.roadmap.node(&id).cloned()))?;
		let done = signals.completed.with(|c| c.contains(&id));
		Some(view! { <NodeDetails node=node done=done /> })
	};

	let history_items = move || {
		signals
			.history
			.get()
			.into_iter()
			.map(|(id, title, percentage)| {
				view! {
					<li>
						<button on:click=move |_| reopen(id)>
							{format!("{title} ({percentage}%)")}
						</button>
						<button class="history-remove" title="Remove" on:click=move |_| forget(id)>
							"×"
						</button>
					</li>
				}
			})
			.collect_view()
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<RoadmapGraphCanvas
					roadmap=signals.loaded
					completed=signals.completed
					selected=signals.selected
					on_select=on_select
					fullscreen=true
				/>
				<div class="graph-overlay">
					<h1>
						{move || {
							signals
								.loaded
								.with(|l| l.as_ref().map(|l| l.roadmap.title().to_string()))
						}}
					</h1>
					<p class="subtitle">
						{move || {
							let stats = signals.stats.get();
							format!(
								"{} of {} completed ({}%)",
								stats.completed,
								stats.total,
								stats.percentage,
							)
						}}
					</p>
					<p class="error">{move || signals.error.get()}</p>
					<button on:click=on_regenerate>"Regenerate"</button>
					<ul class="history">{history_items}</ul>
					<Show when=move || signals.history.with(|h| !h.is_empty())>
						<button on:click=on_clear_history>"Clear history"</button>
					</Show>
				</div>
				<Show when=move || signals.selected.with(Option::is_some)>
					<div class="node-panel">
						{details}
						<button on:click=on_toggle>"Toggle complete"</button>
					</div>
				</Show>
			</div>
		</ErrorBoundary>
	}
}
