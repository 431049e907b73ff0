//! Errors for documents that cannot be turned into a roadmap at all.

/// Fatal failures of the repair pipeline. Structural defects inside a valid
/// document are corrected and counted instead (see `RepairReport`).
#[derive(Debug, thiserror::Error)]
pub enum RoadmapError {
	/// The generator output could not be parsed at all.
	#[error("roadmap document is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
	/// Top level value is an array, string, etc.
	#[error("roadmap document must be a JSON object")]
	NotAnObject,
	/// No `nodes` key.
	#[error("roadmap document has no `nodes` field")]
	MissingNodes,
	/// `nodes` is present but not an array.
	#[error("roadmap `nodes` field must be a list")]
	NodesNotAList,
	/// Nothing left to lay out.
	#[error("roadmap contains no nodes")]
	Empty,
}

/// Result alias for the repair pipeline.
pub type Result<T> = std::result::Result<T, RoadmapError>;
