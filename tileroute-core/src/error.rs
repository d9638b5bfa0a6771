use thiserror::Error;

/// Errors raised while turning run logs into a logic-route graph and
/// querying it.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("run {run}: row {row} should start a tile visit but has no tile_id")]
    MissingTileId { run: String, row: usize },
    #[error("run {requested} does not exist. Possible values: {}", .available.join(", "))]
    UnknownRunRequested {
        requested: String,
        available: Vec<String>,
    },
    #[error(
        "no path from {from} ({}) to {to} ({})",
        .from_desc.as_deref().unwrap_or("unknown"),
        .to_desc.as_deref().unwrap_or("unknown")
    )]
    NoPathFound {
        from: String,
        to: String,
        from_desc: Option<String>,
        to_desc: Option<String>,
    },
    #[error("{table} has no entry for {key}")]
    MalformedReferenceData { table: &'static str, key: String },
    #[error("{0} does not match any node in the graph")]
    UnknownEndpoint(String),
    #[error("run {run}: timestamp goes backwards at row {row} ({previous} ms -> {current} ms)")]
    NonMonotonicTimestamp {
        run: String,
        row: usize,
        previous: u64,
        current: u64,
    },
    #[error("cannot add edge {from:016x} -> {to:016x} (weight {weight}, run {run}, row {row}): {reason}")]
    InvalidTransition {
        from: u64,
        to: u64,
        weight: i64,
        run: String,
        row: usize,
        reason: &'static str,
    },
    #[error("unknown ability {0:?}")]
    UnknownAbility(String),
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path}: {message}")]
    MalformedRunLog { path: String, message: String },
    #[error("{path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type RouteResult<T> = Result<T, RouteError>;
