/// Span/trace attribute keys for stream runs.
/// Keep these stable; log pipelines filter on them.
pub const KEY_SESSION: &str = "sse.session";
pub const KEY_URL: &str = "http.url";
pub const KEY_STATUS: &str = "http.status";

pub const KEY_FRAMES: &str = "sse.frames";
pub const KEY_DELTAS: &str = "sse.deltas";

pub const KEY_ERROR_KIND: &str = "error.kind";
