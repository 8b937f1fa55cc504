//! Structured logging field constants for the ensemble engine.
//!
//! All crates use these constants for consistent structured logging so log
//! aggregation can query by standardized field names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, request completions |
//! | DEBUG | Decision points (template choice, anchor, pruning counts) |
//! | TRACE | Per-candidate iteration, per-component scores |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request.
pub const REQUEST_ID: &str = "request_id";

/// User whose wardrobe is being assembled.
pub const USER_ID: &str = "user_id";

/// Rule-set version captured for the request.
pub const RULESET_VERSION: &str = "ruleset_version";

// ─── Assembly fields ───────────────────────────────────────────────────────

/// Template chosen for the request.
pub const TEMPLATE_ID: &str = "template_id";

/// Slot currently being expanded.
pub const SLOT: &str = "slot";

/// Anchor slot chosen for the beam.
pub const ANCHOR: &str = "anchor";

/// Number of candidates in a shortlist.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Beam width in force.
pub const BEAM_WIDTH: &str = "beam_width";

/// Number of children pruned by hard constraints at a step.
pub const PRUNED_COUNT: &str = "pruned_count";

/// Violation code that pruned a child or emptied the beam.
pub const VIOLATION_CODE: &str = "violation_code";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Aggregate bundle score.
pub const SCORE: &str = "score";

/// Number of results returned (bundles, alternatives).
pub const RESULT_COUNT: &str = "result_count";

/// True when a deadline forced a partial result.
pub const PARTIAL: &str = "partial";

// ─── Cache fields ──────────────────────────────────────────────────────────

/// Whether a shortlist cache lookup hit.
pub const CACHE_HIT: &str = "cache_hit";

/// Shortlist cache key hash.
pub const CONTEXT_HASH: &str = "context_hash";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
