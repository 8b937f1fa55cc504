//! Centralized default constants for the ensemble engine.
//!
//! **This module is the single source of truth** for shared default values.
//! Both crates reference these constants instead of defining their own magic
//! numbers. When adding constants, place them in the appropriate section and
//! document the rationale for the chosen value.

// =============================================================================
// BEAM SEARCH
// =============================================================================

/// Beam width W. Expansions per request are bounded by W * K * depth, which
/// at the defaults (8 * 40 * 10) stays comfortably inside the 400 ms P95
/// generate budget on a single core.
pub const BEAM_WIDTH: usize = 8;

/// Maximum template depth (slot count). Templates never exceed this.
pub const MAX_TEMPLATE_SLOTS: usize = 10;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Shortlist size K for the anchor slot. The anchor commits first and
/// dominates bundle quality, so it gets the deeper shortlist.
pub const SHORTLIST_ANCHOR: usize = 40;

/// Shortlist size K for non-anchor slots.
pub const SHORTLIST_OTHER: usize = 20;

/// Weight of attribute confidence in the unary retrieval score.
pub const UNARY_CONFIDENCE_WEIGHT: f64 = 0.1;

// =============================================================================
// COLOR
// =============================================================================

/// Chroma below which a color counts as neutral. Proposed by the source
/// design notes; neutrals act as harmony boosters rather than hue
/// participants.
pub const NEUTRAL_CHROMA: f64 = 10.0;

/// Lightness at or below which a color counts as neutral (near-black).
pub const NEUTRAL_L_DARK: f64 = 8.0;

/// Lightness at or above which a color counts as neutral (near-white).
pub const NEUTRAL_L_LIGHT: f64 = 92.0;

/// Delta-E band edges: at or below this two colors read as "near".
pub const DELTA_E_NEAR: f64 = 15.0;

/// Delta-E band edges: at or above this two colors read as "distant".
pub const DELTA_E_DISTANT: f64 = 25.0;

// =============================================================================
// SCORING
// =============================================================================

/// Neutral fallback score for components whose profile inputs are absent.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Maximum non-solid patterns tolerated before pattern-mix bottoms out.
pub const MAX_PATTERNS: usize = 3;

/// Penalty per pair of non-solid items sharing a pattern scale.
pub const PATTERN_SCALE_PENALTY: f64 = 0.2;

/// Aggregate penalty applied when a prefer-strict co-ord group is broken
/// during replacement.
pub const PREFER_STRICT_BREAK_PENALTY: f64 = 0.15;

/// Number of recent outfits consulted for the novelty component.
pub const NOVELTY_WINDOW: usize = 10;

/// Base novelty penalty for the most recently worn item; decays linearly
/// with recency rank across the window.
pub const NOVELTY_BASE_PENALTY: f64 = 0.25;

// =============================================================================
// FORMALITY
// =============================================================================

/// Default tolerance below the dressiness target.
pub const FORMALITY_TOL_LO: u8 = 1;

/// Default tolerance above the dressiness target.
pub const FORMALITY_TOL_HI: u8 = 1;

// =============================================================================
// ENGINE
// =============================================================================

/// Capacity of the process-wide shortlist LRU cache (user/context entries).
pub const SHORTLIST_CACHE_CAPACITY: usize = 512;

/// Default bound on concurrently served requests; excess is rejected for
/// the host to surface as BUSY.
pub const MAX_INFLIGHT: usize = 64;

/// Default generate deadline in milliseconds (P95 budget from the latency
/// contract).
pub const GENERATE_DEADLINE_MS: u64 = 400;

/// Default replace deadline in milliseconds.
pub const REPLACE_DEADLINE_MS: u64 = 600;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Default number of alternatives returned by the replace planner.
pub const REPLACE_MAX_ALTERNATIVES: usize = 10;
