//! # ensemble-engine
//!
//! Bundle assembly engine for the ensemble system.
//!
//! This crate provides:
//! - Per-slot candidate retrieval with deterministic unary ranking
//! - A process-wide bounded LRU shortlist cache with event-driven
//!   invalidation
//! - The monotone hard-constraint engine used for beam pruning
//! - The ten-component soft-scoring stack with weighted aggregation
//! - The beam-search assembler with atomic co-ord group commits
//! - The group-aware replace planner with cascade plans
//! - The [`OutfitEngine`] facade tying them together
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ensemble_core::{Context, Deadline, Occasion, SystemClock, TempBand};
//! use ensemble_engine::{EngineConfig, GenerateRequest, OutfitEngine};
//!
//! let engine = OutfitEngine::new(
//!     index, rulesets, profiles, history,
//!     Arc::new(SystemClock),
//!     EngineConfig::from_env(),
//! );
//!
//! let result = engine
//!     .generate(GenerateRequest {
//!         user_id: "u-1".into(),
//!         context: Context {
//!             occasion: Occasion::WorkOffice,
//!             target_dressiness: Some(4),
//!             temperature_band: TempBand::Warm,
//!             event_tags: Default::default(),
//!         },
//!         allow_catalog: false,
//!         deadline: Deadline::generate_default(),
//!         seed: None,
//!     })
//!     .await?;
//! ```

pub mod beam;
pub mod cache;
pub mod constraints;
pub mod engine;
pub mod replace;
pub mod retrieval;
pub mod scoring;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export core types
pub use ensemble_core::*;

// Re-export engine types
pub use beam::{assemble, AssembledBundle, AssemblerInputs};
pub use cache::{context_hash, ShortlistCache, SlotShortlists};
pub use constraints::{check_complete, check_partial, ConstraintCtx};
pub use engine::{EngineConfig, GenerateRequest, OutfitEngine, ReplaceRequest};
pub use replace::{ReplaceInputs, ReplacePlanner};
pub use retrieval::{unary_score, CandidateRetriever, RankedCandidate, RetrievalCtx};
pub use scoring::{score_items, Component, ScoreBreakdown, ScoreContext};
