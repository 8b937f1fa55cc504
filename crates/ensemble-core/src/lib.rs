//! # ensemble-core
//!
//! Core types, traits, and abstractions for the ensemble outfit engine.
//!
//! This crate provides the foundational data structures — perceptual color
//! math, the garment item model, profiles and contexts, rule sets and
//! templates, bundle results — plus the provider traits the engine
//! consumes and the event bus it publishes to.

pub mod bundle;
pub mod color;
pub mod constraint;
pub mod deadline;
pub mod defaults;
pub mod error;
pub mod events;
pub mod items;
pub mod logging;
pub mod profile;
pub mod registry;
pub mod ruleset;
pub mod traits;

// Re-export commonly used types at crate root
pub use bundle::{
    Alternative, AlternativesResult, Bundle, BundleExplanation, BundleResult, BundleSlot,
    CascadePlan, CascadeStep, ComponentScore, SlotExplanation,
};
pub use color::{circular_stddev_deg, delta_e2000, hue_delta, is_neutral, relation, HueRelation, Lch};
pub use constraint::{ConstraintCode, ConstraintViolation};
pub use deadline::Deadline;
pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus};
pub use items::{
    CohesionPolicy, CoordMembership, CoordSetKind, FitProfile, Item, ItemDoc, Owner, Pattern,
    PatternKind, PatternScale, ShoulderStructure, Slot, TempBand, VolumeClass,
};
pub use profile::{
    AppearanceSignature, BodySignature, Context, FitPreference, HeightClass, Occasion, Profile,
    ShoulderHipRatio, SynergyStyle, TorsoLegRatio, Undertone,
};
pub use registry::{AttributeRegistry, AttributeViolation, RoleSpec};
pub use ruleset::{
    AccessoryMode, BodyCoverage, LayeringGraph, RuleSet, RuleSetDoc, Template, Thresholds, Weights,
};
pub use traits::{
    Clock, IndexFilter, IndexPage, IndexQuery, IndexScope, ProfileProvider, RuleSetProvider,
    SystemClock, WearHistoryProvider,
};
