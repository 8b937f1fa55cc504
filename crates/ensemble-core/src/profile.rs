//! User profile, personal signatures, and occasion context.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Lch;
use crate::error::{Error, Result};
use crate::items::TempBand;

// =============================================================================
// OCCASIONS
// =============================================================================

/// Occasion vocabulary for contexts and templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occasion {
    WorkOffice,
    WorkCasual,
    CasualDay,
    DateNight,
    FormalEvent,
    CocktailEvening,
    WeddingGuest,
    Streetwear,
    Athleisure,
    ActiveGym,
    BeachResort,
    FestivalConcert,
    TravelAirport,
    WinterLayering,
    RainwearTechnical,
    CreativeProfessional,
}

impl Occasion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Occasion::WorkOffice => "work_office",
            Occasion::WorkCasual => "work_casual",
            Occasion::CasualDay => "casual_day",
            Occasion::DateNight => "date_night",
            Occasion::FormalEvent => "formal_event",
            Occasion::CocktailEvening => "cocktail_evening",
            Occasion::WeddingGuest => "wedding_guest",
            Occasion::Streetwear => "streetwear",
            Occasion::Athleisure => "athleisure",
            Occasion::ActiveGym => "active_gym",
            Occasion::BeachResort => "beach_resort",
            Occasion::FestivalConcert => "festival_concert",
            Occasion::TravelAirport => "travel_airport",
            Occasion::WinterLayering => "winter_layering",
            Occasion::RainwearTechnical => "rainwear_technical",
            Occasion::CreativeProfessional => "creative_professional",
        }
    }
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PERSONAL SIGNATURES
// =============================================================================

/// Skin undertone, used to resolve the `auto` synergy style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Undertone {
    Warm,
    Cool,
    Neutral,
}

/// Preferred relationship between near-face garments and skin tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyStyle {
    Contrast,
    Harmonize,
    Auto,
}

/// Appearance signature. Presence of the struct is the `present` flag;
/// absence leaves the skin-synergy component at its neutral score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceSignature {
    pub skin_lch: Lch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undertone: Option<Undertone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hair_lch: Option<Lch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_lch: Option<Lch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synergy_style: Option<SynergyStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightClass {
    Petite,
    Average,
    Tall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorsoLegRatio {
    LongTorso,
    Balanced,
    LongLegs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoulderHipRatio {
    BroadShoulders,
    Balanced,
    BroadHips,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaistDefinition {
    Defined,
    Straight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPreference {
    Slim,
    Regular,
    Relaxed,
}

/// Body signature for proportion scoring. Absence leaves the proportion
/// component at its neutral score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodySignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_class: Option<HeightClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torso_leg_ratio: Option<TorsoLegRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoulder_hip_ratio: Option<ShoulderHipRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_definition: Option<WaistDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_pref: Option<FitPreference>,
}

// =============================================================================
// PROFILE AND CONTEXT
// =============================================================================

/// Declared stylist profile for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    /// Dressiness 1..=5 used when the context does not override it.
    pub baseline_dressiness: u8,
    pub default_occasion: Occasion,
    /// Style tags describing the user's taste.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub style_signature: BTreeSet<String>,
    /// Guardrails: tags that must never appear in a bundle.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub forbidden_tags: BTreeSet<String>,
    /// Guardrails: tags to favor at equal score.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub preferred_tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance_signature: Option<AppearanceSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_signature: Option<BodySignature>,
}

impl Profile {
    /// Validate profile bounds at request entry.
    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.baseline_dressiness) {
            return Err(Error::InvalidInput(format!(
                "profile {}: baseline_dressiness {} outside 1..=5",
                self.user_id, self.baseline_dressiness
            )));
        }
        if let Some(appearance) = &self.appearance_signature {
            if !appearance.skin_lch.in_bounds() {
                return Err(Error::InvalidInput(format!(
                    "profile {}: skin color out of LCh bounds",
                    self.user_id
                )));
            }
        }
        Ok(())
    }

    /// Minimal neutral profile for users without one.
    pub fn neutral(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            baseline_dressiness: 3,
            default_occasion: Occasion::CasualDay,
            style_signature: BTreeSet::new(),
            forbidden_tags: BTreeSet::new(),
            preferred_tags: BTreeSet::new(),
            appearance_signature: None,
            body_signature: None,
        }
    }
}

/// Occasion context for a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub occasion: Occasion,
    /// Overrides the profile baseline when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dressiness: Option<u8>,
    pub temperature_band: TempBand,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub event_tags: BTreeSet<String>,
}

impl Context {
    /// Validate context bounds at request entry.
    pub fn validate(&self) -> Result<()> {
        if let Some(d) = self.target_dressiness {
            if !(1..=5).contains(&d) {
                return Err(Error::InvalidInput(format!(
                    "context: target_dressiness {d} outside 1..=5"
                )));
            }
        }
        Ok(())
    }

    /// Effective dressiness target: context override, else profile baseline.
    pub fn effective_dressiness(&self, profile: &Profile) -> u8 {
        self.target_dressiness.unwrap_or(profile.baseline_dressiness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_overrides_baseline() {
        let profile = Profile::neutral("u-1");
        let ctx = Context {
            occasion: Occasion::WorkOffice,
            target_dressiness: Some(4),
            temperature_band: TempBand::Warm,
            event_tags: BTreeSet::new(),
        };
        assert_eq!(ctx.effective_dressiness(&profile), 4);

        let ctx_default = Context {
            target_dressiness: None,
            ..ctx
        };
        assert_eq!(ctx_default.effective_dressiness(&profile), 3);
    }

    #[test]
    fn test_context_rejects_out_of_range_dressiness() {
        let ctx = Context {
            occasion: Occasion::CasualDay,
            target_dressiness: Some(0),
            temperature_band: TempBand::Mild,
            event_tags: BTreeSet::new(),
        };
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_profile_rejects_bad_baseline() {
        let mut profile = Profile::neutral("u-1");
        profile.baseline_dressiness = 9;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_occasion_wire_names() {
        assert_eq!(
            serde_json::to_string(&Occasion::WorkOffice).unwrap(),
            "\"work_office\""
        );
        assert_eq!(Occasion::WinterLayering.as_str(), "winter_layering");
    }
}
