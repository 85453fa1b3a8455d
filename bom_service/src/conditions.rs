//! Weather condition classification.
//!
//! Maps BOM forecast icon codes onto the fixed set of condition labels the
//! host platform understands. Used both for the current condition and for
//! each forecast day.

use std::fmt;

/// Host-facing weather condition categories, in table-declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionCategory {
    ClearNight,
    Cloudy,
    Fog,
    Hail,
    Lightning,
    LightningRainy,
    PartlyCloudy,
    Pouring,
    Rainy,
    Snowy,
    SnowyRainy,
    Sunny,
    Windy,
    WindyVariant,
    Exceptional,
}

impl ConditionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionCategory::ClearNight => "clear-night",
            ConditionCategory::Cloudy => "cloudy",
            ConditionCategory::Fog => "fog",
            ConditionCategory::Hail => "hail",
            ConditionCategory::Lightning => "lightning",
            ConditionCategory::LightningRainy => "lightning-rainy",
            ConditionCategory::PartlyCloudy => "partlycloudy",
            ConditionCategory::Pouring => "pouring",
            ConditionCategory::Rainy => "rainy",
            ConditionCategory::Snowy => "snowy",
            ConditionCategory::SnowyRainy => "snowy-rainy",
            ConditionCategory::Sunny => "sunny",
            ConditionCategory::Windy => "windy",
            ConditionCategory::WindyVariant => "windy-variant",
            ConditionCategory::Exceptional => "exceptional",
        }
    }
}

impl fmt::Display for ConditionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category → BOM icon codes.
///
/// Code 16 (storm) appears under both `Hail` and `LightningRainy`; lookups
/// scan in declaration order, so `Hail` wins.
pub static CONDITION_CLASSES: &[(ConditionCategory, &[u32])] = &[
    (ConditionCategory::ClearNight, &[2]),
    (ConditionCategory::Cloudy, &[4]),
    (ConditionCategory::Fog, &[6, 10]),
    (ConditionCategory::Hail, &[16]),
    (ConditionCategory::Lightning, &[]),
    (ConditionCategory::LightningRainy, &[16]),
    (ConditionCategory::PartlyCloudy, &[3]),
    (ConditionCategory::Pouring, &[11]),
    (ConditionCategory::Rainy, &[8, 17, 18]),
    (ConditionCategory::Snowy, &[15]),
    (ConditionCategory::SnowyRainy, &[]),
    (ConditionCategory::Sunny, &[1]),
    (ConditionCategory::Windy, &[9]),
    (ConditionCategory::WindyVariant, &[13]),
    (ConditionCategory::Exceptional, &[19]),
];

/// Reverse lookup of a numeric icon code.
pub fn classify_code(code: u32) -> Option<ConditionCategory> {
    CONDITION_CLASSES
        .iter()
        .find(|(_, codes)| codes.contains(&code))
        .map(|(category, _)| *category)
}

/// Classifies a raw feed value: an icon code as text ("3", " 12 ").
///
/// Returns `None` for empty input, non-numeric text, or a code no category
/// claims.
pub fn classify(raw: &str) -> Option<ConditionCategory> {
    raw.trim().parse::<u32>().ok().and_then(classify_code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
