// src/category.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One kind of game reference data, refreshed and cached as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainCategory {
    Ship,
    Equipment,
    Trait,
    StarshipTrait,
    DutyOfficer,
    Modifier,
}

use DomainCategory::*;

impl DomainCategory {
    pub const COUNT: usize = 6;
    pub const ALL: [DomainCategory; Self::COUNT] =
        [Ship, Equipment, Trait, StarshipTrait, DutyOfficer, Modifier];

    /// Stable position in `ALL`; used for per-category lock slots.
    pub fn index(self) -> usize {
        match self {
            Ship => 0,
            Equipment => 1,
            Trait => 2,
            StarshipTrait => 3,
            DutyOfficer => 4,
            Modifier => 5,
        }
    }

    /// Cache partition name and CLI spelling.
    pub fn slug(self) -> &'static str {
        match self {
            Ship => "ship",
            Equipment => "equipment",
            Trait => "trait",
            StarshipTrait => "starship_trait",
            DutyOfficer => "duty_officer",
            Modifier => "modifier",
        }
    }

    /// Fields that together form the record key. All must be present and non-empty.
    pub fn identity_fields(self) -> &'static [&'static str] {
        match self {
            Ship => &["Page"],
            Equipment => &["name"],
            Trait => &["environment", "name"],
            StarshipTrait => &["name"],
            DutyOfficer => &["spec"],
            Modifier => &["type", "modifier"],
        }
    }

    /// Fields coerced to numbers when they look numeric.
    pub fn numeric_fields(self) -> &'static [&'static str] {
        match self {
            Ship => &[
                "tier", "hull", "hullmod", "shieldmod", "turnrate", "impulse", "inertia",
                "powerall", "powerweapons", "powershields", "powerengines", "powerauxiliary",
                "fore", "aft", "devices", "consolestac", "consoleseng", "consolessci",
                "uniconsole", "t5uconsole", "experimental", "secdeflector", "hangars",
            ],
            Equipment => &[],
            Trait => &[],
            StarshipTrait => &[],
            DutyOfficer => &[],
            Modifier => &[],
        }
    }

    /// Fields coerced to booleans ("1"/"0", "yes"/"no", "true"/"false").
    pub fn boolean_fields(self) -> &'static [&'static str] {
        match self {
            Trait => &["isunique"],
            Modifier => &["isunique", "isepic"],
            _ => &[],
        }
    }
}

impl fmt::Display for DomainCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.slug())
    }
}

impl FromStr for DomainCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "ship" | "ships" => Ok(Ship),
            "equipment" => Ok(Equipment),
            "trait" | "traits" => Ok(Trait),
            "starship_trait" | "starship_traits" | "starshiptrait" => Ok(StarshipTrait),
            "duty_officer" | "duty_officers" | "dutyofficer" | "doff" | "doffs" => Ok(DutyOfficer),
            "modifier" | "modifiers" => Ok(Modifier),
            other => Err(format!("Unknown category: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_all_order() {
        for (i, c) in DomainCategory::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn parses_slugs_and_aliases() {
        for c in DomainCategory::ALL {
            assert_eq!(c.slug().parse::<DomainCategory>().unwrap(), c);
        }
        assert_eq!("Starship-Traits".parse::<DomainCategory>().unwrap(), StarshipTrait);
        assert_eq!("doffs".parse::<DomainCategory>().unwrap(), DutyOfficer);
        assert!("boffs".parse::<DomainCategory>().is_err());
    }

    #[test]
    fn every_category_has_identity() {
        for c in DomainCategory::ALL {
            assert!(!c.identity_fields().is_empty());
        }
    }
}
