// src/specs/pages.rs
use crate::category::DomainCategory::{self, *};

/// Where a category's tables live on the wiki and how to read them.
pub struct PageSpec {
    /// Page titles under the wiki path, already in `_` form.
    pub pages: &'static [&'static str],
    /// Class token the target tables carry.
    pub table_class: &'static str,
    /// Header (in `sanitize::field_name` form) → record field. Unlisted headers
    /// pass through under their own field name.
    pub columns: &'static [(&'static str, &'static str)],
    /// Rows with fewer cells are layout noise.
    pub min_cells: usize,
}

impl PageSpec {
    pub fn field_for(&self, header: &str) -> String {
        self.columns
            .iter()
            .find(|(h, _)| *h == header)
            .map(|(_, f)| s!(*f))
            .unwrap_or_else(|| s!(header))
    }
}

const SHIP_PAGES: &[&str] = &[
    "Raider", "Escort", "Cruiser", "Science_Vessel", "Carrier", "Dreadnought",
    "Warbird", "Bird_of_Prey", "Battlecruiser",
];

const SHIP_COLUMNS: &[(&str, &str)] = &[
    ("ship", "Page"),
    ("ship_name", "Page"),
    ("name", "Page"),
    ("faction", "fc"),
    ("tier", "tier"),
    ("type", "type"),
    ("hull", "hull"),
    ("turn", "turnrate"),
    ("turn_rate", "turnrate"),
    ("fore", "fore"),
    ("aft", "aft"),
    ("devices", "devices"),
    ("tactical", "consolestac"),
    ("engineering", "consoleseng"),
    ("science", "consolessci"),
    ("hangars", "hangars"),
];

const STARSHIP_TRAIT_COLUMNS: &[(&str, &str)] = &[
    ("trait", "name"),
    ("name", "name"),
    ("obtained", "obtained"),
    ("obtained_from", "obtained"),
    ("description", "detailed"),
];

pub fn for_category(category: DomainCategory) -> Option<PageSpec> {
    match category {
        Ship => Some(PageSpec {
            pages: SHIP_PAGES,
            table_class: "wikitable",
            columns: SHIP_COLUMNS,
            min_cells: 2,
        }),
        StarshipTrait => Some(PageSpec {
            pages: &["Starship_traits"],
            table_class: "wikitable",
            columns: STARSHIP_TRAIT_COLUMNS,
            min_cells: 2,
        }),
        Equipment | Trait | DutyOfficer | Modifier => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_specs_produce_identity_fields() {
        for c in DomainCategory::ALL {
            let Some(spec) = for_category(c) else { continue };
            for id in c.identity_fields() {
                assert!(
                    spec.columns.iter().any(|(_, f)| f == id),
                    "{c}: page spec never yields identity field {id}"
                );
            }
        }
    }

    #[test]
    fn unknown_headers_pass_through() {
        let spec = for_category(Ship).unwrap();
        assert_eq!(spec.field_for("ship"), "Page");
        assert_eq!(spec.field_for("shield_modifier"), "shield_modifier");
    }
}
