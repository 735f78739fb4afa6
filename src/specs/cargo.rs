// src/specs/cargo.rs
use crate::category::DomainCategory::{self, *};
use crate::config::consts::CARGO_PAGE_LIMIT;

/// One Cargo export query.
pub struct CargoSpec {
    pub table: &'static str,
    pub fields: &'static [&'static str],
    pub where_clause: Option<&'static str>,
    pub page_limit: usize,
}

impl CargoSpec {
    pub fn fields_param(&self) -> String {
        self.fields.join(",")
    }
}

const SHIP_FIELDS: &[&str] = &[
    "_pageName=Page", "name", "image", "fc", "tier", "type", "hull", "hullmod",
    "shieldmod", "turnrate", "impulse", "inertia", "powerall", "powerweapons",
    "powershields", "powerengines", "powerauxiliary", "powerboost", "boffs", "fore",
    "aft", "equipcannons", "devices", "consolestac", "consoleseng", "consolessci",
    "uniconsole", "t5uconsole", "experimental", "secdeflector", "hangars", "abilities",
    "displayprefix", "displayclass", "displaytype", "factionlede",
];

const EQUIPMENT_FIELDS: &[&str] = &[
    "_pageName=Page", "name", "rarity", "type", "boundto", "boundwhen", "who",
    "head1", "head2", "head3", "head4", "head5", "head6", "head7", "head8", "head9",
    "subhead1", "subhead2", "subhead3", "subhead4", "subhead5", "subhead6", "subhead7",
    "subhead8", "subhead9",
    "text1", "text2", "text3", "text4", "text5", "text6", "text7", "text8", "text9",
];

const TRAIT_FIELDS: &[&str] = &[
    "_pageName=Page", "name", "chartype", "environment", "type", "isunique", "description",
];

const STARSHIP_TRAIT_FIELDS: &[&str] = &[
    "_pageName=Page", "name", "short", "type", "detailed", "obtained", "basic",
];

const DOFF_FIELDS: &[&str] = &[
    "name=spec", "_pageName=Page", "shipdutytype", "department", "description",
    "white", "green", "blue", "purple", "violet", "gold",
];

const MODIFIER_FIELDS: &[&str] = &[
    "_pageName=Page", "modifier", "type", "stats", "available", "isunique", "isepic", "info",
];

pub fn for_category(category: DomainCategory) -> CargoSpec {
    let (table, fields, where_clause, page_limit) = match category {
        Ship => ("Ships", SHIP_FIELDS, None, CARGO_PAGE_LIMIT),
        Equipment => ("Infobox", EQUIPMENT_FIELDS, None, CARGO_PAGE_LIMIT * 2),
        Trait => ("Traits", TRAIT_FIELDS, None, CARGO_PAGE_LIMIT),
        StarshipTrait => ("StarshipTraits", STARSHIP_TRAIT_FIELDS, Some("name IS NOT NULL"), CARGO_PAGE_LIMIT),
        DutyOfficer => ("Specializations", DOFF_FIELDS, None, CARGO_PAGE_LIMIT),
        Modifier => ("Modifiers", MODIFIER_FIELDS, None, CARGO_PAGE_LIMIT),
    };
    CargoSpec { table, fields, where_clause, page_limit }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Name a field ends up under in the export (the alias when one is given).
    fn exported_name(field: &str) -> &str {
        match field.split_once('=') {
            Some((_, alias)) => alias,
            None => field,
        }
    }

    #[test]
    fn every_spec_exports_identity_fields() {
        for c in DomainCategory::ALL {
            let spec = for_category(c);
            for id in c.identity_fields() {
                assert!(
                    spec.fields.iter().any(|f| exported_name(f) == *id),
                    "{c}: cargo spec does not export identity field {id}"
                );
            }
        }
    }

    #[test]
    fn fields_param_is_comma_joined() {
        let spec = for_category(Trait);
        assert!(spec.fields_param().starts_with("_pageName=Page,name,chartype"));
    }
}
