// src/normalize.rs
//! Raw rows → `NormalizedRecord`s for one category.
//!
//! Pure: no I/O, no logging, no clock. The same payload always yields the same
//! records in the same order with the same field order, so a cache entry
//! written from it is byte-identical.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value as Json;

use crate::category::DomainCategory;
use crate::core::sanitize::{normalize_entities, parse_flag, parse_number};
use crate::error::{MalformedReason, MalformedRecord};
use crate::record::{NormalizedRecord, Value};
use crate::source::RawPayload;

/// Joins multi-field identity keys (`space/Ablative Hazard Shielding`).
pub const KEY_SEPARATOR: &str = "/";

#[derive(Debug, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    /// Entries skipped. The first record with a given key wins.
    pub rejected: Vec<MalformedRecord>,
}

pub fn normalize(raw: &RawPayload, category: DomainCategory) -> Normalized {
    let mut out = Normalized::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.rows.len());

    for (index, row) in raw.rows.iter().enumerate() {
        let reject = |reason| MalformedRecord { category, index, reason };

        let Json::Object(obj) = row else {
            out.rejected.push(reject(MalformedReason::NotAnObject));
            continue;
        };

        let mut fields = BTreeMap::new();
        for (name, v) in obj {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(value) = field_value(category, name, v) {
                fields.insert(s!(name), value);
            }
        }

        let key = match identity_key(category, &fields) {
            Ok(k) => k,
            Err(reason) => {
                out.rejected.push(reject(reason));
                continue;
            }
        };
        if !seen.insert(key.clone()) {
            out.rejected.push(reject(MalformedReason::DuplicateKey(key)));
            continue;
        }
        out.records.push(NormalizedRecord { key, fields });
    }
    out
}

fn identity_key(
    category: DomainCategory,
    fields: &BTreeMap<String, Value>,
) -> Result<String, MalformedReason> {
    let mut parts = Vec::with_capacity(category.identity_fields().len());
    for &f in category.identity_fields() {
        match fields.get(f).and_then(key_part) {
            Some(p) => parts.push(p),
            None => return Err(MalformedReason::MissingIdentity(f)),
        }
    }
    Ok(parts.join(KEY_SEPARATOR))
}

fn key_part(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Top-level field: decoded, trimmed and coerced by the category's field lists.
/// `None` drops the field.
fn field_value(category: DomainCategory, name: &str, v: &Json) -> Option<Value> {
    match v {
        Json::String(s) => {
            let text = normalize_entities(s).trim().to_string();
            if text.is_empty() {
                return None;
            }
            if category.numeric_fields().contains(&name)
                && let Some(n) = parse_number(&text)
            {
                return Some(Value::Number(n));
            }
            if category.boolean_fields().contains(&name)
                && let Some(b) = parse_flag(&text)
            {
                return Some(Value::Bool(b));
            }
            Some(Value::Text(text))
        }
        other => plain_value(other),
    }
}

/// Nested values keep their JSON type; only strings are cleaned.
fn plain_value(v: &Json) -> Option<Value> {
    match v {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Value::Number),
        Json::String(s) => {
            let text = normalize_entities(s).trim().to_string();
            (!text.is_empty()).then_some(Value::Text(text))
        }
        Json::Array(items) => Some(Value::List(items.iter().filter_map(plain_value).collect())),
        Json::Object(map) => Some(Value::Map(
            map.iter()
                .filter_map(|(k, v)| plain_value(v).map(|v| (s!(k.trim()), v)))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceKind;
    use serde_json::json;

    fn payload(rows: Json) -> RawPayload {
        let Json::Array(rows) = rows else { panic!("fixture must be an array") };
        RawPayload::new(SourceKind::Api, rows)
    }

    #[test]
    fn ship_fields_are_coerced_and_cleaned() {
        let raw = payload(json!([{
            "Page": " USS Defiant ",
            "name": "U.S.S. Defiant",
            "tier": "6",
            "hull": "33,000",
            "type": "Escort",
            "fore": "4",
            "abilities": null,
            "displayclass": "Defiant &amp; Co",
            "hangars": "n/a",
        }]));
        let n = normalize(&raw, DomainCategory::Ship);
        assert!(n.rejected.is_empty());
        let r = &n.records[0];
        assert_eq!(r.key, "USS Defiant");
        assert_eq!(r.number("tier"), Some(6.0));
        assert_eq!(r.number("hull"), Some(33000.0));
        assert_eq!(r.text("displayclass"), Some("Defiant & Co"));
        // numeric-listed but unparseable stays text
        assert_eq!(r.text("hangars"), Some("n/a"));
        assert!(r.get("abilities").is_none());
        // not numeric-listed
        assert_eq!(r.text("type"), Some("Escort"));
    }

    #[test]
    fn flags_become_booleans() {
        let raw = payload(json!([{"type": "Phaser", "modifier": "[Acc]", "isunique": "1", "isepic": "no"}]));
        let n = normalize(&raw, DomainCategory::Modifier);
        let r = &n.records[0];
        assert_eq!(r.key, "Phaser/[Acc]");
        assert_eq!(r.get("isunique").and_then(Value::as_bool), Some(true));
        assert_eq!(r.get("isepic").and_then(Value::as_bool), Some(false));
    }

    #[test]
    fn missing_identity_is_rejected_and_rest_kept() {
        let raw = payload(json!([
            {"name": "Ablative Hazard Shielding", "environment": "space"},
            {"name": "Grounded", "environment": ""},
            {"environment": "ground"},
            "not a row",
        ]));
        let n = normalize(&raw, DomainCategory::Trait);
        assert_eq!(n.records.len(), 1);
        assert_eq!(n.records[0].key, "space/Ablative Hazard Shielding");
        let reasons: Vec<_> = n.rejected.iter().map(|m| (m.index, m.reason.clone())).collect();
        assert_eq!(
            reasons,
            vec![
                (1, MalformedReason::MissingIdentity("environment")),
                (2, MalformedReason::MissingIdentity("name")),
                (3, MalformedReason::NotAnObject),
            ]
        );
    }

    #[test]
    fn duplicate_keys_are_errors_not_overwrites() {
        let raw = payload(json!([
            {"name": "Emergency Weapon Cycle", "obtained": "first"},
            {"name": "Emergency Weapon Cycle", "obtained": "second"},
        ]));
        let n = normalize(&raw, DomainCategory::StarshipTrait);
        assert_eq!(n.records.len(), 1);
        assert_eq!(n.records[0].text("obtained"), Some("first"));
        assert_eq!(
            n.rejected[0].reason,
            MalformedReason::DuplicateKey(s!("Emergency Weapon Cycle"))
        );
    }

    #[test]
    fn output_is_deterministic() {
        let raw = payload(json!([
            {"spec": "Conn Officer", "white": "a", "department": "Tactical", "gold": {"z": 1, "a": [" x ", null]}},
            {"spec": "Projectile Weapons Officer", "department": "Tactical"},
        ]));
        let a = serde_json::to_vec(&normalize(&raw, DomainCategory::DutyOfficer).records).unwrap();
        let b = serde_json::to_vec(&normalize(&raw, DomainCategory::DutyOfficer).records).unwrap();
        assert_eq!(a, b);
        let text = String::from_utf8(a).unwrap();
        assert!(text.contains(r#""gold":{"a":["x"],"z":1.0}"#));
    }
}
