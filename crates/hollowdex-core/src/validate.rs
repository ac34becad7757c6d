// ABOUTME: Validation for item payloads submitted to the draft or published stores.
// ABOUTME: Structural checks apply to every write; schema checks add per-collection required fields.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use crate::collection::Collection;
use crate::item::Item;

/// Errors raised when a payload cannot be accepted as a collection's items.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("data must be an array of items")]
    NotAnArray,

    #[error("item validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ValidationError {
    /// The individual problems, one per offending item or field.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ValidationError::NotAnArray => vec![self.to_string()],
            ValidationError::Invalid(errors) => errors.clone(),
        }
    }
}

/// A required field and, optionally, the values it may take.
struct FieldRule {
    field: &'static str,
    allowed: Option<&'static [&'static str]>,
}

const fn required(field: &'static str) -> FieldRule {
    FieldRule {
        field,
        allowed: None,
    }
}

const fn one_of(field: &'static str, allowed: &'static [&'static str]) -> FieldRule {
    FieldRule {
        field,
        allowed: Some(allowed),
    }
}

fn schema_rules(collection: Collection) -> &'static [FieldRule] {
    const AGENTS: &[FieldRule] = &[
        required("faction"),
        required("role"),
        one_of("rarity", &["S", "A"]),
        required("element"),
    ];
    const SOUND_ENGINES: &[FieldRule] = &[required("role"), one_of("rarity", &["S", "A", "B"])];
    const BUMBOS: &[FieldRule] = &[one_of("rarity", &["S", "A"])];
    const DRIVE_DISKS: &[FieldRule] = &[required("description")];
    const HSR_CHARACTERS: &[FieldRule] = &[required("element"), required("path"), required("rarity")];
    const HSR_CONES: &[FieldRule] = &[required("path"), required("rarity")];
    const HSR_RELICS: &[FieldRule] = &[required("type")];

    match collection {
        Collection::Agents => AGENTS,
        Collection::SoundEngines => SOUND_ENGINES,
        Collection::Bumbos => BUMBOS,
        Collection::DriveDisks => DRIVE_DISKS,
        Collection::HsrCharacters => HSR_CHARACTERS,
        Collection::HsrCones => HSR_CONES,
        Collection::HsrRelics => HSR_RELICS,
    }
}

/// Parse an untyped payload into items. The payload must be an array whose
/// elements each carry a positive integer `id` and a non-empty string `name`.
/// All problems are collected before returning.
pub fn parse_items(value: &Value) -> Result<Vec<Item>, ValidationError> {
    let entries = value.as_array().ok_or(ValidationError::NotAnArray)?;

    let mut items = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let position = index + 1;
        let Some(object) = entry.as_object() else {
            errors.push(format!("item {position} is not an object"));
            continue;
        };

        let id_ok = object.get("id").and_then(Value::as_i64).is_some_and(|id| id > 0);
        let name_ok = object
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !id_ok || !name_ok {
            errors.push(format!("item {position} is missing required field id or name"));
            continue;
        }

        match serde_json::from_value::<Item>(entry.clone()) {
            Ok(item) => items.push(item),
            Err(e) => errors.push(format!("item {position}: {e}")),
        }
    }

    if !errors.is_empty() {
        return Err(ValidationError::Invalid(errors));
    }

    check_items(&items)?;
    Ok(items)
}

/// Structural checks on already-typed items: positive ids, non-empty names,
/// and unique ids.
pub fn check_items(items: &[Item]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        if item.id <= 0 {
            errors.push(format!("item {position} has non-positive id {}", item.id));
        }
        if item.name.trim().is_empty() {
            errors.push(format!("item {position} has an empty name"));
        }
        if !seen.insert(item.id) {
            errors.push(format!("item {position} repeats id {}", item.id));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(errors))
    }
}

/// Per-collection required fields and allowed values.
pub fn check_schema(collection: Collection, items: &[Item]) -> Result<(), ValidationError> {
    let rules = schema_rules(collection);
    let mut errors = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        for rule in rules {
            match item.attr_str(rule.field).filter(|v| !v.trim().is_empty()) {
                None => errors.push(format!(
                    "item {position} ({collection}) is missing required field {}",
                    rule.field
                )),
                Some(value) => {
                    if let Some(allowed) = rule.allowed
                        && !allowed.contains(&value)
                    {
                        errors.push(format!(
                            "item {position} ({collection}) has {} {value:?}, expected one of {}",
                            rule.field,
                            allowed.join(", ")
                        ));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(errors))
    }
}
