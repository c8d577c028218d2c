//! Field roles, validation rules, and the expected master column set.
//!
//! Column roles are declared once and validated at table-load time instead of
//! being probed with ad-hoc "does this column exist" checks scattered through
//! the pipeline. Validation rules map a normalized column name to a pattern
//! its values must match from the first character; rule sets load from YAML
//! or JSON files keyed by extension, with a built-in default covering the
//! standard contact schema.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{error::ReconcileError, table::Table};

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const EMAIL: &str = "email";
pub const AGENT_ID: &str = "agent_id";
pub const OFFICE_ID: &str = "office_id";
pub const PHONE: &str = "phone";
pub const PHONE_SLOT: &str = "phone_slot";

/// The wide phone slot columns, in slot order.
pub const PHONE_SLOTS: [&str; 3] = ["phone_1", "phone_2", "phone_3"];

/// The `phone_N_type` partner column for a slot.
pub fn slot_type_column(slot: &str) -> String {
    format!("{slot}_type")
}

/// How a field participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Equality defines "the same real-world record"
    Identity,
    /// Multi-valued contact field, reshaped before comparison
    Contact,
    /// Copied through, never matched on
    Descriptive,
}

/// Column name -> role mapping for one table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMap {
    pub roles: BTreeMap<String, FieldRole>,
}

impl RoleMap {
    /// Role assignments for the standard contact schema.
    pub fn contact_defaults() -> Self {
        let mut roles = BTreeMap::new();
        for name in [FIRST_NAME, LAST_NAME, EMAIL, AGENT_ID, OFFICE_ID] {
            roles.insert(name.to_string(), FieldRole::Identity);
        }
        roles.insert(PHONE.to_string(), FieldRole::Contact);
        for slot in PHONE_SLOTS {
            roles.insert(slot.to_string(), FieldRole::Contact);
        }
        for name in [
            "office_name",
            "office_address",
            "office_city",
            "office_zip",
            "office_county",
            "alt_address",
            "alt_city",
            "alt_zip",
            "country",
        ] {
            roles.insert(name.to_string(), FieldRole::Descriptive);
        }
        RoleMap { roles }
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_config(path)
    }

    pub fn columns_with_role(&self, role: FieldRole) -> Vec<&str> {
        self.roles
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Contact-role columns this table actually carries.
    pub fn phone_columns_in(&self, table: &Table) -> Vec<String> {
        self.columns_with_role(FieldRole::Contact)
            .into_iter()
            .filter(|name| table.has_column(name))
            .map(str::to_string)
            .collect()
    }
}

/// Expected columns of the aggregated master list, in output order.
pub fn master_columns() -> Vec<String> {
    [
        AGENT_ID,
        FIRST_NAME,
        LAST_NAME,
        OFFICE_ID,
        "office_name",
        "phone_1",
        "phone_1_type",
        "phone_2",
        "phone_2_type",
        "phone_3",
        "phone_3_type",
        EMAIL,
        "alt_address",
        "alt_city",
        "alt_zip",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Column name -> value pattern. Values failing their pattern are blanked at
/// validation time; columns without a pattern are untouched (or dropped, in
/// the strict clean mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRules {
    pub patterns: BTreeMap<String, String>,
}

impl ValidationRules {
    /// Patterns for the standard contact schema: 10-digit phones, 5-digit
    /// zips not starting with 0, a plain address-shaped email.
    pub fn contact_defaults() -> Self {
        let mut patterns = BTreeMap::new();
        patterns.insert(AGENT_ID.to_string(), r"[A-Za-z0-9._-]+".to_string());
        patterns.insert(OFFICE_ID.to_string(), r"[A-Za-z0-9._-]+".to_string());
        patterns.insert(
            FIRST_NAME.to_string(),
            r"[A-Za-z][A-Za-z .,'-]*".to_string(),
        );
        patterns.insert(
            LAST_NAME.to_string(),
            r"[A-Za-z][A-Za-z .,'-]*".to_string(),
        );
        patterns.insert(
            EMAIL.to_string(),
            r"[^@\s]+@[^@\s]+\.[^@\s]+".to_string(),
        );
        patterns.insert(PHONE.to_string(), r"[0-9]{10}".to_string());
        for slot in PHONE_SLOTS {
            patterns.insert(slot.to_string(), r"[0-9]{10}".to_string());
            patterns.insert(slot_type_column(slot), r"\S.*".to_string());
        }
        for name in ["office_zip", "alt_zip"] {
            patterns.insert(name.to_string(), r"[1-9][0-9]{4}".to_string());
        }
        for name in [
            "office_name",
            "office_address",
            "office_city",
            "office_county",
            "alt_address",
            "alt_city",
            "country",
        ] {
            patterns.insert(name.to_string(), r"\S.*".to_string());
        }
        ValidationRules { patterns }
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_config(path)
    }

    /// Compiles each pattern anchored at the value start, the way the
    /// original rules were applied.
    pub fn compile(&self) -> Result<CompiledRules> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for (column, pattern) in &self.patterns {
            let regex = Regex::new(&format!("^(?:{pattern})"))
                .with_context(|| format!("Compiling rule for column '{column}'"))?;
            patterns.push((column.clone(), regex));
        }
        Ok(CompiledRules { patterns })
    }
}

#[derive(Debug)]
pub struct CompiledRules {
    patterns: Vec<(String, Regex)>,
}

impl CompiledRules {
    pub fn pattern_for(&self, column: &str) -> Option<&Regex> {
        self.patterns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, regex)| regex)
    }

    pub fn has_rule(&self, column: &str) -> bool {
        self.pattern_for(column).is_some()
    }
}

/// Returns `SchemaMismatch` naming every column of `required` the table lacks.
pub fn require_columns<'a, I>(table: &Table, required: I) -> Result<(), ReconcileError>
where
    I: IntoIterator<Item = &'a str>,
{
    let missing = table.missing_columns(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::schema_mismatch(missing))
    }
}

fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
    let reader = BufReader::new(file);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_reader(reader).with_context(|| format!("Parsing YAML from {path:?}"))
        }
        Some("json") => {
            serde_json::from_reader(reader).with_context(|| format!("Parsing JSON from {path:?}"))
        }
        other => Err(anyhow!(
            "Unsupported config extension {other:?} for {path:?} (expected .yaml, .yml, or .json)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn contact_defaults_cover_identity_and_contact_roles() {
        let roles = RoleMap::contact_defaults();
        assert_eq!(roles.roles.get(FIRST_NAME), Some(&FieldRole::Identity));
        assert_eq!(roles.roles.get("phone_2"), Some(&FieldRole::Contact));
        assert_eq!(
            roles.roles.get("office_city"),
            Some(&FieldRole::Descriptive)
        );
    }

    #[test]
    fn phone_columns_in_respects_table_layout() {
        let roles = RoleMap::contact_defaults();
        let wide = Table::new(vec![
            "first_name".into(),
            "phone_1".into(),
            "phone_3".into(),
        ]);
        assert_eq!(roles.phone_columns_in(&wide), ["phone_1", "phone_3"]);
        let long = Table::new(vec!["first_name".into(), "phone".into()]);
        assert_eq!(roles.phone_columns_in(&long), ["phone"]);
    }

    #[test]
    fn zip_rule_rejects_leading_zero() {
        let rules = ValidationRules::contact_defaults().compile().unwrap();
        let zip = rules.pattern_for("office_zip").unwrap();
        assert!(zip.is_match("90210"));
        assert!(!zip.is_match("01234"));
    }

    #[test]
    fn rules_load_from_yaml_and_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let yaml_path = dir.path().join("rules.yaml");
        let mut yaml = File::create(&yaml_path).expect("create yaml");
        writeln!(yaml, "patterns:\n  zip: \"[0-9]{{5}}\"").unwrap();
        let loaded = ValidationRules::load(&yaml_path).expect("load yaml");
        assert_eq!(loaded.patterns.get("zip").map(String::as_str), Some("[0-9]{5}"));

        let json_path = dir.path().join("rules.json");
        let mut json = File::create(&json_path).expect("create json");
        writeln!(json, "{{\"patterns\": {{\"email\": \".+@.+\"}}}}").unwrap();
        let loaded = ValidationRules::load(&json_path).expect("load json");
        assert_eq!(loaded.patterns.get("email").map(String::as_str), Some(".+@.+"));
    }

    #[test]
    fn require_columns_lists_every_missing_name() {
        let table = Table::new(vec!["first_name".into()]);
        let err = require_columns(&table, [FIRST_NAME, LAST_NAME, EMAIL]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required column(s): email, last_name"
        );
    }
}
