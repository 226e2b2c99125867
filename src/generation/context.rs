//! Per-call scratch space for SQL generation.

use std::collections::{BTreeMap, HashMap};

use inflector::Inflector;

use super::params::ParamValue;
use crate::config::TranslationSettings;

/// Mutable state for one `generate` call: parameter numbering, table
/// aliases and the requesting user. Build a fresh one for every call.
#[derive(Debug, Clone)]
pub struct TranslationContext {
    marker: String,
    prefix: String,
    counter: u32,
    aliases: HashMap<String, String>,
    parameters: BTreeMap<String, ParamValue>,
    pub user_id: Option<String>,
}

impl TranslationContext {
    pub fn new(marker: &str, prefix: &str) -> Self {
        Self {
            marker: marker.to_string(),
            prefix: prefix.to_string(),
            counter: 0,
            aliases: HashMap::new(),
            parameters: BTreeMap::new(),
            user_id: None,
        }
    }

    pub fn from_settings(settings: &TranslationSettings) -> Self {
        Self::new(&settings.parameter_marker, &settings.parameter_prefix)
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Bind a value under the next numbered name (`@p1`, `@p2`, ...).
    pub fn bind(&mut self, value: ParamValue) -> String {
        self.counter += 1;
        let name = format!("{}{}{}", self.marker, self.prefix, self.counter);
        self.parameters.insert(name.clone(), value);
        name
    }

    /// Bind a value under a fixed name such as `@start`.
    pub fn bind_named(&mut self, name: &str, value: ParamValue) -> String {
        let name = format!("{}{}", self.marker, name);
        self.parameters.insert(name.clone(), value);
        name
    }

    /// Alias for a table, assigned on first use from the initials of its
    /// words: `tbl_Daily_actions_games` becomes `dag`.
    pub fn alias(&mut self, table: &str) -> String {
        if let Some(alias) = self.aliases.get(table) {
            return alias.clone();
        }

        let base = initials(table);
        let mut alias = base.clone();
        let mut n = 2;
        while self.aliases.values().any(|a| *a == alias) {
            alias = format!("{}{}", base, n);
            n += 1;
        }
        self.aliases.insert(table.to_string(), alias.clone());
        alias
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn into_parameters(self) -> BTreeMap<String, ParamValue> {
        self.parameters
    }
}

fn initials(table: &str) -> String {
    let stem = table.strip_prefix("tbl_").unwrap_or(table);
    let initials: String = stem
        .to_snake_case()
        .split('_')
        .filter_map(|word| word.chars().next())
        .collect();
    if initials.is_empty() {
        "t".to_string()
    } else {
        initials
    }
}
