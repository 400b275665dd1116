//! Symbolic import prefix rewriting

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{PlanError, PlanResult};

/// Who declared an alias. Fixed entries cannot be redefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasSource {
    Fixed,
    Preset,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasEntry {
    pub prefix: String,
    pub target: String,
    pub source: AliasSource,
}

/// Longest-prefix-first alias table
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    /// Build the table from fixed, preset and user layers. User entries
    /// override preset ones; redefining a fixed prefix with another target
    /// is an error.
    pub fn build(
        fixed: Vec<(String, String)>,
        preset: &BTreeMap<String, String>,
        user: &BTreeMap<String, String>,
    ) -> PlanResult<Self> {
        let mut table: BTreeMap<String, (String, AliasSource)> = BTreeMap::new();

        for (prefix, target) in fixed {
            if let Some((existing, _)) = table.get(&prefix) {
                if *existing != target {
                    return Err(ambiguous(&prefix, existing, &target));
                }
            }
            table.insert(prefix, (target, AliasSource::Fixed));
        }

        for (layer, source) in [(preset, AliasSource::Preset), (user, AliasSource::User)] {
            for (prefix, target) in layer {
                match table.get(prefix) {
                    Some((existing, AliasSource::Fixed)) if existing != target => {
                        return Err(ambiguous(prefix, existing, target));
                    }
                    Some((_, AliasSource::Fixed)) => continue,
                    Some((existing, _)) => {
                        debug!("Alias '{}' -> '{}' overrides '{}'", prefix, target, existing);
                    }
                    None => {}
                }
                table.insert(prefix.clone(), (target.clone(), source));
            }
        }

        let mut entries: Vec<AliasEntry> = table
            .into_iter()
            .map(|(prefix, (target, source))| AliasEntry { prefix, target, source })
            .collect();
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then_with(|| a.prefix.cmp(&b.prefix)));

        expand_targets(&mut entries);

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Rewrite `raw` with the longest matching prefix, if any
    pub fn resolve<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        for entry in &self.entries {
            if let Some(rest) = strip_alias(&entry.prefix, raw) {
                return Cow::Owned(join_target(&entry.target, rest));
            }
        }
        Cow::Borrowed(raw)
    }
}

fn ambiguous(prefix: &str, first: &str, second: &str) -> PlanError {
    PlanError::AmbiguousAlias {
        prefix: prefix.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

/// Remainder of `id` after `prefix`, without a leading slash
fn strip_alias<'a>(prefix: &str, id: &'a str) -> Option<&'a str> {
    if id == prefix {
        return Some("");
    }
    let rest = id.strip_prefix(prefix)?;
    if prefix.ends_with('/') {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

fn join_target(target: &str, rest: &str) -> String {
    if rest.is_empty() {
        target.to_string()
    } else {
        format!("{}/{}", target.trim_end_matches('/'), rest)
    }
}

/// Expand targets that start with another symbolic alias, once
fn expand_targets(entries: &mut [AliasEntry]) {
    let snapshot: Vec<(String, String)> = entries
        .iter()
        .map(|e| (e.prefix.clone(), e.target.clone()))
        .collect();

    for entry in entries.iter_mut() {
        for (prefix, target) in &snapshot {
            if *prefix == entry.prefix || !prefix.starts_with(['~', '@', '#']) {
                continue;
            }
            if let Some(rest) = strip_alias(prefix, &entry.target) {
                entry.target = join_target(target, rest);
                break;
            }
        }
    }
}
