/// In-memory symbol index over Doxygen search data.
///
/// Built once from parsed entries and never mutated. Matching is a plain
/// substring (or prefix) test against each entry's sort key, in load order,
/// with no ranking. A reload builds a new `SymbolIndex`.
use std::collections::HashMap;

use serde_json::Value;

use crate::error::AppError;
use crate::model::{IndexEntry, SectionSummary, Target};
use crate::parser::{self, LoadedData};

/// How a query fragment must line up with a sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Fragment may appear anywhere in the sort key.
    #[default]
    Substring,
    /// Fragment must start the sort key.
    Prefix,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions<'a> {
    pub case_sensitive: bool,
    pub mode: MatchMode,
    /// Only entries of this section (ASCII case-insensitive).
    pub section: Option<&'a str>,
}

/// A matching entry together with its targets (always all of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolMatch<'a> {
    pub entry: &'a IndexEntry,
    pub targets: &'a [Target],
}

#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    entries: Vec<IndexEntry>,
    /// Lowercased sort keys, parallel to `entries`.
    folded_keys: Vec<String>,
    labels: HashMap<String, String>,
}

impl SymbolIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self::with_labels(entries, HashMap::new())
    }

    pub fn with_labels(entries: Vec<IndexEntry>, labels: HashMap<String, String>) -> Self {
        let folded_keys = entries.iter().map(|e| e.sort_key.to_lowercase()).collect();
        Self {
            entries,
            folded_keys,
            labels,
        }
    }

    /// Build an index straight from raw `searchData` records.
    pub fn load(records: &[Value]) -> Result<Self, AppError> {
        let entries = parser::parse_records("records", parser::DEFAULT_SECTION, records)?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Entries whose sort key contains `fragment`, in load order.
    ///
    /// Case-folded unless `case_sensitive`. An empty fragment matches everything.
    pub fn query(&self, fragment: &str, case_sensitive: bool) -> Vec<SymbolMatch<'_>> {
        self.query_with(
            fragment,
            &QueryOptions {
                case_sensitive,
                ..QueryOptions::default()
            },
        )
    }

    /// Case-insensitive substring search.
    pub fn search(&self, text: &str) -> Vec<SymbolMatch<'_>> {
        self.query(text, false)
    }

    pub fn query_with(&self, fragment: &str, options: &QueryOptions<'_>) -> Vec<SymbolMatch<'_>> {
        let needle = if options.case_sensitive {
            fragment.to_string()
        } else {
            fragment.to_lowercase()
        };

        self.entries
            .iter()
            .zip(&self.folded_keys)
            .filter(|(entry, _)| {
                options
                    .section
                    .map_or(true, |s| entry.section.eq_ignore_ascii_case(s))
            })
            .filter(|(entry, folded)| {
                let key = if options.case_sensitive {
                    entry.sort_key.as_str()
                } else {
                    folded.as_str()
                };
                match options.mode {
                    MatchMode::Substring => key.contains(&needle),
                    MatchMode::Prefix => key.starts_with(&needle),
                }
            })
            .map(|(entry, _)| SymbolMatch {
                entry,
                targets: &entry.targets,
            })
            .collect()
    }

    /// Entries whose display name or sort key equals `name`, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.display_name.eq_ignore_ascii_case(name) || e.sort_key.eq_ignore_ascii_case(name)
            })
            .collect()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.entries.iter().any(|e| e.section.eq_ignore_ascii_case(section))
    }

    /// Entries of one section, in load order.
    pub fn section_entries<'a>(
        &'a self,
        section: &'a str,
    ) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.section.eq_ignore_ascii_case(section))
    }

    /// Sections in order of first appearance, with entry counts.
    pub fn sections(&self) -> Vec<SectionSummary> {
        let mut summaries: Vec<SectionSummary> = Vec::new();
        for entry in &self.entries {
            match summaries.iter_mut().find(|s| s.name == entry.section) {
                Some(summary) => summary.entry_count += 1,
                None => summaries.push(SectionSummary {
                    name: entry.section.clone(),
                    label: self.label(&entry.section),
                    entry_count: 1,
                }),
            }
        }
        summaries
    }

    pub fn label(&self, section: &str) -> String {
        self.labels
            .get(section)
            .cloned()
            .unwrap_or_else(|| parser::default_label(section))
    }
}

impl From<LoadedData> for SymbolIndex {
    fn from(data: LoadedData) -> Self {
        Self::with_labels(data.entries, data.labels)
    }
}
