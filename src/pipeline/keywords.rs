//! Keyword table for inferring the Operation/Activity column from document
//! text when the model leaves it unknown.
//!
//! The table is data: categories are scored in declared order, and that order
//! also breaks ties. Bump [`KeywordTable::version`] when the terms change.

use crate::pipeline::types::{OPERATION_CATCH_ALL, OPERATION_VALUES};

/// One operation category and the lowercase substrings that indicate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordCategory {
    pub name: &'static str,
    pub terms: &'static [&'static str],
}

/// Versioned category → term-set lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    pub version: u32,
    pub categories: Vec<KeywordCategory>,
    pub fallback: &'static str,
}

const OPERATION_KEYWORDS_V1: &[KeywordCategory] = &[
    KeywordCategory {
        name: "AMBULATORY",
        terms: &["walk", "step", "slip", "trip", "fall", "ladder", "stairs", "climb", "descending"],
    },
    KeywordCategory {
        name: "ERGONOMIC",
        terms: &["lift", "carri", "push", "pull", "strain", "manual", "posture", "overexert"],
    },
    KeywordCategory {
        name: "HAZMAT HANDLING",
        terms: &["chemical", "corrosive", "reactive", "toxic", "spill", "release", "container", "msds"],
    },
    KeywordCategory {
        name: "ELECTRICAL or HOT WORK",
        terms: &["electr", "wiring", "breaker", "480", "arc", "energized", "weld", "torch", "hot work"],
    },
    KeywordCategory {
        name: "INSPECTING/TESTING",
        terms: &["inspect", "test", "measurement", "verify", "calibrat"],
    },
    KeywordCategory {
        name: "OPERATING PORTABLE TOOLS/APPLIANCES",
        terms: &["drill", "grinder", "saw", "hand tool", "portable"],
    },
    KeywordCategory {
        name: "OPERATING MOBILE EQUIPMENT",
        terms: &["vehicle", "truck", "loader", "tractor", "forklift", "gsa vehicle", "mobile platform"],
    },
    KeywordCategory {
        name: "OPERATING STATIONARY EQUIPMENT/CRANES",
        terms: &["crane", "hoist", "lathe", "press", "compressor", "generator", "stationary"],
    },
    KeywordCategory {
        name: "OFFICE/OTHER",
        terms: &["office", "admin", "desk", "paperwork", "design"],
    },
];

impl Default for KeywordTable {
    fn default() -> Self {
        Self::operations_v1()
    }
}

impl KeywordTable {
    /// The operation table shipped with the first release.
    pub fn operations_v1() -> Self {
        Self {
            version: 1,
            categories: OPERATION_KEYWORDS_V1.to_vec(),
            fallback: OPERATION_CATCH_ALL,
        }
    }

    /// Score every category: one point per term found in the lowercased text.
    pub fn scores(&self, text: &str) -> Vec<(&'static str, usize)> {
        let haystack = text.to_lowercase();
        self.categories
            .iter()
            .map(|category| {
                let hits = category
                    .terms
                    .iter()
                    .filter(|term| haystack.contains(*term))
                    .count();
                (category.name, hits)
            })
            .collect()
    }

    /// Highest-scoring category; earliest wins ties; fallback when nothing
    /// matches.
    pub fn infer(&self, text: &str) -> &'static str {
        let mut best: Option<(&'static str, usize)> = None;
        for (name, score) in self.scores(text) {
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((name, score));
            }
        }
        best.map_or(self.fallback, |(name, _)| name)
    }

    /// True when every category name and the fallback are valid operations.
    pub fn is_consistent(&self) -> bool {
        self.categories
            .iter()
            .map(|c| c.name)
            .chain(std::iter::once(self.fallback))
            .all(|name| OPERATION_VALUES.contains(&name))
    }
}
