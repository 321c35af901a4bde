//! Deterministic identifier allocation.
//!
//! Each hint has its own counter, so `create("line")` yields `line1`, `line2`,
//! ... independent of other hints. A name already handed out under another
//! hint is skipped. One generator serves one stage pass; it is passed
//! explicitly, never shared globally.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    prefix: String,
    counters: BTreeMap<String, u32>,
    issued: BTreeSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counters: BTreeMap::new(),
            issued: BTreeSet::new(),
        }
    }

    pub fn create(&mut self, hint: &str) -> String {
        // "a1" + 1 would otherwise read as "a" + 11.
        let sep = if hint.ends_with(|c: char| c.is_ascii_digit()) {
            "_"
        } else {
            ""
        };
        let counter = self.counters.entry(hint.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let name = format!("{}{}{}{}", self.prefix, hint, sep, counter);
            if self.issued.insert(name.clone()) {
                return name;
            }
        }
    }
}
