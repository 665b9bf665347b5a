//! SKU price index — matches a SKU's category prefix to a price record.
//!
//! SKU prefixes are short codes ("BNT") or plain names ("BONTE") while
//! record names are free text ("Bonté"), so matching is fuzzy:
//! NFD + strip combining marks + lower-case, then substring containment
//! in either direction.
//!
//! Several records can match one token. The winner is picked by:
//!   1. normalized name equal to the token,
//!   2. smallest length difference between name and token,
//!   3. input order.

use crate::{diagnostic::Diagnostic, tier::PriceRecord};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Accent-, case- and surrounding-whitespace-insensitive form of `s`.
pub fn normalize(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Category part of a SKU: everything before the first `-`.
pub fn category_token(sku: &str) -> &str {
    sku.split('-').next().unwrap_or(sku).trim()
}

#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    records:    Vec<PriceRecord>,
    normalized: Vec<String>,
}

impl PriceIndex {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        let normalized = records.iter().map(|r| normalize(&r.category_name)).collect();
        Self { records, normalized }
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PriceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Find the price record for `sku`.
    pub fn find(&self, sku: &str) -> Result<&PriceRecord, Diagnostic> {
        let token = category_token(sku);
        let needle = normalize(token);
        let not_found = || Diagnostic::NoMatchingPriceRecord {
            sku:   sku.to_string(),
            token: token.to_string(),
        };
        if needle.is_empty() {
            return Err(not_found());
        }

        // min_by_key keeps the first of equal keys, which gives input order as the last tie-break.
        self.normalized
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .filter(|(_, name)| name.contains(&needle) || needle.contains(name.as_str()))
            .min_by_key(|(_, name)| {
                let inexact = name.as_str() != needle;
                let gap = name.chars().count().abs_diff(needle.chars().count());
                (inexact, gap)
            })
            .map(|(i, _)| &self.records[i])
            .ok_or_else(not_found)
    }
}
