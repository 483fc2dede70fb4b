//! Vendor product-code parsing.
//!
//! A [`CodeTable`] maps code prefixes to a product type and a size.
//! The longest matching prefix wins, so `DBS-0123` resolves to the `DBS`
//! entry and never to `DB`.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::UnsupportedCodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePrefix {
    pub prefix: &'static str,
    pub size: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct CodeTable {
    pub type_name: &'static str,
    /// Plural label used in skip messages, e.g. `"delicas"`.
    pub family: &'static str,
    pub prefixes: &'static [CodePrefix],
}

/// A code that passed the table, normalized to `PREFIX-DIGITS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCode {
    pub code: String,
    pub type_name: &'static str,
    pub size: &'static str,
}

/// Miyuki Delica cylinder beads.
pub const DELICA: CodeTable = CodeTable {
    type_name: "Delica",
    family: "delicas",
    prefixes: &[
        CodePrefix {
            prefix: "DB",
            size: "11/0",
        },
        CodePrefix {
            prefix: "DBS",
            size: "15/0",
        },
        CodePrefix {
            prefix: "DBM",
            size: "10/0",
        },
        CodePrefix {
            prefix: "DBL",
            size: "8/0",
        },
    ],
};

static CODE_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,5})-?(\d{1,6})\b").expect("valid regex"));
static CODE_IN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-([A-Z]{2,5})-?(\d{1,6})(?:[/.?#-]|$)").expect("valid regex")
});

impl CodeTable {
    /// Resolves a raw code such as `"DB-123"`, `"db0123"` or `"DBS-15"`.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedCodeError`] when no prefix in the table matches
    /// with only digits (and an optional dash) following it.
    pub fn parse_code(&self, raw: &str) -> Result<ParsedCode, UnsupportedCodeError> {
        let upper = raw.trim().to_ascii_uppercase();
        self.prefixes
            .iter()
            .filter_map(|entry| {
                let rest = upper.strip_prefix(entry.prefix)?;
                let digits = rest.strip_prefix('-').unwrap_or(rest);
                (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                    .then_some((entry, digits))
            })
            .max_by_key(|(entry, _)| entry.prefix.len())
            .map(|(entry, digits)| ParsedCode {
                code: format!("{}-{digits}", entry.prefix),
                type_name: self.type_name,
                size: entry.size,
            })
            .ok_or_else(|| UnsupportedCodeError {
                family: self.family,
                item: raw.trim().to_string(),
            })
    }
}

/// Every code-shaped token in a product name, in order, e.g. `"DB-123"` in
/// `"DB-123 Miyuki Delica Silver Lined Crystal"`. Vendors sometimes put
/// their own stock number ahead of the maker's code, so callers should try
/// each one against their [`CodeTable`].
pub fn extract_codes(name: &str) -> impl Iterator<Item = String> + '_ {
    CODE_IN_TEXT
        .captures_iter(name)
        .map(|caps| format!("{}-{}", &caps[1], &caps[2]))
}

/// Finds a product code embedded in a detail-page path such as
/// `/miyuki-delica-11-0-db-0200.html`. The last match wins, since vendor
/// slugs put the code after the descriptive words.
#[must_use]
pub fn extract_code_from_link(path: &str) -> Option<String> {
    CODE_IN_LINK
        .captures_iter(path)
        .last()
        .map(|caps| format!("{}-{}", caps[1].to_ascii_uppercase(), &caps[2]))
}

/// Parses listing price text such as `"$3.45"`, `"USD 1,204.50"` or
/// `"3.45 - 4.10"` (first figure wins).
#[must_use]
pub fn parse_price(text: &str) -> Option<Decimal> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let figure: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    Decimal::from_str(figure.trim_end_matches('.')).ok()
}
