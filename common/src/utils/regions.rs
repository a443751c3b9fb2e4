use std::{fs, path::Path};

use regex::Regex;
use tracing::info;

use crate::error::AppError;

/// One region's keyword query, loaded once per run from `region_query.csv`.
///
/// Terms keep the order they appear in the `query` column; matching scans
/// them in that order and stops at the first hit, so the order is part of the
/// observable behavior.
#[derive(Debug, Clone)]
pub struct RegionQuery {
    pub region_name: String,
    pub terms: Vec<String>,
    matchers: Vec<Regex>,
}

impl RegionQuery {
    pub fn new(region_name: impl Into<String>, raw_query: &str) -> Result<Self, AppError> {
        let region_name = region_name.into();
        let terms: Vec<String> = raw_query
            .split(',')
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();

        if terms.is_empty() {
            return Err(AppError::RegionQuery(format!(
                "region {region_name} has an empty query"
            )));
        }

        let matchers = terms
            .iter()
            .map(|term| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            region_name,
            terms,
            matchers,
        })
    }

    /// First term contained whole-word in any of `fields`, scanning fields in
    /// order and terms in query order. Returns the matched term.
    pub fn first_match<'a>(&'a self, fields: &[&str]) -> Option<&'a str> {
        for field in fields {
            for (term, matcher) in self.terms.iter().zip(&self.matchers) {
                if matcher.is_match(field) {
                    return Some(term);
                }
            }
        }
        None
    }
}

/// Loads the per-region queries from the tabular file produced by the query
/// builder (`region_name,query`; the `query` column is a comma-separated,
/// pre-sorted term list and is therefore quoted).
pub fn load_region_queries(path: &Path) -> Result<Vec<RegionQuery>, AppError> {
    let raw = fs::read_to_string(path)?;
    let regions = parse_region_queries(&raw)?;
    info!(
        file = %path.display(),
        regions = regions.len(),
        "loaded region queries"
    );
    Ok(regions)
}

fn parse_region_queries(raw: &str) -> Result<Vec<RegionQuery>, AppError> {
    let mut lines = raw.lines();
    let header = lines
        .next()
        .ok_or_else(|| AppError::RegionQuery("region query file is empty".to_string()))?;
    if split_fields(header) != ["region_name", "query"] {
        return Err(AppError::RegionQuery(format!(
            "unexpected header: {header}"
        )));
    }

    let mut regions = Vec::new();
    for (index, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line);
        let [region_name, query] = fields.as_slice() else {
            return Err(AppError::RegionQuery(format!(
                "line {}: expected 2 columns, found {}",
                index + 2,
                fields.len()
            )));
        };
        regions.push(RegionQuery::new(region_name.trim(), query)?);
    }
    Ok(regions)
}

// Minimal RFC 4180 splitting: quotes wrap fields containing commas, a doubled
// quote inside a quoted field is a literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
