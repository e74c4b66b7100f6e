use crate::aggregate::profiles_document;
use crate::error::{CogitateError, Result};
use crate::model::Profiles;
use crate::store::Document;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 1;
pub const IDENTITY_HEADING: &str = "Username";
pub const DEFAULT_FIELDS: [&str; 4] = ["EMAIL", "COMMITS", "ADDED", "REMOVED"];

pub fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub fields: Vec<String>,
    pub contributors: BTreeMap<String, Map<String, Value>>,
}

fn lookup<'a>(identity: &str, record: &'a Value, field: &str) -> Result<&'a Value> {
    record.get(field).ok_or_else(|| CogitateError::FieldNotFound {
        identity: identity.to_string(),
        field: field.to_string(),
    })
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// One row per contributor: identity first, then `fields` in order.
pub fn table_rows(doc: &Document, fields: &[String]) -> Result<Vec<Vec<String>>> {
    doc.iter()
        .map(|(identity, record)| {
            let mut row = Vec::with_capacity(fields.len() + 1);
            row.push(identity.clone());
            for field in fields {
                row.push(cell(lookup(identity, record, field)?));
            }
            Ok(row)
        })
        .collect()
}

pub fn render_table(doc: &Document, fields: &[String]) -> Result<String> {
    let rows = table_rows(doc, fields)?;

    let headings: Vec<&str> = std::iter::once(IDENTITY_HEADING)
        .chain(fields.iter().map(String::as_str))
        .collect();
    let mut widths: Vec<usize> = headings.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headings
        .iter()
        .zip(&widths)
        .map(|(h, &w)| style(format!("{h:<w$}")).bold().to_string())
        .collect();
    out.push_str(&header.join("  "));
    out.push('\n');
    let line_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"─".repeat(line_width));
    out.push('\n');
    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    Ok(out)
}

pub fn render_profiles(profiles: &Profiles, fields: &[String]) -> Result<String> {
    render_table(&profiles_document(profiles)?, fields)
}

pub fn report_output(doc: &Document, fields: &[String]) -> Result<ReportOutput> {
    let mut contributors = BTreeMap::new();
    for (identity, record) in doc {
        let mut selected = Map::new();
        for field in fields {
            selected.insert(field.clone(), lookup(identity, record, field)?.clone());
        }
        contributors.insert(identity.clone(), selected);
    }
    Ok(ReportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        fields: fields.to_vec(),
        contributors,
    })
}
