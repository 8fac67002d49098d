//! Rule-driven table normalization.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::input::{RawRow, RawValue, RowSource};
use crate::schema::{
    Cell, CellKey, CleanedTable, ColumnSpec, ColumnType, LogicalTable, RangeRule, TableRules,
    format_number,
};

use super::report::{CleaningReport, DropReason};

// =============================================================================
// LAZY STATIC PATTERNS
// =============================================================================
// Accepted date shapes, each with the chrono format that parses it. Dates are
// read day-first since the exports come from a French locale.

static DATE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap(), "%Y-%m-%d"),
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(\.\d+)?$").unwrap(),
            "%Y-%m-%d %H:%M:%S%.f",
        ),
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?$").unwrap(),
            "%Y-%m-%dT%H:%M:%S%.f",
        ),
        (Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap(), "%d/%m/%Y"),
        (Regex::new(r"^\d{4}/\d{2}/\d{2}$").unwrap(), "%Y/%m/%d"),
    ]
});

/// A cleaned table together with its cleaning report.
#[derive(Debug, Clone, Serialize)]
pub struct Normalized {
    pub table: CleanedTable,
    pub report: CleaningReport,
}

/// Applies a table's [`TableRules`] to raw rows.
///
/// Row-level problems never fail the run: bad cells become missing and
/// violating rows are dropped. Only a missing required column is an error.
#[derive(Debug, Clone, Default)]
pub struct TableNormalizer;

impl TableNormalizer {
    /// Create a new normalizer.
    pub fn new() -> Self {
        Self
    }

    /// Fetch a table from a source and normalize it.
    pub fn clean<S: RowSource + ?Sized>(
        &self,
        source: &mut S,
        table: LogicalTable,
    ) -> Result<Normalized> {
        let rows = source.fetch(table)?;
        self.normalize(table, &rows)
    }

    /// Normalize raw rows of a table.
    pub fn normalize(&self, table: LogicalTable, rows: &[RawRow]) -> Result<Normalized> {
        let rules = TableRules::for_table(table);
        let mut report = CleaningReport {
            rows_fetched: rows.len(),
            ..Default::default()
        };

        if rows.is_empty() {
            let columns = rules
                .declared_columns()
                .into_iter()
                .map(|name| ColumnSpec::new(name, rules.column_type(name)))
                .collect();
            info!(table = %table, "no rows fetched");
            return Ok(Normalized {
                table: CleanedTable::empty(table, columns),
                report,
            });
        }

        // Columns in first-seen order across all rows.
        let mut names: IndexSet<&str> = IndexSet::new();
        for row in rows {
            names.extend(row.keys().map(String::as_str));
        }

        for required in rules.required_columns() {
            if !names.contains(required) {
                return Err(PipelineError::schema(table.as_str(), required));
            }
        }

        let mut columns = Vec::new();
        for name in &names {
            if rules.is_dropped(name) {
                report.dropped_columns.push(name.to_string());
            } else {
                columns.push(ColumnSpec::new(*name, rules.column_type(name)));
            }
        }

        let checks = RowChecks::new(rules, &columns);
        let mut seen: HashSet<Vec<CellKey>> = HashSet::new();
        let mut kept = Vec::new();

        for (row_idx, raw) in rows.iter().enumerate() {
            let cells: Vec<Cell> = columns
                .iter()
                .map(|spec| {
                    let value = raw.get(&spec.name).unwrap_or(&RawValue::Null);
                    let cell = coerce(value, spec.column_type);
                    if cell.is_null() && !is_missing(value) {
                        *report.coerced_to_null.entry(spec.name.clone()).or_insert(0) += 1;
                    }
                    cell
                })
                .collect();

            if let Some((reason, column)) = checks.violation(&cells) {
                debug!(
                    table = %table,
                    row = row_idx,
                    column,
                    reason = reason.label(),
                    "dropped row"
                );
                report.dropped.record(reason);
                continue;
            }

            let key: Vec<CellKey> = cells.iter().map(Cell::key).collect();
            if !seen.insert(key) {
                debug!(table = %table, row = row_idx, reason = DropReason::Duplicate.label(), "dropped row");
                report.dropped.record(DropReason::Duplicate);
                continue;
            }

            kept.push(cells);
        }

        report.rows_kept = kept.len();
        info!(
            table = %table,
            fetched = report.rows_fetched,
            kept = report.rows_kept,
            dropped = report.dropped.total(),
            "normalized table"
        );

        Ok(Normalized {
            table: CleanedTable::new(table, columns, kept),
            report,
        })
    }
}

/// Column positions of every row-level rule, resolved once per table.
struct RowChecks<'a> {
    critical: Vec<(usize, &'a str)>,
    flags: Vec<(usize, &'a str)>,
    positive: Vec<(usize, &'a str)>,
    ranges: Vec<(usize, &'a RangeRule)>,
}

impl<'a> RowChecks<'a> {
    fn new(rules: &'a TableRules, columns: &[ColumnSpec]) -> Self {
        let position = |name: &'a str| {
            columns
                .iter()
                .position(|c| c.name == name)
                .map(|idx| (idx, name))
        };

        Self {
            critical: rules.critical_columns.iter().filter_map(|c| position(*c)).collect(),
            flags: rules.flag_columns.iter().filter_map(|c| position(*c)).collect(),
            positive: rules.positive_columns.iter().filter_map(|c| position(*c)).collect(),
            ranges: rules
                .ranges
                .iter()
                .filter_map(|r| position(r.column).map(|(idx, _)| (idx, r)))
                .collect(),
        }
    }

    /// First rule the row violates, with the offending column.
    fn violation(&self, cells: &[Cell]) -> Option<(DropReason, &'a str)> {
        if let Some((_, name)) = self.critical.iter().find(|(idx, _)| cells[*idx].is_null()) {
            return Some((DropReason::MissingCritical, *name));
        }

        if let Some((_, name)) = self
            .flags
            .iter()
            .find(|(idx, _)| !matches!(cells[*idx].as_f64(), Some(v) if v == 0.0 || v == 1.0))
        {
            return Some((DropReason::InvalidFlag, *name));
        }

        if let Some((_, name)) = self
            .positive
            .iter()
            .find(|(idx, _)| !matches!(cells[*idx].as_f64(), Some(v) if v > 0.0))
        {
            return Some((DropReason::NonPositive, *name));
        }

        if let Some((_, rule)) = self
            .ranges
            .iter()
            .find(|(idx, rule)| !matches!(cells[*idx].as_f64(), Some(v) if rule.contains(v)))
        {
            return Some((DropReason::OutOfRange, rule.column));
        }

        None
    }
}

/// Whether a raw value is missing once trimmed.
fn is_missing(value: &RawValue) -> bool {
    match value {
        RawValue::Null => true,
        RawValue::Number(_) => false,
        RawValue::Text(s) => normalize_text(s).is_none(),
    }
}

/// Trim text; empty strings and "nan" in any case are missing.
pub fn normalize_text(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed)
    }
}

/// Convert a raw value to a cell of the declared type.
fn coerce(value: &RawValue, column_type: ColumnType) -> Cell {
    match (value, column_type) {
        (RawValue::Null, _) => Cell::Null,
        (RawValue::Number(n), ColumnType::Numeric) => finite(*n),
        (RawValue::Number(_), ColumnType::Date) => Cell::Null,
        (RawValue::Number(n), ColumnType::Text) => Cell::Text(format_number(*n)),
        (RawValue::Text(s), column_type) => match normalize_text(s) {
            None => Cell::Null,
            Some(text) => match column_type {
                ColumnType::Numeric => text.parse::<f64>().map(finite).unwrap_or(Cell::Null),
                ColumnType::Date => parse_date(text).map(Cell::Date).unwrap_or(Cell::Null),
                ColumnType::Text => Cell::Text(text.to_string()),
            },
        },
    }
}

fn finite(value: f64) -> Cell {
    if value.is_finite() { Cell::Number(value) } else { Cell::Null }
}

/// Parse a date in one of the accepted shapes; anything else is `None`.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let (_, format) = DATE_PATTERNS.iter().find(|(re, _)| re.is_match(value))?;
    if format.contains("%H") {
        NaiveDateTime::parse_from_str(value, format).ok()
    } else {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::raw_row;

    fn saison_row(id: &str, saison: &str, code: &str, etat: &str) -> RawRow {
        raw_row([
            ("IDSaison", id),
            ("Saison", saison),
            ("Code", code),
            ("Etat", etat),
            ("IDTypeSaison", "1"),
            ("DateDebut", "2023-01-01"),
        ])
    }

    #[test]
    fn test_text_normalization() {
        assert_eq!(normalize_text("  Lin  "), Some("Lin"));
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text("NaN"), None);
        assert_eq!(normalize_text(" nan "), None);
        assert_eq!(normalize_text("nano"), Some("nano"));
    }

    #[test]
    fn test_parse_date_shapes() {
        assert!(parse_date("2023-05-17").is_some());
        assert!(parse_date("2023-05-17 10:11:12").is_some());
        assert!(parse_date("2023-05-17 10:11:12.250").is_some());
        assert!(parse_date("2023-05-17T10:11:12").is_some());
        assert_eq!(
            parse_date("17/05/2023"),
            NaiveDate::from_ymd_opt(2023, 5, 17).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(parse_date("2023-02-30").is_none());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_saison_rules() {
        let rows = vec![
            saison_row("1", " Ete 2023 ", "E23", "1"),
            saison_row("2", "Hiver", "H23", "2"),   // invalid flag
            saison_row("3", "nan", "X", "0"),       // missing critical
            saison_row("abc", "Automne", "A", "0"), // id coerces to missing
            saison_row("1", "Ete 2023", "E23", "1"), // duplicate after trimming
            saison_row("5", "Printemps", "P24", "0"),
        ];

        let out = TableNormalizer::new().normalize(LogicalTable::Saison, &rows).unwrap();
        let table = out.table;

        assert_eq!(table.row_count(), 2);
        assert!(table.column_index("DateDebut").is_none());
        assert_eq!(table.get(0, 1), Some(&Cell::Text("Ete 2023".into())));
        assert_eq!(table.get(1, 0), Some(&Cell::Number(5.0)));

        let report = out.report;
        assert_eq!(report.rows_fetched, 6);
        assert_eq!(report.rows_kept, 2);
        assert_eq!(report.dropped.invalid_flag, 1);
        assert_eq!(report.dropped.missing_critical, 2);
        assert_eq!(report.dropped.duplicate, 1);
        assert_eq!(report.dropped_columns, vec!["DateDebut"]);
        assert_eq!(report.coerced_to_null.get("IDSaison"), Some(&1));
    }

    #[test]
    fn test_codebarre_price_must_be_positive() {
        let row = |id: i64, prix: RawValue| {
            raw_row([
                ("IDCodeBarre", RawValue::from(id)),
                ("CodeBarre", RawValue::from(format!("619{id:07}"))),
                ("IdEntite", RawValue::from(1i64)),
                ("IdTaille", RawValue::from(2i64)),
                ("IDAr_Couleur", RawValue::from(3i64)),
                ("Prix", prix),
                ("isSynchronized", RawValue::from(1i64)),
                ("isSynchronizedWeb", RawValue::from(0i64)),
                ("NumInterne", RawValue::from(9i64)),
            ])
        };
        let rows = vec![
            row(1, RawValue::from(12.5)),
            row(2, RawValue::from(0.0)),
            row(3, RawValue::from(-4.0)),
            row(4, RawValue::Null),
            row(5, RawValue::from("19.90")),
        ];

        let out = TableNormalizer::new().normalize(LogicalTable::Codebarre, &rows).unwrap();
        assert_eq!(out.table.row_count(), 2);
        assert_eq!(out.report.dropped.non_positive, 3);
        assert!(out.table.column_index("NumInterne").is_none());
    }

    #[test]
    fn test_tailles_ordre_range() {
        let row = |id: i64, ordre: &str| {
            raw_row([
                ("IDGrille", RawValue::from(1i64)),
                ("IdTaille", RawValue::from(id)),
                ("LibTaille", RawValue::from("M")),
                ("Ordre", RawValue::from(ordre)),
                ("isMilieu", RawValue::from("0")),
                ("LibTailleGER", RawValue::from("M")),
            ])
        };
        let rows = vec![row(1, "0"), row(2, "255"), row(3, "256"), row(4, "-1"), row(5, "")];

        let out = TableNormalizer::new().normalize(LogicalTable::Tailles, &rows).unwrap();
        assert_eq!(out.table.row_count(), 2);
        assert_eq!(out.report.dropped.out_of_range, 3);
    }

    #[test]
    fn test_article_dates_become_missing_not_errors() {
        let rows = vec![raw_row([
            ("IDArticle", "10"),
            ("Code", "ART-10"),
            ("Etat", "1"),
            ("TauxTVA", "19"),
            ("NumInterne", "7"),
            ("IDSaison", "2"),
            ("SaisiLe", "2022-11-03 09:15:00"),
            ("ModifieLe", "not a date"),
            ("IDGamme", "4"),
        ])];

        let out = TableNormalizer::new().normalize(LogicalTable::Article, &rows).unwrap();
        let table = out.table;
        assert_eq!(table.row_count(), 1);
        let saisi = table.column_index("SaisiLe").unwrap();
        let modifie = table.column_index("ModifieLe").unwrap();
        assert!(matches!(table.get(0, saisi), Some(Cell::Date(_))));
        assert_eq!(table.get(0, modifie), Some(&Cell::Null));
        assert_eq!(out.report.coerced_to_null.get("ModifieLe"), Some(&1));
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let rows = vec![raw_row([("IDSaison", "1"), ("Saison", "Ete"), ("Code", "E")])];
        let err = TableNormalizer::new()
            .normalize(LogicalTable::Saison, &rows)
            .unwrap_err();
        match err {
            PipelineError::Schema { table, column } => {
                assert_eq!(table, "saison");
                assert_eq!(column, "Etat");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_gives_empty_table() {
        let out = TableNormalizer::new().normalize(LogicalTable::Fournisseur, &[]).unwrap();
        assert!(out.table.is_empty());
        assert!(out.table.column_index("IDFournisseur").is_some());
        assert_eq!(out.report.rows_fetched, 0);
    }

    #[test]
    fn test_fully_filtered_table_is_empty_not_error() {
        let rows = vec![saison_row("1", "Ete", "E", "7"), saison_row("2", "Hiver", "H", "9")];
        let out = TableNormalizer::new().normalize(LogicalTable::Saison, &rows).unwrap();
        assert!(out.table.is_empty());
        assert_eq!(out.report.dropped.invalid_flag, 2);
    }

    #[test]
    fn test_normalizing_twice_is_stable() {
        let rows = vec![
            saison_row("1", " Ete ", "E23", "1"),
            saison_row("2", "Hiver", "H23", "0"),
            saison_row("2", "Hiver", "H23", "0"),
        ];
        let normalizer = TableNormalizer::new();
        let first = normalizer.normalize(LogicalTable::Saison, &rows).unwrap();
        let second = normalizer
            .normalize(LogicalTable::Saison, &first.table.to_raw_rows())
            .unwrap();

        assert_eq!(first.table, second.table);
        assert_eq!(second.report.dropped.total(), 0);
    }
}
