//! Property-based tests for the cleaning and scoring invariants.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p cleanscan --test property_tests
//!
//! # With more cases
//! PROPTEST_CASES=10000 cargo test -p cleanscan --test property_tests
//! ```

use std::collections::HashSet;

use proptest::prelude::*;

use cleanscan::detection::{IsolationForest, IsolationForestConfig};
use cleanscan::features::FeatureProjector;
use cleanscan::input::raw_row;
use cleanscan::{
    Cell, CleanedTable, ColumnType, LabelVector, LogicalTable, RawRow, RawValue, TableNormalizer,
    TableRules, Verdict, reconcile,
};

// =============================================================================
// Test Strategies
// =============================================================================

/// A raw cell as a database export might hold it: small numbers, junk text,
/// blanks and nulls.
fn raw_value() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        4 => (-2i64..4).prop_map(RawValue::from),
        1 => (-5.0f64..5.0).prop_map(RawValue::from),
        1 => "[a-z0-9 ]{0,4}".prop_map(RawValue::from),
        1 => Just(RawValue::from("nan")),
        1 => Just(RawValue::Null),
    ]
}

/// Rows of the product sub-family table, including a free-text column.
fn ar_sfamille_rows() -> impl Strategy<Value = Vec<RawRow>> {
    prop::collection::vec(
        (raw_value(), raw_value(), raw_value(), "[A-Z]{0,2}"),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(id, etat, famille, libelle)| {
                raw_row([
                    ("IDArSousFamille", id),
                    ("Etat", etat),
                    ("IDArFamille", famille),
                    ("Libelle", RawValue::from(libelle)),
                ])
            })
            .collect()
    })
}

/// Rows of the size table, where `Ordre` has a range rule.
fn tailles_rows() -> impl Strategy<Value = Vec<RawRow>> {
    prop::collection::vec(
        (0i64..3, 0i64..6, "[SMLX]{0,2}", -10i64..300, raw_value()),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(grille, taille, lib, ordre, milieu)| {
                raw_row([
                    ("IDGrille", RawValue::from(grille)),
                    ("IdTaille", RawValue::from(taille)),
                    ("LibTaille", RawValue::from(lib)),
                    ("Ordre", RawValue::from(ordre)),
                    ("isMilieu", milieu),
                ])
            })
            .collect()
    })
}

fn column<'a>(table: &'a CleanedTable, name: &str) -> Vec<&'a Cell> {
    table.column_by_name(name).expect("column present")
}

// =============================================================================
// Normalizer Properties
// =============================================================================

proptest! {
    /// Binary flags only ever hold 0 or 1 after cleaning.
    #[test]
    fn flags_are_binary(rows in ar_sfamille_rows()) {
        let result = TableNormalizer::new().normalize(LogicalTable::ArSfamille, &rows).unwrap();
        let rules = TableRules::for_table(LogicalTable::ArSfamille);

        for flag in rules.flag_columns {
            for cell in column(&result.table, flag) {
                prop_assert!(matches!(cell, Cell::Number(v) if *v == 0.0 || *v == 1.0));
            }
        }
    }

    /// Declared numeric columns hold numbers or nulls, never text.
    #[test]
    fn numeric_columns_are_numeric(rows in ar_sfamille_rows()) {
        let result = TableNormalizer::new().normalize(LogicalTable::ArSfamille, &rows).unwrap();

        for spec in &result.table.columns {
            if spec.column_type == ColumnType::Numeric {
                for cell in column(&result.table, &spec.name) {
                    prop_assert!(matches!(cell, Cell::Number(v) if v.is_finite()) || cell.is_null());
                }
            }
        }
    }

    /// Range-bounded ordinals stay inside their bounds.
    #[test]
    fn ranges_hold(rows in tailles_rows()) {
        let result = TableNormalizer::new().normalize(LogicalTable::Tailles, &rows).unwrap();
        for cell in column(&result.table, "Ordre") {
            let v = cell.as_f64().expect("Ordre present");
            prop_assert!((0.0..=255.0).contains(&v));
        }
    }

    /// No two cleaned rows are identical, and every row is accounted for.
    #[test]
    fn rows_are_unique_and_counted(rows in tailles_rows()) {
        let result = TableNormalizer::new().normalize(LogicalTable::Tailles, &rows).unwrap();

        let keys: HashSet<_> = result
            .table
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::key).collect::<Vec<_>>())
            .collect();
        prop_assert_eq!(keys.len(), result.table.row_count());
        prop_assert_eq!(
            result.report.rows_kept + result.report.dropped.total(),
            result.report.rows_fetched
        );
    }

    /// Cleaning a cleaned table changes nothing.
    #[test]
    fn normalizer_is_idempotent(rows in ar_sfamille_rows()) {
        let normalizer = TableNormalizer::new();
        let first = normalizer.normalize(LogicalTable::ArSfamille, &rows).unwrap();
        let second = normalizer
            .normalize(LogicalTable::ArSfamille, &first.table.to_raw_rows())
            .unwrap();

        if !first.table.is_empty() {
            prop_assert_eq!(&second.table, &first.table);
        }
        prop_assert_eq!(second.report.dropped.total(), 0);
    }
}

// =============================================================================
// Scoring Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Verdict counts add up and agree with each detector's flag count.
    #[test]
    fn reconciliation_totals(flags in prop::collection::vec((any::<bool>(), any::<bool>()), 0..200)) {
        let density = LabelVector::from_bools(flags.iter().map(|f| f.0));
        let reconstruction = LabelVector::from_bools(flags.iter().map(|f| f.1));
        let r = reconcile(&density, &reconstruction).unwrap();
        let s = &r.summary;

        prop_assert_eq!(s.total, flags.len());
        prop_assert_eq!(Verdict::ALL.iter().map(|v| s.count(*v)).sum::<usize>(), s.total);
        prop_assert_eq!(s.agreed_anomaly + s.density_only, density.flagged_count());
        prop_assert_eq!(s.agreed_anomaly + s.reconstruction_only, reconstruction.flagged_count());
    }

    /// The isolation forest labels every row, flags at most the configured share and
    /// is reproducible for a seed.
    #[test]
    fn isolation_forest_is_deterministic(
        rows in tailles_rows(),
        seed in any::<u64>(),
        contamination in 0.01f64..0.5,
    ) {
        let cleaned = TableNormalizer::new().normalize(LogicalTable::Tailles, &rows).unwrap().table;
        let matrix = FeatureProjector::new().project(&cleaned).unwrap();
        let config = IsolationForestConfig::default()
            .with_contamination(contamination)
            .with_seed(seed)
            .with_trees(20);
        let forest = IsolationForest::new(config);

        let a = forest.detect(&matrix).unwrap();
        let b = forest.detect(&matrix).unwrap();
        prop_assert_eq!(a.labels.len(), matrix.row_count());
        prop_assert_eq!(&a.labels, &b.labels);
        prop_assert_eq!(&a.scores, &b.scores);

        let n = matrix.row_count();
        if n > 1 {
            let ceiling = (contamination * (n - 1) as f64).ceil() as usize;
            prop_assert!(a.labels.flagged_count() <= ceiling);

            let threshold = a.threshold.unwrap();
            for (row, &score) in a.scores.iter().enumerate() {
                if a.labels.is_flagged(row) {
                    prop_assert!(score >= threshold);
                }
            }
        }
    }
}
