//! Declarative per-table cleaning rules.
//!
//! Each logical table has exactly one [`TableRules`] record. The normalizer
//! reads these records and never branches on the table name itself, so a new
//! table only needs a new record here.

use serde::Serialize;

use super::types::{ColumnType, LogicalTable};

/// An inclusive numeric bound on a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeRule {
    pub column: &'static str,
    pub min: f64,
    pub max: f64,
}

impl RangeRule {
    /// Check whether a value lies within the bound.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Cleaning rules for one logical table.
#[derive(Debug, Clone, Serialize)]
pub struct TableRules {
    pub table: LogicalTable,
    /// Columns removed before any other processing. Absent ones are ignored.
    pub drop_columns: &'static [&'static str],
    /// Columns coerced to numbers; coercion failure yields missing.
    pub numeric_columns: &'static [&'static str],
    /// Columns parsed as dates; invalid values yield missing.
    pub date_columns: &'static [&'static str],
    /// Rows missing any of these are dropped.
    pub critical_columns: &'static [&'static str],
    /// Binary flags constrained to {0, 1}.
    pub flag_columns: &'static [&'static str],
    /// Columns that must be strictly positive.
    pub positive_columns: &'static [&'static str],
    /// Bounded ordinals.
    pub ranges: &'static [RangeRule],
}

impl TableRules {
    /// Look up the rule set for a table.
    pub fn for_table(table: LogicalTable) -> &'static TableRules {
        match table {
            LogicalTable::ArSfamille => &AR_SFAMILLE,
            LogicalTable::Arfamille => &ARFAMILLE,
            LogicalTable::Article => &ARTICLE,
            LogicalTable::Codebarre => &CODEBARRE,
            LogicalTable::Fournisseur => &FOURNISSEUR,
            LogicalTable::Saison => &SAISON,
            LogicalTable::Tailles => &TAILLES,
        }
    }

    /// Declared type of a column under these rules.
    pub fn column_type(&self, column: &str) -> ColumnType {
        if self.numeric_columns.contains(&column) {
            ColumnType::Numeric
        } else if self.date_columns.contains(&column) {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }

    /// Whether a column is on the drop list.
    pub fn is_dropped(&self, column: &str) -> bool {
        self.drop_columns.contains(&column)
    }

    /// Columns that must be present in fetched rows, in declaration order.
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut required: Vec<&'static str> = Vec::new();
        for column in self.numeric_columns.iter().chain(self.critical_columns) {
            if !required.contains(column) {
                required.push(column);
            }
        }
        required
    }

    /// Columns known to the rules that survive cleaning, used as the schema
    /// of a table for which nothing was fetched.
    pub fn declared_columns(&self) -> Vec<&'static str> {
        let mut columns = self.required_columns();
        for column in self.date_columns {
            if !columns.contains(column) {
                columns.push(column);
            }
        }
        columns
    }
}

static AR_SFAMILLE: TableRules = TableRules {
    table: LogicalTable::ArSfamille,
    drop_columns: &["IDChaineMontage", "IDCategorieOFpardefaut"],
    numeric_columns: &["IDArSousFamille", "Etat", "IDArFamille"],
    date_columns: &[],
    critical_columns: &["IDArSousFamille", "Etat", "IDArFamille"],
    flag_columns: &["Etat"],
    positive_columns: &[],
    ranges: &[],
};

static ARFAMILLE: TableRules = TableRules {
    table: LogicalTable::Arfamille,
    drop_columns: &["IDChaineMontage", "QtePPP", "Type", "CodeDouane"],
    numeric_columns: &["IDArFamille", "Etat", "SaisonObligatoire"],
    date_columns: &[],
    critical_columns: &["IDArFamille", "Etat", "SaisonObligatoire"],
    flag_columns: &["Etat", "SaisonObligatoire"],
    positive_columns: &[],
    ranges: &[],
};

static ARTICLE: TableRules = TableRules {
    table: LogicalTable::Article,
    drop_columns: &[
        "IDGamme", "IDClient", "TempsClient", "IdProcess", "prixMP", "Valeur",
        "Cadence", "IdArticleBase", "SemiFini", "ValeurTissu", "ValeurFourniture",
        "ValeurMP", "TypeTarif", "IdMeilleurOF", "BaseStylisme", "IDTypeMatiereBase",
        "IDVarianteModele", "IDGenre", "IDBroderie", "IDSerigraphie", "IDGarniture",
        "IDTypeAccessoire", "IDTransfert", "IDCouleurGarniture", "IDCouleurBroderie",
        "IDCouleurSerigraphie", "PrixEmballage", "StockMin", "StockAlerte", "ValeurMPEuro",
        "ValeurMPAutre", "ValeurMPTunisie", "ValeurMPEuromed", "AQL", "AQLMineur",
        "IDNiveauControle", "AQLCritique", "IDCategorie", "IDCategoriereclamation",
        "IDCartouche", "IDArticleParent", "isParent", "QteFils", "Dimensions",
        "TempsAtelier", "TempsFinitions", "IDTypeMatelassage", "IDMP", "IsMP",
        "IDDecorArticle", "IsSemiFini", "TempsUnitaire", "TauxSondageQlte", "IDNorme",
        "DDV", "FraisTransport", "AutresFrais", "IDArticleEtqEntretien", "Ecologique",
        "TauxDefectueux", "Publier", "Ordre", "TauxCommissionCA", "CODE_OLD", "PrixEtude",
        "CodeDouane", "Observations", "NomenclatureValidePar", "NbrPiecesColis",
        "NbrColisPalette", "PoidsEmballage", "IDcomplexite", "IDAr_Theme", "Emballage",
        "Boutonnage", "SupportArt", "ReseauArt", "ReferenceFssr", "IDFibreComposition",
        "PrixOutlet", "IDPlanComptable",
    ],
    numeric_columns: &["IDArticle", "Etat", "TauxTVA", "NumInterne", "IDSaison"],
    date_columns: &["SaisiLe", "ModifieLe"],
    critical_columns: &["IDArticle", "Code"],
    flag_columns: &["Etat"],
    positive_columns: &[],
    ranges: &[],
};

static CODEBARRE: TableRules = TableRules {
    table: LogicalTable::Codebarre,
    drop_columns: &["Indice", "IDSerieArticle", "NumInterne"],
    numeric_columns: &[
        "IDCodeBarre",
        "IdEntite",
        "IdTaille",
        "IDAr_Couleur",
        "Prix",
        "isSynchronized",
        "isSynchronizedWeb",
    ],
    date_columns: &[],
    critical_columns: &["IDCodeBarre", "CodeBarre"],
    flag_columns: &["isSynchronized", "isSynchronizedWeb"],
    positive_columns: &["Prix"],
    ranges: &[],
};

static FOURNISSEUR: TableRules = TableRules {
    table: LogicalTable::Fournisseur,
    drop_columns: &[
        "isFournisseur", "Note", "Type", "FournitMP", "FournitMB", "NumInterne",
        "TauxRetenueSource", "ExonerationRS", "IsPDR", "Timbre", "ToleranceMAxAccepte",
        "IDBanque", "AdresseBanque", "VilleBanque", "NumCompte", "CodeSwift", "IBAN",
        "NonAssujettiTVA", "DelaisLivraison", "Reference", "IDFournisseurParent", "Difference",
        "AppliqueFodec", "Login_FRS", "IDPlanComptable", "DateExonerationRS", "Echeance",
        "IDConditionReglement",
    ],
    numeric_columns: &[
        "IDFournisseur",
        "Chiffre",
        "Reglements",
        "Solde",
        "IDDevise",
        "IDCategorie",
        "IDPays",
        "Etat",
        "IDCGAFournisseur",
        "IsMP",
        "IsPF",
    ],
    date_columns: &[],
    critical_columns: &["IDFournisseur", "Fournisseur", "Code"],
    flag_columns: &["Etat"],
    positive_columns: &[],
    ranges: &[],
};

static SAISON: TableRules = TableRules {
    table: LogicalTable::Saison,
    drop_columns: &["DateDebut", "DateFin"],
    numeric_columns: &["IDSaison", "Etat", "IDTypeSaison"],
    date_columns: &[],
    critical_columns: &["IDSaison", "Saison", "Code"],
    flag_columns: &["Etat"],
    positive_columns: &[],
    ranges: &[],
};

static TAILLES: TableRules = TableRules {
    table: LogicalTable::Tailles,
    drop_columns: &[
        "LibTailleAR",
        "LibTailleAutre",
        "LibTailleGER",
        "LibTailleUSA",
        "LibTailleSP",
        "LibTailleGRK",
    ],
    numeric_columns: &["IDGrille", "IdTaille", "Ordre", "isMilieu"],
    date_columns: &[],
    critical_columns: &["LibTaille", "IdTaille"],
    flag_columns: &["isMilieu"],
    positive_columns: &[],
    ranges: &[RangeRule {
        column: "Ordre",
        min: 0.0,
        max: 255.0,
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_has_rules() {
        for table in LogicalTable::ALL {
            assert_eq!(TableRules::for_table(table).table, table);
        }
    }

    #[test]
    fn test_rule_columns_are_consistent() {
        for table in LogicalTable::ALL {
            let rules = TableRules::for_table(table);
            // Constrained columns must be numeric so the constraint can be checked.
            for column in rules.flag_columns.iter().chain(rules.positive_columns) {
                assert!(rules.numeric_columns.contains(column), "{table}.{column}");
            }
            for range in rules.ranges {
                assert!(rules.numeric_columns.contains(&range.column));
            }
            // Nothing required is also dropped.
            for column in rules.required_columns() {
                assert!(!rules.is_dropped(column), "{table}.{column}");
            }
        }
    }

    #[test]
    fn test_column_type_lookup() {
        let rules = TableRules::for_table(LogicalTable::Article);
        assert_eq!(rules.column_type("TauxTVA"), ColumnType::Numeric);
        assert_eq!(rules.column_type("SaisiLe"), ColumnType::Date);
        assert_eq!(rules.column_type("Designation"), ColumnType::Text);
    }

    #[test]
    fn test_required_columns_deduplicated() {
        let rules = TableRules::for_table(LogicalTable::ArSfamille);
        assert_eq!(
            rules.required_columns(),
            vec!["IDArSousFamille", "Etat", "IDArFamille"]
        );

        let rules = TableRules::for_table(LogicalTable::Tailles);
        assert_eq!(
            rules.required_columns(),
            vec!["IDGrille", "IdTaille", "Ordre", "isMilieu", "LibTaille"]
        );
    }

    #[test]
    fn test_range_rule() {
        let rule = TableRules::for_table(LogicalTable::Tailles).ranges[0];
        assert!(rule.contains(0.0));
        assert!(rule.contains(255.0));
        assert!(!rule.contains(256.0));
        assert!(!rule.contains(-1.0));
    }
}
