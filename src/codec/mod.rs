//! Document codec - xlsx blob to register and back
//!
//! Each table lives on its own sheet with a fixed column order and a header
//! row. Decoding keeps rows it cannot interpret; encoding rewrites only the
//! tables that changed and leaves every other sheet as it was.

pub mod control;
pub mod relationship;
pub mod risk;
pub mod sheet;
pub mod usecase;

use thiserror::Error;

use crate::core::entity::Entity;
use crate::core::register::{Register, Slot, Table};
use sheet::{Cell, SheetKind, Workbook};

/// Errors raised while reading or writing the document
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to parse spreadsheet: {0}")]
    Read(String),

    #[error("failed to write spreadsheet: {0}")]
    Write(String),

    #[error("no sheet for {0} in document")]
    SheetNotFound(SheetKind),
}

/// Parse a document into a register
///
/// Only the risk sheet is mandatory; missing control, relationship and use
/// case sheets decode as empty tables.
pub fn decode(bytes: &[u8]) -> Result<Register, CodecError> {
    let book = Workbook::from_bytes(bytes)?;

    let risk_grid = book.grid(&book.find_sheet(SheetKind::Risks)?)?;
    let risk_layout = risk::detect_layout(&risk_grid);
    let risks = risk::decode(&risk_grid, risk_layout);

    let controls = match optional_grid(&book, SheetKind::Controls)? {
        Some(grid) => control::decode(&grid),
        None => Table::new(),
    };
    let relationships = match optional_grid(&book, SheetKind::Relationships)? {
        Some(grid) => relationship::decode(&grid),
        None => Table::new(),
    };
    let use_cases = match optional_grid(&book, SheetKind::UseCases)? {
        Some(grid) => usecase::decode(&grid),
        None => Table::new(),
    };

    Ok(Register {
        risk_layout,
        risks,
        controls,
        use_cases,
        relationships,
    })
}

fn optional_grid(book: &Workbook, kind: SheetKind) -> Result<Option<sheet::SheetGrid>, CodecError> {
    match book.find_sheet(kind) {
        Ok(name) => book.grid(&name).map(Some),
        Err(CodecError::SheetNotFound(_)) => {
            tracing::debug!(table = %kind, "sheet not present");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Write the dirty tables of `register` over `base`
///
/// An empty `base` starts a new document.
pub fn encode(base: &[u8], register: &Register) -> Result<Vec<u8>, CodecError> {
    let mut book = if base.is_empty() {
        Workbook::new()
    } else {
        Workbook::from_bytes(base)?
    };

    if register.risks.is_dirty() {
        let layout = register.risk_layout;
        let rows = table_rows(&register.risks, |r| risk::encode(r, layout));
        book.write_table(SheetKind::Risks, layout.header(), &rows)?;
    }
    if register.controls.is_dirty() {
        let rows = table_rows(&register.controls, control::encode);
        book.write_table(SheetKind::Controls, &control::HEADER, &rows)?;
    }
    if register.relationships.is_dirty() {
        let rows = table_rows(&register.relationships, relationship::encode);
        book.write_table(SheetKind::Relationships, &relationship::HEADER, &rows)?;
    }
    if register.use_cases.is_dirty() {
        let rows = table_rows(&register.use_cases, usecase::encode);
        book.write_table(SheetKind::UseCases, &usecase::HEADER, &rows)?;
    }

    book.to_bytes()
}

/// An empty register document with all four sheets
pub fn empty_document(layout: crate::core::register::RiskLayout) -> Result<Vec<u8>, CodecError> {
    encode(&[], &Register::new_document(layout))
}

fn table_rows<T, F>(table: &Table<T>, encode_record: F) -> Vec<Vec<Cell>>
where
    T: Entity,
    F: Fn(&T) -> Vec<Cell>,
{
    table
        .slots()
        .iter()
        .filter_map(|slot| match slot {
            Slot::Record {
                original: Some(cells),
                ..
            } => Some(cells.clone()),
            Slot::Record { record, extra, .. } => {
                let mut cells = encode_record(record);
                cells.extend(extra.iter().cloned());
                Some(cells)
            }
            Slot::Opaque(cells) => Some(cells.clone()),
            Slot::Vacant => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::register::RiskLayout;
    use crate::entities::relationship::{Edge, Relationship};
    use crate::entities::risk::{Risk, RiskCategory};
    use crate::entities::Control;

    fn sample_register() -> Register {
        let mut reg = Register::new_document(RiskLayout::Keyed);
        for name in ["Alpha", "Bravo", "Charlie"] {
            reg.risks.insert(Risk::new(name, RiskCategory::Accuracy).unwrap()).unwrap();
        }
        reg.controls
            .insert(Control::new("ACC-01".parse().unwrap(), "Review", "Accuracy & Judgment"))
            .unwrap();
        reg.relationships
            .insert(Relationship::new(Edge::control(
                "ACC-01".parse().unwrap(),
                "RISK-BRAVO".parse().unwrap(),
            )))
            .unwrap();
        reg
    }

    #[test]
    fn test_new_document_round_trip() {
        let bytes = encode(&[], &sample_register()).unwrap();
        let reg = decode(&bytes).unwrap();

        assert_eq!(reg.risk_layout, RiskLayout::Keyed);
        assert_eq!(reg.risks.len(), 3);
        assert_eq!(reg.controls.len(), 1);
        assert_eq!(reg.relationships.len(), 1);
        assert!(reg.use_cases.is_empty());
        assert!(!reg.is_dirty());

        let bravo = reg.risks.get(&"RISK-BRAVO".parse().unwrap()).unwrap();
        assert_eq!(bravo.initial_scoring.risk_level, 9);
        assert_eq!(bravo.risk_category, RiskCategory::Accuracy);
    }

    #[test]
    fn test_delete_shifts_rows_up() {
        let bytes = encode(&[], &sample_register()).unwrap();
        let mut reg = decode(&bytes).unwrap();
        reg.risks.remove(&"RISK-ALPHA".parse().unwrap()).unwrap();

        let bytes = encode(&bytes, &reg).unwrap();
        let reg = decode(&bytes).unwrap();
        let names: Vec<&str> = reg.risks.iter().map(|r| r.risk.as_str()).collect();
        assert_eq!(names, vec!["Bravo", "Charlie"]);

        let book = Workbook::from_bytes(&bytes).unwrap();
        let grid = book.grid("Risk Map").unwrap();
        assert_eq!(grid.data().len(), 2);
    }

    #[test]
    fn test_clean_tables_are_not_rewritten() {
        let bytes = encode(&[], &sample_register()).unwrap();
        let mut reg = decode(&bytes).unwrap();
        reg.controls.remove(&"ACC-01".parse().unwrap());
        // risks untouched: the sheet must keep its rows even if the in-memory table is cleared
        reg.risks = Table::new();

        let bytes = encode(&bytes, &reg).unwrap();
        let reg = decode(&bytes).unwrap();
        assert_eq!(reg.risks.len(), 3);
        assert!(reg.controls.is_empty());
    }

    fn legacy_row(category: &str, name: &str, likelihood: f64, notes: &str) -> Vec<Cell> {
        let mut row = vec![Cell::text(category), Cell::text(name), Cell::Empty];
        row.extend([Cell::Number(likelihood), Cell::Number(likelihood), Cell::Empty, Cell::Empty]);
        row.extend([Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::text(notes)]);
        row
    }

    #[test]
    fn test_untouched_rows_survive_a_delete_verbatim() {
        let mut book = Workbook::new();
        book.write_table(
            SheetKind::Risks,
            RiskLayout::Legacy.header(),
            &[
                legacy_row("Accuracy", "Alpha", 3.0, ""),
                legacy_row("", "Bravo", 2.0, "1e3"),
                legacy_row("Frontier Weirdness", "Delta", 1.0, ""),
                legacy_row("Accuracy", "Charlie", 1.0, ""),
            ],
        )
        .unwrap();
        let bytes = book.to_bytes().unwrap();
        let before = Workbook::from_bytes(&bytes).unwrap().grid("Risk Map").unwrap();

        let mut reg = decode(&bytes).unwrap();
        assert_eq!(reg.risk_layout, RiskLayout::Legacy);
        let bravo = reg.risks.get(&"RISK-BRAVO".parse().unwrap()).unwrap();
        assert_eq!(bravo.risk_category, RiskCategory::Accuracy);
        assert_eq!(bravo.notes, "1e3");
        assert_eq!(bravo.initial_scoring.risk_level, 4);

        reg.risks.remove(&"RISK-CHARLIE".parse().unwrap()).unwrap();
        let bytes = encode(&bytes, &reg).unwrap();
        let after = Workbook::from_bytes(&bytes).unwrap().grid("Risk Map").unwrap();

        assert_eq!(after.data().len(), 3);
        assert_eq!(after.data()[..3], before.data()[..3]);
        assert_eq!(after.data()[1][11], Cell::Text("1e3".to_string()));
        assert!(after.data()[1][0].is_empty());
        assert!(after.data()[1][5].is_empty());
    }

    #[test]
    fn test_updated_row_is_encoded_afresh() {
        let bytes = encode(&[], &sample_register()).unwrap();
        let mut reg = decode(&bytes).unwrap();
        reg.risks
            .update(&"RISK-BRAVO".parse().unwrap(), |r| r.notes = "revised".to_string())
            .unwrap();

        let bytes = encode(&bytes, &reg).unwrap();
        let reg = decode(&bytes).unwrap();
        let bravo = reg.risks.get(&"RISK-BRAVO".parse().unwrap()).unwrap();
        assert_eq!(bravo.notes, "revised");
        assert_eq!(reg.risks.len(), 3);
    }

    #[test]
    fn test_missing_optional_sheets_decode_empty() {
        let mut reg = Register::default();
        reg.risks.insert(Risk::new("Solo", RiskCategory::Other).unwrap()).unwrap();
        let bytes = encode(&[], &reg).unwrap();

        let book = Workbook::from_bytes(&bytes).unwrap();
        assert_eq!(book.sheet_names(), vec!["Risk Map".to_string()]);

        let reg = decode(&bytes).unwrap();
        assert_eq!(reg.risks.len(), 1);
        assert!(reg.controls.is_empty());
        assert!(reg.relationships.is_empty());
    }

    #[test]
    fn test_garbage_blob_is_parse_error() {
        assert!(matches!(decode(b"not a spreadsheet"), Err(CodecError::Read(_))));
    }
}
