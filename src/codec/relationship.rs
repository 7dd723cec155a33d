//! Relationship sheet layout
//!
//! Use-case edges share the source column with control edges and are told
//! apart by their link type (or by a `UC-###` source id).

use super::sheet::{text, Cell, SheetGrid};
use crate::core::identity::{ControlId, RiskId, UseCaseId};
use crate::core::register::Table;
use crate::entities::relationship::{Edge, Relationship, USE_CASE_LINK_TYPE};

pub const HEADER: [&str; 7] = [
    "Control ID",
    "Risk ID",
    "Link Type",
    "Effectiveness",
    "Notes",
    "Created Date",
    "Last Updated",
];

const WIDTH: usize = HEADER.len();

fn parse_edge(source: &str, risk: &str, link_type: &str) -> Option<Edge> {
    let risk: RiskId = risk.parse().ok()?;
    let use_case_source =
        link_type.eq_ignore_ascii_case(USE_CASE_LINK_TYPE) || source.parse::<UseCaseId>().is_ok();

    if use_case_source {
        let use_case: UseCaseId = source.parse().ok()?;
        Some(Edge::use_case(use_case, risk))
    } else {
        let control: ControlId = source.parse().ok()?;
        Some(Edge::control(control, risk))
    }
}

/// The edge a relationship row names, if it names one
pub fn row_edge(row: &[Cell]) -> Option<Edge> {
    parse_edge(&text(row, 0), &text(row, 1), &text(row, 2))
}

pub fn decode(grid: &SheetGrid) -> Table<Relationship> {
    let mut table = Table::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for row in grid.data() {
        let link_type = text(row, 2);
        let Some(edge) = parse_edge(&text(row, 0), &text(row, 1), &link_type) else {
            table.push_opaque(row.clone());
            skipped += 1;
            continue;
        };

        // Repeats of an edge are kept verbatim behind the first one
        if table.contains(&edge) {
            table.push_opaque(row.clone());
            duplicates += 1;
            continue;
        }

        let rel = Relationship {
            edge,
            link_type,
            effectiveness: text(row, 3),
            notes: text(row, 4),
            created_at: text(row, 5),
            last_updated: text(row, 6),
        };
        let extra = row.get(WIDTH..).map(<[Cell]>::to_vec).unwrap_or_default();
        table.push_record(rel, extra, row.clone());
    }

    tracing::debug!(
        sheet = %grid.name,
        parsed = table.len(),
        skipped,
        duplicates,
        "decoded relationship sheet"
    );
    table
}

pub fn encode(rel: &Relationship) -> Vec<Cell> {
    vec![
        Cell::text(rel.edge.source()),
        Cell::text(rel.edge.risk().to_string()),
        Cell::text(rel.link_type.clone()),
        Cell::text(rel.effectiveness.clone()),
        Cell::text(rel.notes.clone()),
        Cell::text(rel.created_at.clone()),
        Cell::text(rel.last_updated.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from_value(v)).collect()
    }

    #[test]
    fn test_edges_classified_by_link_type_and_source() {
        let grid = SheetGrid {
            name: "Relationships".to_string(),
            rows: vec![
                row(&HEADER),
                row(&["ACC-01", "RISK-FOO", "mitigates", "High"]),
                row(&["UC-002", "RISK-FOO", "UseCase-Risk"]),
                row(&["UC-003", "RISK-BAR", ""]),
                row(&["ACC-01", "RISK-FOO", "mitigates"]),
                row(&["NOT-AN-ID", "RISK-FOO", "mitigates"]),
                row(&["SEC-01", "", "mitigates"]),
            ],
        };

        let table = decode(&grid);
        let edges: Vec<String> = table.ids().map(|e| e.to_string()).collect();
        assert_eq!(
            edges,
            vec!["ACC-01 -> RISK-FOO", "UC-002 -> RISK-FOO", "UC-003 -> RISK-BAR"]
        );
        assert!(matches!(table.iter().nth(1).unwrap().edge, Edge::UseCaseRisk { .. }));
        assert_eq!(table.opaque_rows(), 3);
    }

    #[test]
    fn test_repeated_edge_row_kept_verbatim() {
        let repeat = row(&["ACC-01", "RISK-FOO", "mitigates", "", "second copy"]);
        let grid = SheetGrid {
            name: "Relationships".to_string(),
            rows: vec![
                row(&HEADER),
                row(&["ACC-01", "RISK-FOO", "mitigates", "High"]),
                repeat.clone(),
            ],
        };

        let table = decode(&grid);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&row_edge(&repeat).unwrap()).unwrap().effectiveness, "High");
        assert!(matches!(
            &table.slots()[1],
            crate::core::register::Slot::Opaque(cells) if *cells == repeat
        ));
    }

    #[test]
    fn test_encode_reuses_source_column() {
        let rel = Relationship::new(Edge::use_case(UseCaseId::new(9), "RISK-X".parse().unwrap()));
        let cells = encode(&rel);
        assert_eq!(cells[0], Cell::Text("UC-009".to_string()));
        assert_eq!(cells[2], Cell::Text(USE_CASE_LINK_TYPE.to_string()));
        assert_eq!(cells.len(), WIDTH);
    }
}
