//! Risk sheet layout (17-column keyed and 16-column legacy)

use super::sheet::{cell, join_list, split_list, text, Cell, SheetGrid};
use crate::core::identity::RiskId;
use crate::core::register::{RiskLayout, Table};
use crate::entities::risk::{level_category, Risk, RiskCategory, Scoring};

/// Header of the keyed layout
pub const HEADER: [&str; 17] = [
    "ID",
    "Risk Category",
    "Risk",
    "Risk Description",
    "Initial Likelihood",
    "Initial Impact",
    "Initial Risk Level",
    "Initial Risk Level Category",
    "Example Mitigations",
    "Agreed Mitigation",
    "Proposed Oversight Ownership",
    "Proposed Support",
    "Notes",
    "Residual Likelihood",
    "Residual Impact",
    "Residual Risk Level",
    "Residual Risk Level Category",
];

/// Names that mark a repeated header or section title instead of a risk
const HEADER_LIKE: [&str; 7] = [
    "Risk",
    "Risk Name",
    "Name",
    "Category",
    "Description",
    "Risk Category",
    "Risk Description",
];

// Column offsets relative to the category column
const CATEGORY: usize = 0;
const NAME: usize = 1;
const DESCRIPTION: usize = 2;
const INITIAL: usize = 3;
const EXAMPLE_MITIGATIONS: usize = 7;
const AGREED_MITIGATION: usize = 8;
const OVERSIGHT: usize = 9;
const SUPPORT: usize = 10;
const NOTES: usize = 11;
const RESIDUAL: usize = 12;
const WIDTH: usize = 16;

impl RiskLayout {
    /// Column where the category sits
    fn offset(self) -> usize {
        match self {
            RiskLayout::Keyed => 1,
            RiskLayout::Legacy => 0,
        }
    }

    fn width(self) -> usize {
        self.offset() + WIDTH
    }

    pub fn header(self) -> &'static [&'static str] {
        &HEADER[1 - self.offset()..]
    }
}

/// Choose the layout from the first header cell
pub fn detect_layout(grid: &SheetGrid) -> RiskLayout {
    let first = text(grid.header(), 0).to_lowercase();
    if first == "id" || first.contains("risk id") {
        RiskLayout::Keyed
    } else if grid.rows.is_empty() {
        RiskLayout::Keyed
    } else {
        RiskLayout::Legacy
    }
}

fn is_header_like(name: &str) -> bool {
    HEADER_LIKE.contains(&name)
}

fn read_scoring(row: &[Cell], start: usize) -> Scoring {
    let score = |col: usize| {
        cell(row, col)
            .as_number()
            .map(|n| n.round().clamp(0.0, 255.0) as u8)
            .unwrap_or(0)
    };
    let likelihood = score(start);
    let impact = score(start + 1);

    let stored_level = cell(row, start + 2)
        .as_number()
        .map(|n| n.round().clamp(0.0, f64::from(u16::MAX)) as u16);
    let risk_level = if likelihood > 0 && impact > 0 {
        u16::from(likelihood) * u16::from(impact)
    } else {
        stored_level.unwrap_or(0)
    };

    let stored_category = text(row, start + 3);
    let risk_level_category = if stored_category.is_empty() {
        level_category(risk_level).to_string()
    } else {
        stored_category
    };

    Scoring {
        likelihood,
        impact,
        risk_level,
        risk_level_category,
    }
}

fn write_scoring(cells: &mut Vec<Cell>, scoring: &Scoring) {
    cells.push(Cell::number(scoring.likelihood));
    cells.push(Cell::number(scoring.impact));
    cells.push(Cell::number(scoring.risk_level));
    cells.push(Cell::text(scoring.risk_level_category.clone()));
}

/// Parse the risk sheet into a table
pub fn decode(grid: &SheetGrid, layout: RiskLayout) -> Table<Risk> {
    let mut table = Table::new();
    let off = layout.offset();
    let mut last_category: Option<RiskCategory> = None;
    let mut skipped = 0usize;

    for row in grid.data() {
        let name = text(row, off + NAME);
        if name.is_empty() || is_header_like(&name) {
            table.push_opaque(row.clone());
            skipped += 1;
            continue;
        }

        let risk_category = match RiskCategory::match_label(&text(row, off + CATEGORY)) {
            Some(category) => {
                last_category = Some(category);
                category
            }
            None => last_category.unwrap_or_default(),
        };

        let stored_id = match layout {
            RiskLayout::Keyed => text(row, 0).parse::<RiskId>().ok(),
            RiskLayout::Legacy => None,
        };
        let id = match stored_id.map(Ok).unwrap_or_else(|| RiskId::from_name(&name)) {
            Ok(id) if !table.contains(&id) => id,
            _ => {
                table.push_opaque(row.clone());
                skipped += 1;
                continue;
            }
        };

        let mut risk = Risk {
            id,
            risk_category,
            risk: name,
            risk_description: text(row, off + DESCRIPTION),
            initial_scoring: read_scoring(row, off + INITIAL),
            example_mitigations: text(row, off + EXAMPLE_MITIGATIONS),
            agreed_mitigation: text(row, off + AGREED_MITIGATION),
            proposed_oversight_ownership: split_list(&text(row, off + OVERSIGHT)),
            proposed_support: split_list(&text(row, off + SUPPORT)),
            notes: text(row, off + NOTES),
            residual_scoring: read_scoring(row, off + RESIDUAL),
            risk_reduction: 0,
            risk_reduction_percentage: 0,
            mitigation_effectiveness: Default::default(),
            related_control_ids: Vec::new(),
            related_use_case_ids: Vec::new(),
        };
        risk.recompute_reduction();

        let extra = row.get(layout.width()..).map(<[Cell]>::to_vec).unwrap_or_default();
        table.push_record(risk, extra, row.clone());
    }

    tracing::debug!(
        sheet = %grid.name,
        layout = ?layout,
        parsed = table.len(),
        skipped,
        "decoded risk sheet"
    );
    table
}

/// Managed cells of one risk row
pub fn encode(risk: &Risk, layout: RiskLayout) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(layout.width());
    if layout == RiskLayout::Keyed {
        cells.push(Cell::text(risk.id.to_string()));
    }
    cells.push(Cell::text(risk.risk_category.as_str()));
    cells.push(Cell::text(risk.risk.clone()));
    cells.push(Cell::text(risk.risk_description.clone()));
    write_scoring(&mut cells, &risk.initial_scoring);
    cells.push(Cell::text(risk.example_mitigations.clone()));
    cells.push(Cell::text(risk.agreed_mitigation.clone()));
    cells.push(Cell::text(join_list(&risk.proposed_oversight_ownership)));
    cells.push(Cell::text(join_list(&risk.proposed_support)));
    cells.push(Cell::text(risk.notes.clone()));
    write_scoring(&mut cells, &risk.residual_scoring);
    cells
}
