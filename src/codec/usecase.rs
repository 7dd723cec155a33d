//! Use case sheet layout

use super::sheet::{cell, join_list, split_list, text, Cell, SheetGrid};
use crate::core::identity::UseCaseId;
use crate::core::register::Table;
use crate::entities::usecase::{Execution, Impact, Objective, Rating, UseCase};

pub const HEADER: [&str; 26] = [
    "ID",
    "Title",
    "Description",
    "Business Area",
    "AI Categories",
    "Current State",
    "Future State",
    "Solution",
    "Benefits",
    "Impact Points",
    "Cost Saving",
    "Effort Months",
    "Functions Impacted",
    "Data Requirements",
    "AI Complexity",
    "Feasibility",
    "Value",
    "Risk",
    "Status",
    "Implementation Start",
    "Implementation End",
    "Owner",
    "Stakeholders",
    "Notes",
    "Created Date",
    "Last Updated",
];

const WIDTH: usize = HEADER.len();

fn rating(row: &[Cell], col: usize) -> Option<Rating> {
    text(row, col).parse().ok()
}

fn rating_cell(value: Option<Rating>) -> Cell {
    value.map(|r| Cell::text(r.as_str())).unwrap_or(Cell::Empty)
}

fn amount_cell(value: Option<f64>) -> Cell {
    value.map(Cell::Number).unwrap_or(Cell::Empty)
}

pub fn decode(grid: &SheetGrid) -> Table<UseCase> {
    let mut table = Table::new();
    let mut skipped = 0usize;

    for row in grid.data() {
        let id = match text(row, 0).parse::<UseCaseId>() {
            Ok(id) if !table.contains(&id) => id,
            _ => {
                table.push_opaque(row.clone());
                skipped += 1;
                continue;
            }
        };
        let title = text(row, 1);
        if title.is_empty() {
            table.push_opaque(row.clone());
            skipped += 1;
            continue;
        }

        let use_case = UseCase {
            id,
            title,
            description: text(row, 2),
            business_area: text(row, 3),
            ai_categories: split_list(&text(row, 4)),
            objective: Objective {
                current_state: text(row, 5),
                future_state: text(row, 6),
                solution: text(row, 7),
                benefits: text(row, 8),
            },
            impact: Impact {
                impact_points: split_list(&text(row, 9)),
                cost_saving: cell(row, 10).as_number(),
                effort_months: cell(row, 11).as_number(),
            },
            execution: Execution {
                functions_impacted: split_list(&text(row, 12)),
                data_requirements: text(row, 13),
                ai_complexity: rating(row, 14),
                feasibility: rating(row, 15),
                value: rating(row, 16),
                risk: rating(row, 17),
            },
            status: text(row, 18),
            implementation_start: text(row, 19),
            implementation_end: text(row, 20),
            owner: text(row, 21),
            stakeholders: split_list(&text(row, 22)),
            notes: text(row, 23),
            created_date: text(row, 24),
            last_updated: text(row, 25),
            related_risk_ids: Vec::new(),
        };

        let extra = row.get(WIDTH..).map(<[Cell]>::to_vec).unwrap_or_default();
        table.push_record(use_case, extra, row.clone());
    }

    tracing::debug!(sheet = %grid.name, parsed = table.len(), skipped, "decoded use case sheet");
    table
}

pub fn encode(uc: &UseCase) -> Vec<Cell> {
    vec![
        Cell::text(uc.id.to_string()),
        Cell::text(uc.title.clone()),
        Cell::text(uc.description.clone()),
        Cell::text(uc.business_area.clone()),
        Cell::text(join_list(&uc.ai_categories)),
        Cell::text(uc.objective.current_state.clone()),
        Cell::text(uc.objective.future_state.clone()),
        Cell::text(uc.objective.solution.clone()),
        Cell::text(uc.objective.benefits.clone()),
        Cell::text(join_list(&uc.impact.impact_points)),
        amount_cell(uc.impact.cost_saving),
        amount_cell(uc.impact.effort_months),
        Cell::text(join_list(&uc.execution.functions_impacted)),
        Cell::text(uc.execution.data_requirements.clone()),
        rating_cell(uc.execution.ai_complexity),
        rating_cell(uc.execution.feasibility),
        rating_cell(uc.execution.value),
        rating_cell(uc.execution.risk),
        Cell::text(uc.status.clone()),
        Cell::text(uc.implementation_start.clone()),
        Cell::text(uc.implementation_end.clone()),
        Cell::text(uc.owner.clone()),
        Cell::text(join_list(&uc.stakeholders)),
        Cell::text(uc.notes.clone()),
        Cell::text(uc.created_date.clone()),
        Cell::text(uc.last_updated.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nested_groups() {
        let mut data = vec![Cell::Empty; WIDTH];
        data[0] = Cell::text("UC-001");
        data[1] = Cell::text("Literature screening");
        data[4] = Cell::text("NLP, Search");
        data[5] = Cell::text("Manual reading");
        data[10] = Cell::Number(120000.0);
        data[11] = Cell::Number(6.0);
        data[14] = Cell::text("High");
        data[17] = Cell::text("medium");
        data[18] = Cell::text("Pilot");
        data[22] = Cell::text("Medical, Legal");

        let grid = SheetGrid {
            name: "Use Cases".to_string(),
            rows: vec![HEADER.iter().map(|h| Cell::text(*h)).collect(), data, vec![Cell::text("UC-2")]],
        };
        let table = decode(&grid);
        assert_eq!(table.len(), 1);
        assert_eq!(table.opaque_rows(), 1);

        let uc = table.iter().next().unwrap();
        assert_eq!(uc.ai_categories, vec!["NLP", "Search"]);
        assert_eq!(uc.objective.current_state, "Manual reading");
        assert_eq!(uc.impact.cost_saving, Some(120000.0));
        assert_eq!(uc.execution.ai_complexity, Some(Rating::High));
        assert_eq!(uc.execution.risk, Some(Rating::Medium));
        assert_eq!(uc.execution.value, None);
        assert_eq!(uc.stakeholders, vec!["Medical", "Legal"]);
    }

    #[test]
    fn test_encode_width_and_positions() {
        let mut uc = UseCase::new(UseCaseId::new(12), "Batch record review");
        uc.impact.effort_months = Some(3.5);
        let cells = encode(&uc);
        assert_eq!(cells.len(), WIDTH);
        assert_eq!(cells[0], Cell::Text("UC-012".to_string()));
        assert_eq!(cells[11], Cell::Number(3.5));
        assert_eq!(cells[18], Cell::Text("Concept".to_string()));
    }
}
