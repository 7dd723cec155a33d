//! Control sheet layout

use super::sheet::{text, Cell, SheetGrid};
use crate::core::identity::ControlId;
use crate::core::register::Table;
use crate::entities::control::{Compliance, Control};

pub const HEADER: [&str; 11] = [
    "Mitigation ID",
    "Mitigation Description",
    "21 CFR Part 11 / Annex 11 Clause",
    "HIPAA Safeguard",
    "GDPR Article",
    "EU AI Act Article",
    "NIST 800-53 Control Family",
    "SOC 2 TSC",
    "Category",
    "Implementation Status",
    "Effectiveness",
];

const WIDTH: usize = HEADER.len();

pub fn decode(grid: &SheetGrid) -> Table<Control> {
    let mut table = Table::new();
    let mut skipped = 0usize;

    for row in grid.data() {
        let id = match text(row, 0).parse::<ControlId>() {
            Ok(id) if !table.contains(&id) => id,
            _ => {
                table.push_opaque(row.clone());
                skipped += 1;
                continue;
            }
        };
        let description = text(row, 1);
        if description.is_empty() {
            table.push_opaque(row.clone());
            skipped += 1;
            continue;
        }

        let control = Control {
            mitigation_id: id,
            mitigation_description: description,
            category: text(row, 8),
            compliance: Compliance {
                cfr_part11_annex11: text(row, 2),
                hipaa_safeguard: text(row, 3),
                gdpr_article: text(row, 4),
                eu_ai_act_article: text(row, 5),
                nist80053: text(row, 6),
                soc2_tsc: text(row, 7),
            },
            implementation_status: text(row, 9).parse().unwrap_or_default(),
            effectiveness: text(row, 10).parse().unwrap_or_default(),
            related_risk_ids: Vec::new(),
        };

        let extra = row.get(WIDTH..).map(<[Cell]>::to_vec).unwrap_or_default();
        table.push_record(control, extra, row.clone());
    }

    tracing::debug!(sheet = %grid.name, parsed = table.len(), skipped, "decoded control sheet");
    table
}

pub fn encode(control: &Control) -> Vec<Cell> {
    let c = &control.compliance;
    vec![
        Cell::text(control.mitigation_id.to_string()),
        Cell::text(control.mitigation_description.clone()),
        Cell::text(c.cfr_part11_annex11.clone()),
        Cell::text(c.hipaa_safeguard.clone()),
        Cell::text(c.gdpr_article.clone()),
        Cell::text(c.eu_ai_act_article.clone()),
        Cell::text(c.nist80053.clone()),
        Cell::text(c.soc2_tsc.clone()),
        Cell::text(control.category.clone()),
        Cell::text(control.implementation_status.as_str()),
        Cell::text(control.effectiveness.as_str()),
    ]
}
