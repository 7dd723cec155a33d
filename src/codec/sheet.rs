//! Workbook access: sheet lookup, row grids and whole-table rewrites

use std::fmt;
use std::io::Cursor;

use umya_spreadsheet::{Cell as XlsxCell, Spreadsheet, Worksheet};

use super::CodecError;

/// Value of one spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Classify a displayed cell value: blank, numeric or text
    pub fn from_value(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else if let Ok(num) = value.trim().parse::<f64>() {
            Cell::Number(num)
        } else {
            Cell::Text(value.to_string())
        }
    }

    /// Read a stored cell by its type; numeric-looking text stays text
    fn from_xlsx(cell: &XlsxCell) -> Self {
        match cell.get_value_number() {
            Some(num) => Cell::Number(num),
            None => Cell::text(cell.get_value().into_owned()),
        }
    }

    /// Text cell, blank when the string is empty
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// Numeric cell, blank for zero
    pub fn number(value: impl Into<f64>) -> Self {
        let value = value.into();
        if value == 0.0 {
            Cell::Empty
        } else {
            Cell::Number(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed text form of the cell
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Fetch a cell by zero-based column, blank past the end of the row
pub fn cell(row: &[Cell], col: usize) -> &Cell {
    row.get(col).unwrap_or(&Cell::Empty)
}

/// Zero-based column as trimmed text
pub fn text(row: &[Cell], col: usize) -> String {
    cell(row, col).as_text()
}

/// Split a comma-joined list, trimming and dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join a list the way list columns are stored
pub fn join_list(values: &[String]) -> String {
    values.join(", ")
}

/// The four register tables, as located by sheet name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetKind {
    Risks,
    Controls,
    Relationships,
    UseCases,
}

impl SheetKind {
    /// Name given to the sheet when this crate creates it
    pub fn default_name(&self) -> &'static str {
        match self {
            SheetKind::Risks => "Risk Map",
            SheetKind::Controls => "Controls",
            SheetKind::Relationships => "Relationships",
            SheetKind::UseCases => "Use Cases",
        }
    }

    /// Case-insensitive fuzzy match of a sheet name
    pub fn matches(&self, sheet_name: &str) -> bool {
        let name = sheet_name.to_lowercase();
        match self {
            SheetKind::Risks => name.contains("risk") && name.contains("map"),
            SheetKind::Controls => name.contains("control") && !name.contains("relationship"),
            SheetKind::Relationships => name.contains("relationship"),
            SheetKind::UseCases => ["use case", "usecase", "use_case", "use-case"]
                .iter()
                .any(|pat| name.contains(pat)),
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetKind::Risks => write!(f, "risks"),
            SheetKind::Controls => write!(f, "controls"),
            SheetKind::Relationships => write!(f, "relationships"),
            SheetKind::UseCases => write!(f, "use cases"),
        }
    }
}

/// All rows of one sheet; `rows[0]` is the header
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetGrid {
    pub fn header(&self) -> &[Cell] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Data rows, header skipped
    pub fn data(&self) -> &[Vec<Cell>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// An xlsx document held in memory
pub struct Workbook {
    book: Spreadsheet,
    /// Sheet created by `new_file` that has not been claimed yet
    placeholder: Option<String>,
}

impl Workbook {
    /// Empty document
    pub fn new() -> Self {
        let book = umya_spreadsheet::new_file();
        let placeholder = book
            .get_sheet_collection()
            .first()
            .map(|ws| ws.get_name().to_string());
        Self { book, placeholder }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
            .map_err(|e| CodecError::Read(e.to_string()))?;
        Ok(Self {
            book,
            placeholder: None,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&self.book, &mut buf)
            .map_err(|e| CodecError::Write(e.to_string()))?;
        Ok(buf.into_inner())
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.book
            .get_sheet_collection()
            .iter()
            .map(|ws| ws.get_name().to_string())
            .collect()
    }

    /// Locate the sheet holding a table
    ///
    /// The risk table falls back to the first sheet no other table claims.
    pub fn find_sheet(&self, kind: SheetKind) -> Result<String, CodecError> {
        let names = self.sheet_names();
        if let Some(name) = names.iter().find(|n| kind.matches(n)) {
            return Ok(name.clone());
        }

        if kind == SheetKind::Risks {
            let others = [SheetKind::Controls, SheetKind::Relationships, SheetKind::UseCases];
            if let Some(name) = names.iter().find(|n| {
                self.placeholder.as_deref() != Some(n.as_str())
                    && !others.iter().any(|k| k.matches(n))
            }) {
                return Ok(name.clone());
            }
        }

        Err(CodecError::SheetNotFound(kind))
    }

    /// Read every row of a sheet, trailing blank cells and rows trimmed
    pub fn grid(&self, name: &str) -> Result<SheetGrid, CodecError> {
        let ws = self
            .book
            .get_sheet_by_name(name)
            .ok_or_else(|| CodecError::Read(format!("sheet '{}' disappeared", name)))?;
        Ok(read_grid(ws))
    }

    /// Replace all data rows of the sheet for `kind`, creating it with `header` if missing
    ///
    /// Row 1 of an existing sheet is kept as-is.
    pub fn write_table(
        &mut self,
        kind: SheetKind,
        header: &[&str],
        rows: &[Vec<Cell>],
    ) -> Result<(), CodecError> {
        let name = match self.find_sheet(kind) {
            Ok(name) => name,
            Err(CodecError::SheetNotFound(_)) => self.create_sheet(kind, header)?,
            Err(e) => return Err(e),
        };

        let ws = self
            .book
            .get_sheet_by_name_mut(&name)
            .ok_or_else(|| CodecError::Write(format!("sheet '{}' disappeared", name)))?;

        let (_, max_row) = ws.get_highest_column_and_row();
        if max_row > 1 {
            ws.remove_row(&2, &(max_row - 1));
        }

        for (offset, row) in rows.iter().enumerate() {
            write_row(ws, offset as u32 + 2, row);
        }
        Ok(())
    }

    fn create_sheet(&mut self, kind: SheetKind, header: &[&str]) -> Result<String, CodecError> {
        let name = kind.default_name().to_string();
        let ws = match self.placeholder.take() {
            Some(placeholder) => {
                let ws = self
                    .book
                    .get_sheet_by_name_mut(&placeholder)
                    .ok_or_else(|| CodecError::Write("placeholder sheet missing".to_string()))?;
                ws.set_name(&name);
                ws
            }
            None => self
                .book
                .new_sheet(&name)
                .map_err(|e| CodecError::Write(format!("failed to create sheet '{}': {}", name, e)))?,
        };

        let header: Vec<Cell> = header.iter().map(|h| Cell::text(*h)).collect();
        write_row(ws, 1, &header);
        tracing::debug!(sheet = %name, "created sheet");
        Ok(name)
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

fn read_grid(ws: &Worksheet) -> SheetGrid {
    let (max_col, max_row) = ws.get_highest_column_and_row();
    let mut rows = Vec::with_capacity(max_row as usize);

    for row in 1..=max_row {
        let mut cells: Vec<Cell> = (1..=max_col)
            .map(|col| {
                ws.get_cell((col, row))
                    .map(Cell::from_xlsx)
                    .unwrap_or(Cell::Empty)
            })
            .collect();
        while cells.last().is_some_and(Cell::is_empty) {
            cells.pop();
        }
        rows.push(cells);
    }

    while rows.len() > 1 && rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }

    SheetGrid {
        name: ws.get_name().to_string(),
        rows,
    }
}

fn write_row(ws: &mut Worksheet, row: u32, cells: &[Cell]) {
    for (idx, value) in cells.iter().enumerate() {
        let col = idx as u32 + 1;
        match value {
            Cell::Empty => {}
            Cell::Text(s) => {
                ws.get_cell_mut((col, row)).set_value_string(s);
            }
            Cell::Number(n) => {
                ws.get_cell_mut((col, row)).set_value_number(*n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_from_value() {
        assert_eq!(Cell::from_value(""), Cell::Empty);
        assert_eq!(Cell::from_value("4"), Cell::Number(4.0));
        assert_eq!(Cell::from_value("ACC-01"), Cell::Text("ACC-01".to_string()));
    }

    #[test]
    fn test_cell_text_forms() {
        assert_eq!(Cell::Number(12.0).as_text(), "12");
        assert_eq!(Cell::Number(2.5).as_text(), "2.5");
        assert_eq!(Cell::Text("  x ".to_string()).as_text(), "x");
        assert_eq!(Cell::text(""), Cell::Empty);
        assert_eq!(Cell::number(0u8), Cell::Empty);
    }

    #[test]
    fn test_split_and_join_lists() {
        assert_eq!(split_list("Legal, , IT ,Risk"), vec!["Legal", "IT", "Risk"]);
        assert!(split_list("").is_empty());
        assert_eq!(join_list(&["a".to_string(), "b".to_string()]), "a, b");
    }

    #[test]
    fn test_sheet_kind_matching() {
        assert!(SheetKind::Risks.matches("AI Risk Map"));
        assert!(!SheetKind::Risks.matches("Risks"));
        assert!(SheetKind::Controls.matches("Controls"));
        assert!(!SheetKind::Controls.matches("Control Relationships"));
        assert!(SheetKind::Relationships.matches("Control Relationships"));
        assert!(SheetKind::UseCases.matches("AI Use Cases"));
        assert!(SheetKind::UseCases.matches("use_cases"));
    }

    #[test]
    fn test_write_table_creates_and_rewrites() {
        let mut book = Workbook::new();
        book.write_table(
            SheetKind::Controls,
            &["ID", "Description"],
            &[vec![Cell::text("ACC-01"), Cell::text("First")]],
        )
        .unwrap();
        assert_eq!(book.sheet_names(), vec!["Controls".to_string()]);

        book.write_table(SheetKind::Controls, &["ID", "Description"], &[]).unwrap();
        let bytes = book.to_bytes().unwrap();

        let reread = Workbook::from_bytes(&bytes).unwrap();
        let grid = reread.grid("Controls").unwrap();
        assert_eq!(grid.header()[0], Cell::Text("ID".to_string()));
        assert!(grid.data().is_empty());
    }

    #[test]
    fn test_grid_reads_stored_cell_types() {
        let mut book = Workbook::new();
        book.write_table(
            SheetKind::Controls,
            &["ID", "Notes", "Score"],
            &[vec![Cell::text("ACC-01"), Cell::text("1e3"), Cell::Number(4.0)]],
        )
        .unwrap();

        let reread = Workbook::from_bytes(&book.to_bytes().unwrap()).unwrap();
        let grid = reread.grid("Controls").unwrap();
        assert_eq!(
            grid.data()[0],
            vec![
                Cell::Text("ACC-01".to_string()),
                Cell::Text("1e3".to_string()),
                Cell::Number(4.0),
            ]
        );
    }

    #[test]
    fn test_missing_sheet_is_distinct() {
        let book = Workbook::new();
        assert!(matches!(
            book.find_sheet(SheetKind::UseCases),
            Err(CodecError::SheetNotFound(SheetKind::UseCases))
        ));
    }
}
