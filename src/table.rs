//! In-memory CSV table: loading, writing and a `head()`-style preview.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{NormalizeError, Result};
use crate::persist;

/// Cell contents read as a missing value in numeric columns, as pandas does.
pub const NA_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    fn parse_number(raw: &str, column: &str, row: usize) -> Result<Cell> {
        let trimmed = raw.trim();
        if NA_TOKENS.contains(&trimmed) {
            return Ok(Cell::Missing);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Ok(Cell::Missing),
            Ok(v) => Ok(Cell::Number(v)),
            Err(_) => Err(NormalizeError::InvalidNumber {
                column: column.to_owned(),
                row,
                value: raw.to_owned(),
            }),
        }
    }

    /// Numeric view of the cell; text cells are parsed on demand.
    pub fn number(&self, column: &str, row: usize) -> Result<Option<f64>> {
        match self {
            Cell::Number(v) => Ok(Some(*v)),
            Cell::Missing => Ok(None),
            Cell::Text(s) => match Cell::parse_number(s, column, row)? {
                Cell::Number(v) => Ok(Some(v)),
                _ => Ok(None),
            },
        }
    }

    fn render(&self) -> String {
        match self {
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }
}

/// Header plus rows, in file order. Rows always have one cell per header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table, rejecting rows whose width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(NormalizeError::RaggedRow {
                row: i + 1,
                expected: headers.len(),
                found: row.len(),
            });
        }
        Ok(Table { headers, rows })
    }

    /// Reads a comma-separated file with a header row.
    ///
    /// Columns named in `numeric_columns` are parsed as `f64` (empty cells,
    /// [`NA_TOKENS`] and `NaN` become [`Cell::Missing`]); every other column
    /// is kept verbatim.
    pub fn read_csv(path: &Path, numeric_columns: &[&str]) -> Result<Self> {
        let file = File::open(path).map_err(|e| NormalizeError::io(path, e))?;
        let table = Self::read_from(file, numeric_columns)?;
        log::info!(
            "Loaded {} rows x {} columns from {}",
            table.len(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn read_from<R: std::io::Read>(reader: R, numeric_columns: &[&str]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let numeric: Vec<bool> = headers
            .iter()
            .map(|h| numeric_columns.contains(&h.as_str()))
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .zip(headers.iter().zip(&numeric))
                .map(|(raw, (name, &is_numeric))| {
                    if is_numeric {
                        Cell::parse_number(raw, name, i + 1)
                    } else {
                        Ok(Cell::Text(raw.to_owned()))
                    }
                })
                .collect::<Result<Vec<Cell>>>()?;
            rows.push(row);
        }

        Ok(Table { headers, rows })
    }

    /// Writes the table atomically, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut staged = persist::stage(path)?;
        self.write_to(&mut staged).map_err(|e| e.at_path(path))?;
        persist::commit(staged, path)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let handle = Path::new("<csv writer>");
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(&self.headers)
            .map_err(|e| NormalizeError::from_csv(e, handle))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(Cell::render))
                .map_err(|e| NormalizeError::from_csv(e, handle))?;
        }
        writer.flush().map_err(|e| NormalizeError::io(handle, e))?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| NormalizeError::MissingColumn(name.to_owned()))
    }

    /// All values of a column as numbers, `None` for missing cells.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.require_column(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| row[idx].number(name, i + 1))
            .collect()
    }

    /// Applies `f` to every non-missing value of a column, in place.
    pub fn map_numeric<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(f64) -> f64,
    {
        let idx = self.require_column(name)?;
        // Parse the whole column first so a bad cell leaves the table untouched.
        let values = self.numeric_column(name)?;
        for (row, value) in self.rows.iter_mut().zip(values) {
            if let Some(v) = value {
                row[idx] = Cell::Number(f(v));
            }
        }
        Ok(())
    }

    /// Plain-text rendering of the first `n` rows with a row index column.
    pub fn preview(&self, n: usize) -> String {
        let shown = &self.rows[..n.min(self.rows.len())];

        let mut grid: Vec<Vec<String>> = Vec::with_capacity(shown.len() + 1);
        let mut header = vec![String::new()];
        header.extend(self.headers.iter().cloned());
        grid.push(header);
        for (i, row) in shown.iter().enumerate() {
            let mut line = vec![i.to_string()];
            line.extend(row.iter().map(|cell| match cell {
                Cell::Number(v) => format!("{v:.6}"),
                Cell::Text(s) => s.clone(),
                Cell::Missing => "NaN".to_owned(),
            }));
            grid.push(line);
        }

        let widths: Vec<usize> = (0..=self.headers.len())
            .map(|c| grid.iter().map(|line| line[c].chars().count()).max().unwrap_or(0))
            .collect();

        let mut out = String::new();
        for line in &grid {
            let rendered: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(s, &w)| format!("{s:>w$}"))
                .collect();
            out.push_str(rendered.join("  ").trim_end());
            out.push('\n');
        }
        out.push_str(&format!(
            "\n[{} rows x {} columns]",
            self.rows.len(),
            self.headers.len()
        ));
        out
    }
}
