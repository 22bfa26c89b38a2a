use super::{
    ContentKind, ConversionResult, Converter, ErrorType, OutputTarget, extension, file_name,
    has_extension,
};
use calamine::{Data, Range, Reader, open_workbook_auto};
use eyre::{Context, Result, eyre};
use std::path::Path;

const DELIMITED: &[&str] = &["csv", "tsv"];
const WORKBOOKS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Delimited files and workbooks rendered as markdown tables.
pub struct SpreadsheetConverter;

impl SpreadsheetConverter {
    fn read_delimited(path: &Path) -> Result<Vec<Vec<String>>> {
        let delimiter = match extension(path).as_deref() {
            Some("tsv") => b'\t',
            _ => b',',
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .wrap_err_with(|| format!("Failed to open {}", path.display()))?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.byte_records() {
            let record = record.wrap_err_with(|| format!("Malformed row in {}", path.display()))?;
            rows.push(
                record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect(),
            );
        }
        Ok(rows)
    }

    /// Non-empty sheets of a workbook, in workbook order.
    fn read_workbook(path: &Path) -> Result<Vec<(String, Vec<Vec<String>>)>> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| eyre!("Failed to open workbook {}: {}", path.display(), e))?;
        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| eyre!("Failed to read sheet {} of {}: {}", name, path.display(), e))?;
            let rows = sheet_rows(&range);
            if !rows.is_empty() {
                sheets.push((name, rows));
            }
        }
        Ok(sheets)
    }
}

impl Converter for SpreadsheetConverter {
    fn name(&self) -> &str {
        "spreadsheet"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, DELIMITED) || has_extension(path, WORKBOOKS)
    }

    fn convert(&self, path: &Path, _: &OutputTarget) -> Result<ConversionResult> {
        let body = if has_extension(path, WORKBOOKS) {
            let sheets = Self::read_workbook(path)?;
            match sheets.as_slice() {
                [] => None,
                [(_, rows)] => Some(markdown_table(rows)),
                _ => Some(
                    sheets
                        .iter()
                        .map(|(name, rows)| format!("### {}\n\n{}", name, markdown_table(rows)))
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                ),
            }
        } else {
            let rows = Self::read_delimited(path)?;
            (!rows.is_empty()).then(|| markdown_table(&rows))
        };

        let Some(body) = body else {
            return Ok(ConversionResult::failed(
                ContentKind::Spreadsheet,
                ErrorType::EmptyContent,
                format!("Spreadsheet {} has no rows", file_name(path)),
            ));
        };
        let content = format!("## Spreadsheet Content: {}\n\n{}\n", file_name(path), body);
        Ok(ConversionResult::converted(ContentKind::Spreadsheet, content))
    }
}

/// Cell text of every row that has any content.
fn sheet_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect()
}

/// First row is the header; short rows are padded to the widest row.
fn markdown_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let render = |row: &Vec<String>| {
        let cells: Vec<String> = (0..width)
            .map(|i| row.get(i).map(|c| escape_cell(c)).unwrap_or_default())
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(rows[1..].iter().map(render));
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}
