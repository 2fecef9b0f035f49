//! Spreadsheet row decoders.
//!
//! The cell layout of uploaded files is an external, versioned contract:
//! a header row naming the columns, one book per following row. The
//! decoders only turn bytes into [`SheetRow`]s; validation and the
//! atomic apply live in the pipeline, so a new file format only needs a
//! new [`RowDecoder`].

use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// One decoded data row. The title may still be blank here, the
/// pipeline decides whether that is skippable or fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub location: Option<String>,
    pub price: Option<i64>,
}

pub trait RowDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<Vec<SheetRow>, DecodeError>;
}

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Picks a decoder by sniffing the file content, then decodes.
/// Anything that is not an xlsx archive is treated as CSV text.
pub fn decode_sheet(bytes: &[u8]) -> Result<Vec<SheetRow>, DecodeError> {
    let decoder: &dyn RowDecoder = match infer::get(bytes) {
        Some(kind) if kind.mime_type() == XLSX_MIME => &XlsxDecoder,
        _ => &CsvDecoder,
    };
    tracing::debug!("Decoding upload with the {} decoder", decoder.name());
    decoder.decode(bytes)
}

/// Header-name aliases for each column. English and the original Korean
/// spreadsheet headers are both part of the contract.
const TITLE_HEADERS: &[&str] = &["title", "book_title", "도서명"];
const AUTHOR_HEADERS: &[&str] = &["author", "저자"];
const PUBLISHER_HEADERS: &[&str] = &["publisher", "출판사"];
const LOCATION_HEADERS: &[&str] = &["location", "위치"];
const PRICE_HEADERS: &[&str] = &["price", "가격"];

struct ColumnMap {
    title: usize,
    author: Option<usize>,
    publisher: Option<usize>,
    location: Option<usize>,
    price: Option<usize>,
}

impl ColumnMap {
    fn from_header<S: AsRef<str>>(header: &[S]) -> Result<Self, DecodeError> {
        let find = |aliases: &[&str]| {
            header.iter().position(|cell| {
                let cell = cell.as_ref().trim().to_lowercase();
                aliases.contains(&cell.as_str())
            })
        };
        let title = find(TITLE_HEADERS).ok_or_else(|| {
            DecodeError("No title column found in the header row".to_owned())
        })?;
        Ok(ColumnMap {
            title,
            author: find(AUTHOR_HEADERS),
            publisher: find(PUBLISHER_HEADERS),
            location: find(LOCATION_HEADERS),
            price: find(PRICE_HEADERS),
        })
    }

    fn row_from_cells<S: AsRef<str>>(&self, cells: &[S]) -> SheetRow {
        let text = |index: Option<usize>| {
            index
                .and_then(|i| cells.get(i))
                .map(|c| c.as_ref().trim().to_owned())
                .filter(|s| !s.is_empty())
        };
        SheetRow {
            title: cells
                .get(self.title)
                .map(|c| c.as_ref().trim().to_owned())
                .unwrap_or_default(),
            author: text(self.author),
            publisher: text(self.publisher),
            location: text(self.location),
            price: text(self.price).and_then(|s| parse_price(&s)),
        }
    }
}

/// Extracts the digits of a price cell, ignoring currency symbols and
/// thousands separators. Returns None for cells with no digits at all.
fn parse_price(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

pub struct CsvDecoder;

impl RowDecoder for CsvDecoder {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<SheetRow>, DecodeError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let header: Vec<String> = reader
            .headers()
            .map_err(|err| DecodeError(format!("Unreadable CSV header: {}", err)))?
            .iter()
            .map(|s| s.to_owned())
            .collect();
        let columns = ColumnMap::from_header(&header)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|err| DecodeError(format!("Unreadable CSV row: {}", err)))?;
            let cells: Vec<&str> = record.iter().collect();
            rows.push(columns.row_from_cells(&cells));
        }
        Ok(rows)
    }
}

pub struct XlsxDecoder;

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Spreadsheet apps store integers as floats, keep "9000" over "9000.0".
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

impl RowDecoder for XlsxDecoder {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<SheetRow>, DecodeError> {
        let mut workbook = Xlsx::new(Cursor::new(bytes))
            .map_err(|err| DecodeError(format!("Not a readable xlsx file: {}", err)))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DecodeError("Workbook has no sheets".to_owned()))?
            .map_err(|err| DecodeError(format!("Unreadable first sheet: {}", err)))?;

        let mut sheet_rows = range.rows();
        let header: Vec<String> = sheet_rows
            .next()
            .ok_or_else(|| DecodeError("Sheet has no header row".to_owned()))?
            .iter()
            .map(cell_to_string)
            .collect();
        let columns = ColumnMap::from_header(&header)?;

        Ok(sheet_rows
            .map(|cells| {
                let cells: Vec<String> = cells.iter().map(cell_to_string).collect();
                columns.row_from_cells(&cells)
            })
            .collect())
    }
}
