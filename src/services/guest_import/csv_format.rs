//! Guest CSV file format shared by import, template and export
//!
//! Layout: optional UTF-8 BOM, a human-readable header line, the machine header line
//! ([`IMPORT_HEADERS`]), then one line per guest. Every written field is quoted.

use anyhow::{anyhow, Result};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use super::error::ImportError;
use crate::types::{GuestCategory, GuestExportRow, ImportRow, DISPLAY_HEADERS, IMPORT_HEADERS};

const UTF8_BOM: &str = "\u{feff}";

/// Data rows of a validated import file, numbered from 1 in file order.
/// Consumed once per import attempt.
#[derive(Debug)]
pub struct ImportRows {
    records: std::vec::IntoIter<StringRecord>,
    next_number: usize,
}

impl ImportRows {
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl Iterator for ImportRows {
    type Item = (usize, ImportRow);

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let number = self.next_number;
        self.next_number += 1;
        Some((number, ImportRow::from_cells(record.iter())))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

/// Whitespace-only line. A line of bare separators is a data line with empty cells.
fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(|cell| cell.trim().is_empty())
}

/// Validate the header contract and return the data rows
pub fn parse_import_file(bytes: &[u8]) -> Result<ImportRows, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ImportError::MalformedFile)?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|_| ImportError::MalformedFile)?;
        if !is_blank(&record) {
            records.push(record);
        }
    }

    if records.len() < 2 {
        return Err(ImportError::MalformedFile);
    }

    let mut records = records.into_iter();

    let mut header = records.next().ok_or(ImportError::MalformedFile)?;
    if header.get(0).is_some_and(|cell| cell.contains("ID")) {
        debug!("Discarding display header line");
        header = records.next().ok_or(ImportError::MalformedFile)?;
    }

    let found = header.iter().map(str::trim).collect::<Vec<_>>().join(",");
    if found != IMPORT_HEADERS.join(",") {
        debug!("Header mismatch: '{}'", found);
        return Err(ImportError::HeaderMismatch);
    }

    Ok(ImportRows {
        records: records.collect::<Vec<_>>().into_iter(),
        next_number: 1,
    })
}

/// Write a complete guest file (BOM, both header lines, rows)
pub fn write_guest_file<'a>(rows: impl IntoIterator<Item = &'a ImportRow>) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(UTF8_BOM.as_bytes().to_vec());

    writer.write_record(DISPLAY_HEADERS)?;
    writer.write_record(IMPORT_HEADERS)?;
    for row in rows {
        writer.write_record(row.to_cells())?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV writer: {}", e.error()))
}

/// Empty import template
pub fn write_template() -> Result<Vec<u8>> {
    write_guest_file(std::iter::empty())
}

/// Map a stored guest onto the file layout so that re-importing it updates the same guest
pub fn export_row(category: GuestCategory, guest: &GuestExportRow) -> ImportRow {
    let amount = |v: Option<i64>| v.map(|n| n.to_string());
    ImportRow {
        id: Some(guest.id.clone()),
        name: Some(guest.name.clone()).filter(|n| !n.is_empty()),
        role: guest.role.clone(),
        phone: guest.phone.clone(),
        guest_type: Some(category.label().to_string()),
        referrer: guest.referrer.clone(),
        notes: guest.notes.clone(),
        secondary_info: guest.secondary_info.clone(),
        sponsorship: amount(guest.sponsorship),
        paid_amount: amount(guest.paid_amount),
        payment_source: guest.payment_source.clone(),
        materials: guest.materials.clone(),
        facebook_link: guest.facebook_link.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(lines: &[&str]) -> Vec<u8> {
        lines.join("\n").into_bytes()
    }

    fn machine_header() -> String {
        IMPORT_HEADERS.join(",")
    }

    #[test]
    fn test_parse_rejects_single_line() {
        let err = parse_import_file(&file(&[machine_header().as_str()])).unwrap_err();
        assert!(matches!(err, ImportError::MalformedFile));
    }

    #[test]
    fn test_parse_rejects_empty_file() {
        assert!(matches!(parse_import_file(b""), Err(ImportError::MalformedFile)));
        assert!(matches!(parse_import_file(b"\n \n\n"), Err(ImportError::MalformedFile)));
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let err = parse_import_file(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ImportError::MalformedFile));
    }

    #[test]
    fn test_parse_rejects_reordered_header() {
        let header = "name,id,role,phone,type,referrer,notes,secondary_info,sponsorship,paid_amount,payment_source,materials,facebook_link";
        let err = parse_import_file(&file(&[header, ",A"])).unwrap_err();
        assert!(matches!(err, ImportError::HeaderMismatch));
    }

    #[test]
    fn test_parse_rejects_missing_column() {
        let header = IMPORT_HEADERS[..12].join(",");
        let err = parse_import_file(&file(&[header.as_str(), ",A"])).unwrap_err();
        assert!(matches!(err, ImportError::HeaderMismatch));
    }

    #[test]
    fn test_parse_without_display_header() {
        let header = machine_header();
        let rows: Vec<_> = parse_import_file(&file(&[header.as_str(), ",Nguyễn Văn A,Prime Speaker,0901"]))
            .unwrap()
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[0].1.name.as_deref(), Some("Nguyễn Văn A"));
        assert_eq!(rows[0].1.phone.as_deref(), Some("0901"));
        assert_eq!(rows[0].1.sponsorship, None);
    }

    #[test]
    fn test_parse_discards_display_header_and_bom() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend(file(&[
            DISPLAY_HEADERS.join(",").as_str(),
            machine_header().as_str(),
            "\"\",\"B\",\"Khách phổ thông\"",
            "",
            "\"\",\"C\",\"Khách phổ thông\"",
        ]));
        let rows: Vec<_> = parse_import_file(&bytes).unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].0, 2);
        assert_eq!(rows[1].1.name.as_deref(), Some("C"));
    }

    #[test]
    fn test_parse_display_header_without_machine_header() {
        let err = parse_import_file(&file(&["ID,Tên", "ID khác,Tên"])).unwrap_err();
        assert!(matches!(err, ImportError::HeaderMismatch));
        let err = parse_import_file(&file(&["ID,Tên"])).unwrap_err();
        assert!(matches!(err, ImportError::MalformedFile));
    }

    #[test]
    fn test_parse_counts_separator_only_line_as_data() {
        let header = machine_header();
        let rows: Vec<_> = parse_import_file(&file(&[header.as_str(), ",,,,,,,,,,,,", "  "]))
            .unwrap()
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, ImportRow::default());
    }

    #[test]
    fn test_parse_header_only_yields_no_rows() {
        let rows = parse_import_file(&file(&[DISPLAY_HEADERS.join(",").as_str(), machine_header().as_str()])).unwrap();
        assert_eq!(rows.remaining(), 0);
    }

    #[test]
    fn test_template_has_bom_and_both_headers() {
        let bytes = write_template().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with('\u{feff}'));
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("\"ID"));
        assert_eq!(lines[1], "\"id\",\"name\",\"role\",\"phone\",\"type\",\"referrer\",\"notes\",\"secondary_info\",\"sponsorship\",\"paid_amount\",\"payment_source\",\"materials\",\"facebook_link\"");
    }

    #[test]
    fn test_writer_quotes_every_field_and_doubles_quotes() {
        let row = ImportRow {
            id: Some("PS001".to_string()),
            name: Some("Anh \"Ba\" Lê".to_string()),
            sponsorship: Some("1000000".to_string()),
            ..Default::default()
        };
        let text = String::from_utf8(write_guest_file([&row]).unwrap()).unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("\"PS001\",\"Anh \"\"Ba\"\" Lê\",\"\""));
        assert!(last.contains("\"1000000\""));
    }

    #[test]
    fn test_export_then_import_reproduces_rows() {
        let guests = vec![
            (
                GuestCategory::Vip,
                GuestExportRow {
                    id: "PS001".to_string(),
                    name: "Nguyễn Văn A".to_string(),
                    role: Some("Prime Speaker".to_string()),
                    phone: Some("0912345678".to_string()),
                    notes: Some("  thụt lề\n".to_string()),
                    secondary_info: Some("CEO, \"ABC\" Corp\nHà Nội".to_string()),
                    sponsorship: Some(1_000_000),
                    facebook_link: Some("https://facebook.com/a".to_string()),
                    ..Default::default()
                },
            ),
            (
                GuestCategory::Regular,
                GuestExportRow {
                    id: "KPT001".to_string(),
                    name: "Trần Thị B".to_string(),
                    role: Some("Khách phổ thông".to_string()),
                    referrer: Some("PS001".to_string()),
                    sponsorship: Some(500_000),
                    paid_amount: Some(200_000),
                    payment_source: Some("Trống".to_string()),
                    ..Default::default()
                },
            ),
        ];

        let exported: Vec<ImportRow> = guests.iter().map(|(c, g)| export_row(*c, g)).collect();
        let bytes = write_guest_file(&exported).unwrap();
        let imported: Vec<ImportRow> = parse_import_file(&bytes).unwrap().map(|(_, row)| row).collect();

        assert_eq!(imported, exported);
        assert_eq!(imported[0].guest_type.as_deref(), Some("Chức vụ"));
        assert_eq!(imported[0].notes.as_deref(), Some("  thụt lề\n"));
    }
}
