use super::domain::{CellValue, RawRow};
use std::io::Read;

/// Reads a CSV export into header-keyed rows. Every cell stays text; numeric
/// interpretation happens later in the normalizer.
pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.replace(['\u{feff}', '\u{200b}'], ""))
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut row = RawRow::new();
        for (index, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record
                .get(index)
                .map(CellValue::from)
                .unwrap_or(CellValue::Empty);
            row.push(header.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_headers_and_cells_as_text() {
        let rows = parse_rows(Cursor::new(
            "\u{feff}LOCAL/OFI,PROPIETARIO,TOTAL A PAGAR\nL101,JUAN PEREZ,\"705.000\"\n",
        ))
        .expect("parse");

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(
            row.headers().collect::<Vec<_>>(),
            vec!["LOCAL/OFI", "PROPIETARIO", "TOTAL A PAGAR"]
        );
        assert_eq!(
            row.get("TOTAL A PAGAR"),
            Some(&CellValue::Text("705.000".to_string()))
        );
    }

    #[test]
    fn short_records_fill_missing_cells_with_empty() {
        let rows = parse_rows(Cursor::new("LOCAL,NOMBRE,TOTAL\nL102,ANA\n")).expect("parse");
        assert_eq!(rows[0].get("TOTAL"), Some(&CellValue::Empty));
    }
}
