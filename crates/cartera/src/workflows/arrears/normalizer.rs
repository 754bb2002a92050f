use super::domain::CellValue;

/// Uppercases and keeps only `[A-Z0-9]`, so "Saldo  Ant." and "SALDO_ANT" compare equal.
pub(crate) fn normalize_header(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Parsed monetary cell. `defaulted` marks a non-blank cell that could not be read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParsedAmount {
    pub(crate) value: f64,
    pub(crate) defaulted: bool,
}

impl ParsedAmount {
    fn read(value: f64) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    fn blank() -> Self {
        Self::read(0.0)
    }

    fn garbage() -> Self {
        Self {
            value: 0.0,
            defaulted: true,
        }
    }
}

pub(crate) fn parse_amount(cell: Option<&CellValue>) -> ParsedAmount {
    parse_cell(cell, parse_amount_text)
}

/// Arrears age in months. Unlike money, a lone `.` is always a decimal point.
pub(crate) fn parse_months(cell: Option<&CellValue>) -> ParsedAmount {
    parse_cell(cell, parse_months_text)
}

fn parse_cell(cell: Option<&CellValue>, parse_text: fn(&str) -> Option<f64>) -> ParsedAmount {
    match cell {
        None | Some(CellValue::Empty) => ParsedAmount::blank(),
        Some(CellValue::Number(value)) if value.is_finite() => ParsedAmount::read(*value),
        Some(CellValue::Number(_)) => ParsedAmount::garbage(),
        Some(CellValue::Text(text)) => {
            if text.trim().is_empty() {
                return ParsedAmount::blank();
            }
            match parse_text(text) {
                Some(value) => ParsedAmount::read(value),
                None => ParsedAmount::garbage(),
            }
        }
    }
}

/// Reads Colombian-formatted amounts where `.` and `,` are ambiguous.
///
/// With both separators present `.` groups thousands and `,` marks decimals. A lone `,`
/// is a decimal mark. A lone `.` groups thousands when exactly three digits follow the
/// last one ("1.234" is 1234), otherwise it is a decimal point.
pub(crate) fn parse_amount_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !is_currency_symbol(*c))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
    {
        return None;
    }

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let canonical = match (has_dot, has_comma) {
        (true, true) => cleaned.replace('.', "").replacen(',', ".", 1),
        (false, true) => cleaned.replacen(',', ".", 1),
        (true, false) => {
            let last_group = cleaned.rsplit('.').next().unwrap_or_default();
            if last_group.len() == 3 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (false, false) => cleaned,
    };

    canonical
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Reads "0.250", "1,5" or "3". Mixing both separators is unreadable.
pub(crate) fn parse_months_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty()
        || !cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
    {
        return None;
    }
    if cleaned.contains('.') && cleaned.contains(',') {
        return None;
    }

    cleaned
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn is_currency_symbol(c: char) -> bool {
    matches!(c, '$' | '€' | '£' | '¢')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_header("Saldo  Ant."), "SALDOANT");
        assert_eq!(normalize_header("total_a_pagar"), "TOTALAPAGAR");
        assert_eq!(normalize_header("\u{feff}LOCAL/OFI"), "LOCALOFI");
    }

    #[test]
    fn both_separators_read_as_spanish_format() {
        assert_eq!(parse_amount_text("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount_text("$ 12.500.000,50"), Some(12_500_000.5));
    }

    #[test]
    fn lone_dot_with_three_digit_group_is_thousands() {
        assert_eq!(parse_amount_text("1.234"), Some(1234.0));
        assert_eq!(parse_amount_text("$ 705.000"), Some(705_000.0));
        assert_eq!(parse_amount_text("1.250.000"), Some(1_250_000.0));
    }

    #[test]
    fn lone_dot_with_other_group_is_decimal() {
        assert_eq!(parse_amount_text("12.34"), Some(12.34));
        assert_eq!(parse_amount_text("0.5"), Some(0.5));
    }

    #[test]
    fn lone_comma_is_decimal() {
        assert_eq!(parse_amount_text("12,34"), Some(12.34));
        assert_eq!(parse_amount_text("1,5"), Some(1.5));
    }

    #[test]
    fn negative_adjustments_survive() {
        assert_eq!(parse_amount_text("-50.000"), Some(-50_000.0));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_amount_text("N/D"), None);
        assert_eq!(parse_amount_text("1,2,3"), None);
        assert_eq!(parse_amount_text("inf"), None);
        assert_eq!(parse_amount_text("$"), None);
    }

    #[test]
    fn months_read_a_lone_dot_as_decimal() {
        assert_eq!(parse_months_text("0.250"), Some(0.25));
        assert_eq!(parse_months_text("1.125"), Some(1.125));
        assert_eq!(parse_months_text("1,5"), Some(1.5));
        assert_eq!(parse_months_text(" 3 "), Some(3.0));
    }

    #[test]
    fn months_reject_mixed_separators_and_text() {
        assert_eq!(parse_months_text("1.234,5"), None);
        assert_eq!(parse_months_text("tres"), None);
        let garbage = parse_months(Some(&CellValue::Text("N/D".to_string())));
        assert_eq!(garbage.value, 0.0);
        assert!(garbage.defaulted);
        assert_eq!(
            parse_months(Some(&CellValue::Text("".to_string()))),
            ParsedAmount::blank()
        );
    }

    #[test]
    fn parse_amount_distinguishes_blank_from_unreadable() {
        assert_eq!(parse_amount(None), ParsedAmount::blank());
        assert_eq!(
            parse_amount(Some(&CellValue::Text("   ".to_string()))),
            ParsedAmount::blank()
        );
        let garbage = parse_amount(Some(&CellValue::Text("pendiente".to_string())));
        assert_eq!(garbage.value, 0.0);
        assert!(garbage.defaulted);
        let numeric = parse_amount(Some(&CellValue::Number(705_000.0)));
        assert_eq!(numeric.value, 705_000.0);
        assert!(!numeric.defaulted);
    }
}
