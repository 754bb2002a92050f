use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::classifier::{LegalStage, LetterType};
use super::mapping::CanonicalField;

/// One cell of an externally parsed spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Text rendition used for identifier-like fields; blank cells yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Number(value) if value.is_finite() => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    Some(format!("{:.0}", value))
                } else {
                    Some(value.to_string())
                }
            }
            CellValue::Number(_) | CellValue::Empty => None,
            CellValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Number(number) => number
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Empty),
            Value::String(text) => CellValue::Text(text),
            Value::Bool(flag) => CellValue::Text(flag.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Header-keyed spreadsheet row. Column order is preserved but never relied upon
/// for field lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, header: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.push(header, value);
        self
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((header.into(), value.into()));
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(header, _)| header.as_str())
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(candidate, _)| candidate == header)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Map<String, Value>> for RawRow {
    fn from(map: Map<String, Value>) -> Self {
        let cells = map
            .into_iter()
            .map(|(header, value)| (header, CellValue::from(value)))
            .collect();
        Self { cells }
    }
}

impl<'de> Deserialize<'de> for RawRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(RawRow::from(map))
    }
}

impl Serialize for RawRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = Map::with_capacity(self.cells.len());
        for (header, value) in &self.cells {
            let json = match value {
                CellValue::Number(number) => serde_json::Number::from_f64(*number)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                CellValue::Text(text) => Value::String(text.clone()),
                CellValue::Empty => Value::Null,
            };
            map.insert(header.clone(), json);
        }
        map.serialize(serializer)
    }
}

/// Canonical debtor line produced by the normalizer and annotated by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtorRecord {
    pub unit: String,
    pub owner_name: String,
    #[serde(default)]
    pub previous_balance: f64,
    #[serde(default)]
    pub current_fee: f64,
    #[serde(default)]
    pub interest: f64,
    #[serde(default)]
    pub other_charges: f64,
    #[serde(default)]
    pub total_payable: f64,
    #[serde(default)]
    pub months_overdue: f64,
    #[serde(default)]
    pub status_label: String,
    pub letter_type: LetterType,
    #[serde(default)]
    pub legal_stage: LegalStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Fields whose source cell had content that could not be read as a number.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted_fields: Vec<CanonicalField>,
}

/// Result of normalizing one batch of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedBatch {
    pub debtors: Vec<DebtorRecord>,
    pub rows_present: usize,
    pub rows_accepted: usize,
    pub rows_dropped: usize,
    pub defaulted_cells: usize,
}

impl NormalizedBatch {
    pub fn total_payable(&self) -> f64 {
        self.debtors.iter().map(|debtor| debtor.total_payable).sum()
    }
}
