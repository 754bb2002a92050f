use serde::{Deserialize, Serialize};
use std::fmt;

/// Escalating collection-letter categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterType {
    /// Simple reminder.
    #[serde(rename = "CS")]
    Simple,
    /// Persuasive collection notice.
    #[serde(rename = "CP")]
    Persuasive,
    /// Judicial collection notice.
    #[serde(rename = "AB")]
    Judicial,
}

impl LetterType {
    pub const fn ordered() -> [Self; 3] {
        [Self::Simple, Self::Persuasive, Self::Judicial]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Simple => "CS",
            Self::Persuasive => "CP",
            Self::Judicial => "AB",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Simple => "Cobro Simple",
            Self::Persuasive => "Cobro Persuasivo",
            Self::Judicial => "Cobro Jurídico",
        }
    }

    /// Accepts `CS`, `CP` or `AB` in any case, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CS" => Some(Self::Simple),
            "CP" => Some(Self::Persuasive),
            "AB" => Some(Self::Judicial),
            _ => None,
        }
    }
}

impl fmt::Display for LetterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegalStage {
    #[default]
    #[serde(rename = "Preventiva")]
    Preventive,
    #[serde(rename = "Persuasiva")]
    Persuasive,
    #[serde(rename = "Jurídica")]
    Judicial,
}

impl LegalStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preventive => "Preventiva",
            Self::Persuasive => "Persuasiva",
            Self::Judicial => "Jurídica",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub letter_type: LetterType,
    pub legal_stage: LegalStage,
}

/// Derives the letter category and legal stage from arrears age.
///
/// A valid override replaces only the category; the legal stage always tracks
/// `months_overdue`. Non-finite ages are read as zero.
pub fn classify(months_overdue: f64, letter_override: Option<&str>) -> Classification {
    let months = if months_overdue.is_finite() {
        months_overdue
    } else {
        0.0
    };

    let (suggested, legal_stage) = if months > 2.0 {
        (LetterType::Judicial, LegalStage::Judicial)
    } else if months >= 1.0 {
        (LetterType::Persuasive, LegalStage::Persuasive)
    } else {
        (LetterType::Simple, LegalStage::Preventive)
    };

    let letter_type = letter_override
        .and_then(LetterType::parse)
        .unwrap_or(suggested);

    Classification {
        letter_type,
        legal_stage,
    }
}
