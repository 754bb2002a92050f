use super::normalizer::normalize_header;
use serde::{Deserialize, Serialize};

/// Canonical fields the ingestion pipeline extracts from each spreadsheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    UnitIdentifier,
    OwnerName,
    PreviousBalance,
    CurrentFee,
    Interest,
    OtherCharges,
    TotalPayable,
    MonthsOverdue,
    StatusLabel,
    LetterType,
    Email,
    Phone,
}

impl CanonicalField {
    pub const fn ordered() -> [Self; 12] {
        [
            Self::UnitIdentifier,
            Self::OwnerName,
            Self::PreviousBalance,
            Self::CurrentFee,
            Self::Interest,
            Self::OtherCharges,
            Self::TotalPayable,
            Self::MonthsOverdue,
            Self::StatusLabel,
            Self::LetterType,
            Self::Email,
            Self::Phone,
        ]
    }

    /// Header used by the downloadable template.
    pub const fn template_header(self) -> &'static str {
        match self {
            Self::UnitIdentifier => "LOCAL/OFI",
            Self::OwnerName => "PROPIETARIO",
            Self::PreviousBalance => "SALDO ANTERIOR",
            Self::CurrentFee => "CUOTA ACTUAL",
            Self::Interest => "INTERESES DE MORA",
            Self::OtherCharges => "OTROS",
            Self::TotalPayable => "TOTAL A PAGAR",
            Self::MonthsOverdue => "EDAD VENCIDA",
            Self::StatusLabel => "ESTADO REAL",
            Self::LetterType => "TIPO DE CARTA",
            Self::Email => "EMAIL",
            Self::Phone => "MOVIL",
        }
    }

    pub const fn is_mandatory(self) -> bool {
        matches!(self, Self::UnitIdentifier | Self::OwnerName)
    }
}

/// A single way a source header can satisfy a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatcher {
    /// Normalized header equals the normalized pattern.
    Exact(&'static str),
    /// Normalized header contains the normalized root token.
    Contains(&'static str),
}

impl HeaderMatcher {
    fn matches(self, normalized_header: &str) -> bool {
        match self {
            HeaderMatcher::Exact(pattern) => normalize_header(pattern) == normalized_header,
            HeaderMatcher::Contains(root) => normalized_header.contains(&normalize_header(root)),
        }
    }
}

/// Ordered matchers for one field; the first matcher that hits any header wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: CanonicalField,
    pub matchers: &'static [HeaderMatcher],
}

use HeaderMatcher::{Contains, Exact};

pub const RESOLUTION_TABLE: &[FieldRule] = &[
    FieldRule {
        field: CanonicalField::UnitIdentifier,
        matchers: &[
            Exact("LOCAL/OFI"),
            Exact("LOCAL"),
            Exact("OFI"),
            Exact("UNIDAD"),
            Exact("APTO"),
            Exact("CASA"),
            Exact("OFICINA"),
            Exact("NUMERO"),
            Exact("IDENTIFICADOR"),
            Contains("LOCAL"),
            Contains("UNIDAD"),
        ],
    },
    FieldRule {
        field: CanonicalField::OwnerName,
        matchers: &[
            Exact("PROPIETARIO"),
            Exact("NOMBRE"),
            Exact("RESIDENTE"),
            Exact("CLIENTE"),
            Exact("HABITANTE"),
            Exact("TITULAR"),
            Contains("PROPIET"),
            Contains("NOMBRE"),
        ],
    },
    FieldRule {
        field: CanonicalField::PreviousBalance,
        matchers: &[
            Exact("SALDO ANTERIOR"),
            Exact("SALDO ANT"),
            Exact("DEUDA ANTERIOR"),
            Exact("ANTERIOR"),
        ],
    },
    FieldRule {
        field: CanonicalField::CurrentFee,
        matchers: &[
            Exact("CUOTA ACTUAL"),
            Exact("CUOTA"),
            Exact("ADMINISTRACION"),
            Exact("MES ACTUAL"),
        ],
    },
    FieldRule {
        field: CanonicalField::Interest,
        matchers: &[
            Exact("INTERESES DE MORA"),
            Exact("INTERESES"),
            Exact("MORA"),
            Exact("INT MORA"),
            Exact("INTERES"),
        ],
    },
    FieldRule {
        field: CanonicalField::OtherCharges,
        matchers: &[
            Exact("OTROS"),
            Exact("OTROS CONCEPTOS"),
            Exact("AJUSTES"),
            Exact("VARIOS"),
        ],
    },
    FieldRule {
        field: CanonicalField::TotalPayable,
        matchers: &[
            Exact("TOTAL A PAGAR"),
            Exact("TOTAL"),
            Exact("NETO"),
            Exact("A PAGAR"),
            Exact("VALOR TOTAL"),
        ],
    },
    FieldRule {
        field: CanonicalField::MonthsOverdue,
        matchers: &[
            Exact("EDAD VENCIDA"),
            Exact("EDAD"),
            Exact("MESES MORA"),
            Exact("MESES VENCIDOS"),
        ],
    },
    FieldRule {
        field: CanonicalField::StatusLabel,
        matchers: &[
            Exact("ESTADO REAL"),
            Exact("ESTADO"),
            Exact("ESTATUS"),
            Exact("SITUACION"),
        ],
    },
    FieldRule {
        field: CanonicalField::LetterType,
        matchers: &[
            Exact("TIPO DE CARTA"),
            Exact("TIPO"),
            Exact("PLANTILLA"),
            Exact("CARTA"),
        ],
    },
    FieldRule {
        field: CanonicalField::Email,
        matchers: &[
            Exact("EMAIL"),
            Exact("CORREO"),
            Exact("E-MAIL"),
            Exact("MAIL"),
        ],
    },
    FieldRule {
        field: CanonicalField::Phone,
        matchers: &[
            Exact("MOVIL"),
            Exact("TELEFONO"),
            Exact("CELULAR"),
            Exact("WHATSAPP"),
            Exact("MOBILE"),
        ],
    },
];

pub(crate) fn rule_for(field: CanonicalField) -> Option<&'static FieldRule> {
    RESOLUTION_TABLE.iter().find(|rule| rule.field == field)
}

/// Returns the source header that satisfies `field`, trying matchers in table order.
pub(crate) fn resolve_header<'h, I>(field: CanonicalField, headers: I) -> Option<&'h str>
where
    I: IntoIterator<Item = &'h str>,
{
    let normalized: Vec<(&str, String)> = headers
        .into_iter()
        .map(|header| (header, normalize_header(header)))
        .collect();

    rule_for(field)?.matchers.iter().find_map(|matcher| {
        normalized
            .iter()
            .find(|(_, candidate)| !candidate.is_empty() && matcher.matches(candidate))
            .map(|(header, _)| *header)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_has_a_rule() {
        for field in CanonicalField::ordered() {
            let rule = rule_for(field).expect("rule present");
            assert_eq!(rule.field, field);
        }
    }

    #[test]
    fn substring_fallback_is_limited_to_mandatory_fields() {
        for rule in RESOLUTION_TABLE {
            let has_contains = rule
                .matchers
                .iter()
                .any(|matcher| matches!(matcher, HeaderMatcher::Contains(_)));
            assert_eq!(has_contains, rule.field.is_mandatory(), "{:?}", rule.field);
        }
    }

    #[test]
    fn template_headers_resolve_to_their_own_field() {
        for field in CanonicalField::ordered() {
            let header = field.template_header();
            assert_eq!(resolve_header(field, [header]), Some(header));
        }
    }

    #[test]
    fn apto_resolves_to_unit_identifier() {
        let headers = ["Propietario", "Apto", "Total"];
        assert_eq!(
            resolve_header(CanonicalField::UnitIdentifier, headers),
            Some("Apto")
        );
    }

    #[test]
    fn exact_canonical_header_beats_synonyms() {
        let headers = ["TOTAL", "Total a Pagar"];
        assert_eq!(
            resolve_header(CanonicalField::TotalPayable, headers),
            Some("Total a Pagar")
        );
    }

    #[test]
    fn mandatory_fields_fall_back_to_root_tokens() {
        let headers = ["No. Unidad Privada", "Nombre del Copropietario"];
        assert_eq!(
            resolve_header(CanonicalField::UnitIdentifier, headers),
            Some("No. Unidad Privada")
        );
        assert_eq!(
            resolve_header(CanonicalField::OwnerName, headers),
            Some("Nombre del Copropietario")
        );
    }

    #[test]
    fn optional_fields_never_use_substring_matching() {
        let headers = ["Correo electronico del residente"];
        assert_eq!(resolve_header(CanonicalField::Email, headers), None);
    }
}
