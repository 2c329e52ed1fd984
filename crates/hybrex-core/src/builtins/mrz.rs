//! Machine readable zone (ICAO 9303) detection and parsing.
//!
//! Supports the three travel-document layouts:
//! - TD1: 3 lines of 30 characters (ID cards)
//! - TD2: 2 lines of 36 characters
//! - TD3: 2 lines of 44 characters (passports)

use std::fmt;

use crate::document::Document;
use crate::error::PluginError;
use crate::registry::{Candidate, Extractor};

use super::patterns::MRZ_LINE;

const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Confidence of a field whose check digit verifies.
const VERIFIED: f64 = 1.0;
/// Confidence of a field whose check digit does not verify.
const UNVERIFIED: f64 = 0.5;

/// ICAO 9303 check digit: weights 7, 3, 1 repeating; digits count as their
/// value, `A`-`Z` as 10-35, filler `<` (and anything else) as 0.
pub fn check_digit(value: &str) -> char {
    let total: u32 = value
        .chars()
        .zip(WEIGHTS.iter().cycle())
        .map(|(c, w)| char_value(c) * w)
        .sum();

    char::from_digit(total % 10, 10).unwrap_or('0')
}

fn char_value(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}

fn verifies(field: &str, check: &str) -> bool {
    check.chars().next() == Some(check_digit(field))
}

/// Candidate MRZ lines in the text, spaces removed and upper-cased.
pub fn detect_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .chars()
                .filter(|c| *c != ' ')
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|line| MRZ_LINE.is_match(line))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrzFormat {
    Td1,
    Td2,
    Td3,
}

impl MrzFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MrzFormat::Td1 => "TD1",
            MrzFormat::Td2 => "TD2",
            MrzFormat::Td3 => "TD3",
        }
    }

    /// Identify the layout from the detected lines.
    pub fn classify(lines: &[String]) -> Option<Self> {
        let all_len = |n: usize| lines.iter().all(|l| l.len() == n);

        match lines.len() {
            3 if all_len(30) => Some(MrzFormat::Td1),
            2 if all_len(36) => Some(MrzFormat::Td2),
            2 if all_len(44) => Some(MrzFormat::Td3),
            _ => None,
        }
    }
}

impl fmt::Display for MrzFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed machine readable zone.
///
/// Dates are kept as the raw `YYMMDD` digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mrz {
    pub format: MrzFormat,
    pub document_code: String,
    pub issuing_country: String,
    pub document_number: String,
    pub document_number_valid: bool,
    pub surname: String,
    pub given_names: String,
    pub nationality: String,
    pub birth_date: String,
    pub birth_date_valid: bool,
    pub sex: String,
    pub expiry_date: String,
    pub expiry_date_valid: bool,
    pub composite_valid: bool,
}

impl Mrz {
    /// Detect and parse the MRZ of a text, if it has exactly one.
    pub fn parse(text: &str) -> Option<Self> {
        let lines = detect_lines(text);
        let format = MrzFormat::classify(&lines)?;

        let mrz = match format {
            MrzFormat::Td1 => Self::parse_td1(&lines[0], &lines[1], &lines[2]),
            MrzFormat::Td2 | MrzFormat::Td3 => Self::parse_two_line(format, &lines[0], &lines[1]),
        };
        Some(mrz)
    }

    fn parse_td1(l1: &str, l2: &str, l3: &str) -> Self {
        let (surname, given_names) = split_names(l3);
        let composite = format!("{}{}{}{}", &l1[5..30], &l2[0..7], &l2[8..15], &l2[18..29]);

        Self {
            format: MrzFormat::Td1,
            document_code: l1[0..2].to_string(),
            issuing_country: l1[2..5].to_string(),
            document_number: strip_filler(&l1[5..14]),
            document_number_valid: verifies(&l1[5..14], &l1[14..15]),
            surname,
            given_names,
            nationality: l2[15..18].to_string(),
            birth_date: l2[0..6].to_string(),
            birth_date_valid: verifies(&l2[0..6], &l2[6..7]),
            sex: l2[7..8].to_string(),
            expiry_date: l2[8..14].to_string(),
            expiry_date_valid: verifies(&l2[8..14], &l2[14..15]),
            composite_valid: verifies(&composite, &l2[29..30]),
        }
    }

    /// TD2 and TD3 share the second-line layout up to the optional data.
    fn parse_two_line(format: MrzFormat, l1: &str, l2: &str) -> Self {
        let last = l2.len() - 1;
        let (surname, given_names) = split_names(&l1[5..]);
        let composite = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..last]);

        Self {
            format,
            document_code: l1[0..2].to_string(),
            issuing_country: l1[2..5].to_string(),
            document_number: strip_filler(&l2[0..9]),
            document_number_valid: verifies(&l2[0..9], &l2[9..10]),
            surname,
            given_names,
            nationality: l2[10..13].to_string(),
            birth_date: l2[13..19].to_string(),
            birth_date_valid: verifies(&l2[13..19], &l2[19..20]),
            sex: l2[20..21].to_string(),
            expiry_date: l2[21..27].to_string(),
            expiry_date_valid: verifies(&l2[21..27], &l2[27..28]),
            composite_valid: verifies(&composite, &l2[last..]),
        }
    }
}

fn strip_filler(field: &str) -> String {
    field.replace('<', "").trim().to_string()
}

fn split_names(field: &str) -> (String, String) {
    let (surname, given) = field.split_once("<<").unwrap_or((field, ""));
    let clean = |s: &str| {
        s.split('<')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };
    (clean(surname), clean(given))
}

/// Which MRZ field an [`MrzFieldExtractor`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrzField {
    DocumentNumber,
    Format,
    Surname,
    GivenNames,
    Nationality,
    BirthDate,
    ExpiryDate,
    Sex,
}

impl MrzField {
    /// Registry name of the extractor for this field.
    pub fn extractor_name(&self) -> &'static str {
        match self {
            MrzField::DocumentNumber => "mrz_parser",
            MrzField::Format => "mrz_type",
            MrzField::Surname => "mrz_surname",
            MrzField::GivenNames => "mrz_given_names",
            MrzField::Nationality => "mrz_nationality",
            MrzField::BirthDate => "mrz_birth_date",
            MrzField::ExpiryDate => "mrz_expiry_date",
            MrzField::Sex => "mrz_sex",
        }
    }

    pub const ALL: [MrzField; 8] = [
        MrzField::DocumentNumber,
        MrzField::Format,
        MrzField::Surname,
        MrzField::GivenNames,
        MrzField::Nationality,
        MrzField::BirthDate,
        MrzField::ExpiryDate,
        MrzField::Sex,
    ];
}

/// Extracts one field from the document's MRZ.
///
/// Fields protected by a check digit carry confidence 1.0 when it verifies
/// and 0.5 when it does not. Empty fields yield no candidate.
#[derive(Debug, Clone, Copy)]
pub struct MrzFieldExtractor(pub MrzField);

impl Extractor for MrzFieldExtractor {
    fn extract(&self, doc: &Document) -> Result<Option<Candidate>, PluginError> {
        let Some(mrz) = Mrz::parse(&doc.text) else {
            return Ok(None);
        };

        let checked = |value: &str, valid: bool| {
            Candidate::new(value).with_confidence(if valid { VERIFIED } else { UNVERIFIED })
        };

        let candidate = match self.0 {
            MrzField::DocumentNumber => checked(&mrz.document_number, mrz.document_number_valid),
            MrzField::Format => Candidate::new(mrz.format.as_str()),
            MrzField::Surname => Candidate::new(mrz.surname),
            MrzField::GivenNames => Candidate::new(mrz.given_names),
            MrzField::Nationality => Candidate::new(mrz.nationality.replace('<', "")),
            MrzField::BirthDate => checked(&mrz.birth_date, mrz.birth_date_valid),
            MrzField::ExpiryDate => checked(&mrz.expiry_date, mrz.expiry_date_valid),
            MrzField::Sex => Candidate::new(mrz.sex.replace('<', "")),
        };

        Ok(Some(candidate).filter(|c| !c.value.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TD3: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\n\
                       L898902C36UTO7408122F1204159ZE184226B<<<<<10";

    const TD1: &str = "I<UTOD231458907<<<<<<<<<<<<<<<\n\
                       7408122F1204159UTO<<<<<<<<<<<6\n\
                       ERIKSSON<<ANNA<MARIA<<<<<<<<<<";

    const TD2: &str = "I<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<\n\
                       D231458907UTO7408122F1204159<<<<<<<6";

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit("L898902C3"), '6');
        assert_eq!(check_digit("740812"), '2');
        assert_eq!(check_digit("120415"), '9');
        assert_eq!(check_digit(""), '0');
    }

    #[test]
    fn test_detect_lines_skips_prose() {
        let text = format!("PASSPORT\nName: Anna Eriksson\n{TD3}\n");
        let lines = detect_lines(&text);
        assert_eq!(lines.len(), 2);
        assert_eq!(MrzFormat::classify(&lines), Some(MrzFormat::Td3));
    }

    #[test]
    fn test_detect_lines_removes_spaces() {
        let lines = detect_lines("p<uto eriksson<<anna<maria<<<<<<<<<<<<<<<<<<<");
        assert_eq!(lines, vec!["P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<".to_string()]);
    }

    #[test]
    fn test_parse_td3() {
        let mrz = Mrz::parse(TD3).unwrap();
        assert_eq!(mrz.format, MrzFormat::Td3);
        assert_eq!(mrz.document_code, "P<");
        assert_eq!(mrz.issuing_country, "UTO");
        assert_eq!(mrz.document_number, "L898902C3");
        assert!(mrz.document_number_valid);
        assert_eq!(mrz.surname, "ERIKSSON");
        assert_eq!(mrz.given_names, "ANNA MARIA");
        assert_eq!(mrz.nationality, "UTO");
        assert_eq!(mrz.birth_date, "740812");
        assert!(mrz.birth_date_valid);
        assert_eq!(mrz.sex, "F");
        assert_eq!(mrz.expiry_date, "120415");
        assert!(mrz.expiry_date_valid);
        assert!(mrz.composite_valid);
    }

    #[test]
    fn test_parse_td1() {
        let mrz = Mrz::parse(TD1).unwrap();
        assert_eq!(mrz.format, MrzFormat::Td1);
        assert_eq!(mrz.document_number, "D23145890");
        assert!(mrz.document_number_valid);
        assert_eq!(mrz.surname, "ERIKSSON");
        assert_eq!(mrz.given_names, "ANNA MARIA");
        assert_eq!(mrz.nationality, "UTO");
        assert!(mrz.composite_valid);
    }

    #[test]
    fn test_parse_td2() {
        let mrz = Mrz::parse(TD2).unwrap();
        assert_eq!(mrz.format, MrzFormat::Td2);
        assert_eq!(mrz.document_number, "D23145890");
        assert!(mrz.document_number_valid);
        assert_eq!(mrz.birth_date, "740812");
        assert!(mrz.composite_valid);
    }

    #[test]
    fn test_corrupted_check_digit() {
        let corrupted = TD3.replace("L898902C36", "L898902C35");
        let mrz = Mrz::parse(&corrupted).unwrap();
        assert!(!mrz.document_number_valid);
        assert!(!mrz.composite_valid);
    }

    #[test]
    fn test_no_mrz() {
        assert_eq!(Mrz::parse("Invoice 4821"), None);
        // A single long line is not a known layout
        assert_eq!(Mrz::parse("P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<"), None);
    }

    #[test]
    fn test_field_extractors() {
        let doc = Document::from_text(TD3);

        let number = MrzFieldExtractor(MrzField::DocumentNumber).extract(&doc).unwrap();
        assert_eq!(number, Some(Candidate::new("L898902C3").with_confidence(1.0)));

        let format = MrzFieldExtractor(MrzField::Format).extract(&doc).unwrap();
        assert_eq!(format, Some(Candidate::new("TD3")));

        let sex = MrzFieldExtractor(MrzField::Sex).extract(&doc).unwrap();
        assert_eq!(sex, Some(Candidate::new("F")));
    }

    #[test]
    fn test_unverified_document_number() {
        let doc = Document::from_text(TD3.replace("L898902C36", "L898902C35"));
        let number = MrzFieldExtractor(MrzField::DocumentNumber).extract(&doc).unwrap();
        assert_eq!(number, Some(Candidate::new("L898902C3").with_confidence(0.5)));
    }

    #[test]
    fn test_extractor_without_mrz() {
        let doc = Document::from_text("no machine readable zone here");
        for field in MrzField::ALL {
            assert_eq!(MrzFieldExtractor(field).extract(&doc).unwrap(), None);
        }
    }
}
