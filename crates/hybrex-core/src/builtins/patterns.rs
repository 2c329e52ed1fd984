//! Patterns used by the built-in extractors and validators.
//!
//! Validator patterns are anchored: they test a whole candidate value, not a
//! substring of it.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Dates: DD.MM.YYYY, DD/MM/YY, DD-MM-YYYY
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^\s*(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\s*$"
    ).unwrap();

    // Dates: YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^\s*(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\s*$"
    ).unwrap();

    // Dates: "15 stycznia 2024"
    pub static ref DATE_POLISH_LONG: Regex = Regex::new(
        r"(?i)^\s*(\d{1,2})\s+(stycznia|lutego|marca|kwietnia|maja|czerwca|lipca|sierpnia|września|października|listopada|grudnia)\s+(\d{4})\s*$"
    ).unwrap();

    // Amounts: "1 234,56", "1234.56", "1 234,56 zł"
    pub static ref AMOUNT: Regex = Regex::new(
        r"^\s*(\d{1,3}(?:[\s\u{00a0}]?\d{3})*|\d+)[,.](\d{2})\s*(?:PLN|zł|EUR|€|USD|\$|GBP|£)?\s*$"
    ).unwrap();

    // Invoice identifiers: letters, digits and dashes only
    pub static ref INVOICE_ID: Regex = Regex::new(r"^[A-Z0-9-]+$").unwrap();

    // One line of a machine readable zone, spaces already removed
    pub static ref MRZ_LINE: Regex = Regex::new(r"^[A-Z0-9<]{30,}$").unwrap();
}
