//! Built-in validators: identifier checksums and value-shape predicates.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::document::Document;
use crate::error::PluginError;
use crate::registry::Validator;

use super::mrz::check_digit;
use super::patterns::{AMOUNT, DATE_DMY, DATE_POLISH_LONG, DATE_YMD, INVOICE_ID};

/// Adapts a plain `&str -> bool` predicate to the [`Validator`] trait.
#[derive(Clone, Copy)]
pub struct Predicate(pub fn(&str) -> bool);

impl Validator for Predicate {
    fn validate(&self, value: &str, _doc: &Document) -> Result<bool, PluginError> {
        Ok((self.0)(value))
    }
}

/// Invoice identifiers: letters, digits and dashes only (case-insensitive).
pub fn is_invoice(value: &str) -> bool {
    INVOICE_ID.is_match(&value.to_uppercase())
}

pub fn non_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Validate a Polish NIP using the checksum algorithm.
///
/// NIP format: 10 digits where the last digit is a checksum.
/// Weights: 6, 5, 7, 2, 3, 4, 5, 6, 7
pub fn validate_nip(nip: &str) -> bool {
    let digits = digits_of(nip);
    if digits.len() != 10 {
        return false;
    }

    let checksum = weighted_sum(&digits, &[6, 5, 7, 2, 3, 4, 5, 6, 7]) % 11;

    // A checksum of 10 is never issued
    checksum != 10 && checksum == digits[9]
}

/// Validate a Polish REGON (9 or 14 digits).
///
/// - 9 digits: weights [8, 9, 2, 3, 4, 5, 6, 7]
/// - 14 digits: first 9 validated as above, then [2, 4, 8, 5, 0, 9, 7, 3, 6, 1, 2, 4, 8]
pub fn validate_regon(regon: &str) -> bool {
    let digits = digits_of(regon);

    match digits.len() {
        9 => regon_check(&digits, &[8, 9, 2, 3, 4, 5, 6, 7]),
        14 => {
            regon_check(&digits[..9], &[8, 9, 2, 3, 4, 5, 6, 7])
                && regon_check(&digits, &[2, 4, 8, 5, 0, 9, 7, 3, 6, 1, 2, 4, 8])
        }
        _ => false,
    }
}

fn regon_check(digits: &[u32], weights: &[u32]) -> bool {
    let checksum = weighted_sum(digits, weights) % 11;
    let expected = if checksum == 10 { 0 } else { checksum };
    digits.get(weights.len()) == Some(&expected)
}

/// Validate an IBAN: move the first four characters to the end, map letters
/// to 10..35, and the resulting number mod 97 must be 1.
pub fn validate_iban(iban: &str) -> bool {
    let iban: String = iban
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if iban.len() < 5 || !iban.is_ascii() {
        return false;
    }

    let (head, bban) = iban.split_at(4);
    if !head[..2].chars().all(|c| c.is_ascii_alphabetic())
        || !head[2..].chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }

    // The number is too large for u64, so reduce digit by digit.
    let mut remainder: u32 = 0;
    for c in bban.chars().chain(head.chars()) {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            _ => return false,
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }

    remainder == 1
}

/// Parse a whole value as a calendar date.
///
/// Accepts `DD.MM.YYYY` (also `/` and `-`), two-digit years, `YYYY-MM-DD`,
/// and Polish long dates such as `15 stycznia 2024`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Some(caps) = DATE_DMY.captures(value) {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(parse_year(&caps[3])?, month, day);
    }

    if let Some(caps) = DATE_YMD.captures(value) {
        return NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    }

    if let Some(caps) = DATE_POLISH_LONG.captures(value) {
        let month = polish_month_to_number(&caps[2])?;
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?);
    }

    None
}

pub fn is_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// Parse a whole value as a monetary amount (`1 234,56`, `1234.56 zł`).
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let caps = AMOUNT.captures(value)?;
    let integer_part: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
    Decimal::from_str(&format!("{}.{}", integer_part, &caps[2])).ok()
}

pub fn is_amount(value: &str) -> bool {
    parse_amount(value).is_some()
}

/// The last character is the ICAO 9303 check digit of the preceding ones.
pub fn has_mrz_check_digit(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    match cleaned.char_indices().last() {
        Some((idx, last)) if idx > 0 && last.is_ascii_digit() => {
            check_digit(&cleaned[..idx]) == last
        }
        _ => false,
    }
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn weighted_sum(digits: &[u32], weights: &[u32]) -> u32 {
    digits.iter().zip(weights).map(|(d, w)| d * w).sum()
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    Some(match year {
        // Two-digit year: 00-50 are 2000s, 51-99 are 1900s
        0..=50 if s.len() == 2 => 2000 + year,
        51..=99 if s.len() == 2 => 1900 + year,
        _ => year,
    })
}

fn polish_month_to_number(month: &str) -> Option<u32> {
    let number = match month.to_lowercase().as_str() {
        "stycznia" => 1,
        "lutego" => 2,
        "marca" => 3,
        "kwietnia" => 4,
        "maja" => 5,
        "czerwca" => 6,
        "lipca" => 7,
        "sierpnia" => 8,
        "września" => 9,
        "października" => 10,
        "listopada" => 11,
        "grudnia" => 12,
        _ => return None,
    };
    Some(number)
}
