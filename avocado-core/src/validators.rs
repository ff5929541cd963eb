//! Pure input checks shared by the HTTP layer and the store.

use chrono::NaiveDate;

use crate::{MAX_PASSENGERS, MIN_PASSENGERS};

const PASSWORD_SPECIALS: &[char] = &['!', '@', '#', '$', '%', '^', '&', '*'];

/// Parses a `MM/DD/YYYY` date. Both month and day must be zero-padded.
pub fn parse_us_date(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let widths = [2, 2, 4];
    for (part, width) in parts.iter().zip(widths) {
        if part.len() != width || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses an ISO-8601 calendar date (`YYYY-MM-DD`) or a full RFC 3339
/// timestamp, keeping only the date.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

/// True when both dates are valid `MM/DD/YYYY` and the return is not before
/// the departure.
pub fn is_valid_date_range(departure: &str, return_date: &str) -> bool {
    match (parse_us_date(departure), parse_us_date(return_date)) {
        (Some(depart), Some(ret)) => ret >= depart,
        _ => false,
    }
}

pub fn is_valid_airport_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Luhn checksum over the digits of a card number. Separators are ignored;
/// 13 to 19 digits are required.
pub fn luhn_check(card_number: &str) -> bool {
    let digits: Vec<u32> = card_number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<u32>>>()
        .unwrap_or_default();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// `MM/YY` expiration; the card stays valid through the last day of that
/// month.
pub fn is_valid_expiration_date(value: &str, today: NaiveDate) -> bool {
    let Some((month, year)) = value.split_once('/') else {
        return false;
    };
    if month.len() != 2 || year.len() != 2 {
        return false;
    }
    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }

    let year = 2000 + year;
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    match first_of_next.and_then(|d| d.pred_opt()) {
        Some(last_day) => last_day >= today,
        None => false,
    }
}

pub fn is_valid_cvv(cvv: &str) -> bool {
    (3..=4).contains(&cvv.len()) && cvv.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_passenger_count(passengers: i32) -> bool {
    (MIN_PASSENGERS..=MAX_PASSENGERS).contains(&passengers)
}

/// Returns the first unmet rule, if any.
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(&c));
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err("Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character");
    }
    Ok(())
}
