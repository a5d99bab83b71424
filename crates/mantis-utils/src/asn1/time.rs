//! Conversion between Unix seconds and the proleptic Gregorian calendar,
//! plus the two X.509 time string forms (always UTC, seconds precision).

use mantis_types::CryptoError;

/// `(year, month, day, hour, minute, second)`.
pub type Civil = (i64, u32, u32, u32, u32, u32);

/// Days since 1970-01-01 for a civil date (H. Hinnant's `days_from_civil`).
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

pub fn unix_from_civil(c: Civil) -> i64 {
    let (y, mo, d, h, mi, s) = c;
    days_from_civil(y, mo, d) * 86_400 + (h * 3600 + mi * 60 + s) as i64
}

pub fn civil_from_unix(t: i64) -> Civil {
    let days = t.div_euclid(86_400);
    let secs = t.rem_euclid(86_400) as u32;
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d, secs / 3600, secs % 3600 / 60, secs % 60)
}

fn days_in_month(y: i64, m: u32) -> u32 {
    match m {
        4 | 6 | 9 | 11 => 30,
        2 if (y % 4 == 0 && y % 100 != 0) || y % 400 == 0 => 29,
        2 => 28,
        _ => 31,
    }
}

fn digits(s: &str) -> Result<u32, CryptoError> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    s.parse().map_err(|_| CryptoError::DecodeAsn1Fail)
}

/// `YYYYMMDDHHMMSS` body shared by both forms, after the year is known.
fn finish_parse(year: i64, rest: &str) -> Result<i64, CryptoError> {
    if rest.len() != 10 {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let mo = digits(&rest[0..2])?;
    let d = digits(&rest[2..4])?;
    let h = digits(&rest[4..6])?;
    let mi = digits(&rest[6..8])?;
    let s = digits(&rest[8..10])?;
    if !(1..=12).contains(&mo) || d == 0 || d > days_in_month(year, mo) || h > 23 || mi > 59 || s > 59
    {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    Ok(unix_from_civil((year, mo, d, h, mi, s)))
}

/// `YYMMDDHHMMSSZ`; two-digit years 50..99 are 19xx (RFC 5280 §4.1.2.5.1).
pub(crate) fn parse_utc_time(s: &str) -> Result<i64, CryptoError> {
    let body = s.strip_suffix('Z').ok_or(CryptoError::DecodeAsn1Fail)?;
    if body.len() != 12 || !body.is_ascii() {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let yy = digits(&body[..2])? as i64;
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    finish_parse(year, &body[2..])
}

/// `YYYYMMDDHHMMSSZ`.
pub(crate) fn parse_generalized_time(s: &str) -> Result<i64, CryptoError> {
    let body = s.strip_suffix('Z').ok_or(CryptoError::DecodeAsn1Fail)?;
    if body.len() != 14 || !body.is_ascii() {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let year = digits(&body[..4])? as i64;
    finish_parse(year, &body[4..])
}

pub(crate) fn format_utc_time(c: Civil) -> String {
    let (y, mo, d, h, mi, s) = c;
    format!("{:02}{mo:02}{d:02}{h:02}{mi:02}{s:02}Z", y.rem_euclid(100))
}

pub(crate) fn format_generalized_time(c: Civil) -> String {
    let (y, mo, d, h, mi, s) = c;
    format!("{y:04}{mo:02}{d:02}{h:02}{mi:02}{s:02}Z")
}
