//! `CK_DATE` encoding: eight ASCII digits, `YYYYMMDD`.
//!
//! The all-zero string `"00000000"` is the unset date.

use time::{Date, Month};

use crate::error::{MarshalError, MarshalResult};

/// Size of a `CK_DATE`.
pub const DATE_SIZE: usize = 8;

/// The unset date.
pub const UNSET: [u8; DATE_SIZE] = *b"00000000";

/// Encode `date` as `YYYYMMDD`.
pub fn encode(date: Date) -> MarshalResult<[u8; DATE_SIZE]> {
    let year = date.year();
    if !(0..=9999).contains(&year) {
        return Err(MarshalError::InvalidDate(format!(
            "year {year} is outside 0000-9999"
        )));
    }
    let text = format!("{:04}{:02}{:02}", year, u8::from(date.month()), date.day());
    text.as_bytes()
        .try_into()
        .map_err(|_| MarshalError::length("CK_DATE", DATE_SIZE, text.len()))
}

/// Check that `date` is encodable without producing the bytes.
pub fn validate(date: Date) -> MarshalResult<()> {
    encode(date).map(|_| ())
}

/// Decode a `CK_DATE`. `"00000000"` yields `None`.
pub fn decode(bytes: &[u8]) -> MarshalResult<Option<Date>> {
    if bytes.len() != DATE_SIZE {
        return Err(MarshalError::length("CK_DATE", DATE_SIZE, bytes.len()));
    }
    if bytes == UNSET {
        return Ok(None);
    }
    let (year, rest) = bytes.split_at(4);
    let (month, day) = rest.split_at(2);

    let year = digits(year)?;
    let month = u8::try_from(digits(month)?)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(|| MarshalError::InvalidDate(format!("bad month in {}", show(bytes))))?;
    let day = u8::try_from(digits(day)?)
        .map_err(|_| MarshalError::InvalidDate(format!("bad day in {}", show(bytes))))?;

    let year = i32::try_from(year)
        .map_err(|_| MarshalError::InvalidDate(format!("bad year in {}", show(bytes))))?;
    Date::from_calendar_date(year, month, day)
        .map(Some)
        .map_err(|e| MarshalError::InvalidDate(format!("{}: {e}", show(bytes))))
}

fn digits(bytes: &[u8]) -> MarshalResult<u32> {
    bytes.iter().try_fold(0u32, |acc, &b| {
        if b.is_ascii_digit() {
            Ok(acc * 10 + u32::from(b - b'0'))
        } else {
            Err(MarshalError::InvalidDate(format!(
                "non-digit byte {b:#04x}"
            )))
        }
    })
}

fn show(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
