//! The S7 time family: `DATE`, `TIME_OF_DAY`, `LTIME_OF_DAY`, `TIME`,
//! `LTIME`, `S5TIME`, `DATE_AND_TIME`, and `DTL`. These are the codecs with
//! a binary-encoding quirk; everything else lives in `scalar.rs`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::bcd::{decode_bcd12, decode_bcd_byte, encode_bcd12, encode_bcd_byte};
use super::{Codec, CodecError};
use crate::types::{HostValue, WireValue};

const EPOCH: fn() -> NaiveDate = || NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
const MAX_DATE: fn() -> NaiveDate = || NaiveDate::from_ymd_opt(2099, 12, 31).unwrap();
const DTL_EXTENSION_TYPE_ID: &str = "nsu=http://www.siemens.com/simatic-s7-opcua;s=TE_DTL";

/// `(ISO weekday % 8)` would not put Sunday at 1 for chrono's Monday-based
/// ISO numbering; the S7 day-of-week this crate matches instead is
/// `num_days_from_sunday() + 1` (Sunday=1 .. Saturday=7).
fn day_of_week_code(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8 + 1
}

pub struct DateCodec;
impl Codec for DateCodec {
    fn target_type(&self) -> &'static str {
        "NaiveDate"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let days = match wire {
            WireValue::U16(v) => *v,
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected U16, got {}",
                    other.shape_name()
                )))
            }
        };
        let date = EPOCH() + chrono::Duration::days(days as i64);
        if date < EPOCH() || date > MAX_DATE() {
            return Err(CodecError::type_mismatch(format!("{date} is outside 1990-01-01..2099-12-31")));
        }
        Ok(HostValue::Date(date))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let date = match host {
            HostValue::Date(d) => *d,
            other => return Err(CodecError::type_mismatch(format!("expected Date, got {other:?}"))),
        };
        if date < EPOCH() || date > MAX_DATE() {
            return Err(CodecError::out_of_range(format!("{date} is outside 1990-01-01..2099-12-31")));
        }
        let days = (date - EPOCH()).num_days();
        Ok(WireValue::U16(days as u16))
    }
}

pub struct TimeOfDayCodec;
impl Codec for TimeOfDayCodec {
    fn target_type(&self) -> &'static str {
        "Duration"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let ms = match wire {
            WireValue::U32(v) => *v,
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected U32, got {}",
                    other.shape_name()
                )))
            }
        };
        if ms as u64 >= 86_400_000 {
            return Err(CodecError::type_mismatch(format!("{ms} ms is >= 24h")));
        }
        Ok(HostValue::DurationNanos(ms as i64 * 1_000_000))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let ns = match host {
            HostValue::DurationNanos(n) => *n,
            other => return Err(CodecError::type_mismatch(format!("expected a duration, got {other:?}"))),
        };
        if ns < 0 {
            return Err(CodecError::out_of_range("negative time-of-day"));
        }
        let ms = ns / 1_000_000;
        if ms >= 86_400_000 {
            return Err(CodecError::out_of_range(format!("{ms} ms is >= 24h")));
        }
        Ok(WireValue::U32(ms as u32))
    }
}

pub struct LTimeOfDayCodec;
impl Codec for LTimeOfDayCodec {
    fn target_type(&self) -> &'static str {
        "Duration"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let ns = match wire {
            WireValue::U64(v) => *v,
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected U64, got {}",
                    other.shape_name()
                )))
            }
        };
        if ns >= 86_400_000_000_000 {
            return Err(CodecError::type_mismatch(format!("{ns} ns is >= 24h")));
        }
        Ok(HostValue::DurationNanos(ns as i64))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let ns = match host {
            HostValue::DurationNanos(n) => *n,
            other => return Err(CodecError::type_mismatch(format!("expected a duration, got {other:?}"))),
        };
        if ns < 0 || ns as u64 >= 86_400_000_000_000 {
            return Err(CodecError::out_of_range(format!("{ns} ns is out of 0..24h")));
        }
        Ok(WireValue::U64(ns as u64))
    }
}

pub struct TimeCodec;
impl Codec for TimeCodec {
    fn target_type(&self) -> &'static str {
        "Duration"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::I32(v) => Ok(HostValue::DurationNanos(*v as i64 * 1_000_000)),
            other => Err(CodecError::type_mismatch(format!(
                "expected I32, got {}",
                other.shape_name()
            ))),
        }
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let ns = match host {
            HostValue::DurationNanos(n) => *n,
            other => return Err(CodecError::type_mismatch(format!("expected a duration, got {other:?}"))),
        };
        let ms = ns / 1_000_000;
        if ms > i32::MAX as i64 || ms < i32::MIN as i64 {
            return Err(CodecError::out_of_range(format!("{ms} ms overflows a signed 32-bit duration")));
        }
        Ok(WireValue::I32(ms as i32))
    }
}

pub struct LTimeCodec;
impl Codec for LTimeCodec {
    fn target_type(&self) -> &'static str {
        "Duration"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::I64(v) => Ok(HostValue::DurationNanos(*v)),
            other => Err(CodecError::type_mismatch(format!(
                "expected I64, got {}",
                other.shape_name()
            ))),
        }
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::DurationNanos(n) => Ok(WireValue::I64(*n)),
            other => Err(CodecError::type_mismatch(format!("expected a duration, got {other:?}"))),
        }
    }
}

/// `S5TIME`: 2-bit base code in bits 13-12, three-digit BCD magnitude in
/// the low 12 bits.
pub struct S5TimeCodec;

const S5_BASES_MS: [i64; 4] = [10, 100, 1_000, 10_000];

impl Codec for S5TimeCodec {
    fn target_type(&self) -> &'static str {
        "Duration"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let raw = match wire {
            WireValue::U16(v) => *v,
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected U16, got {}",
                    other.shape_name()
                )))
            }
        };
        let base_code = ((raw >> 12) & 0x3) as usize;
        let magnitude = decode_bcd12(raw & 0x0FFF)?;
        let ms = magnitude as i64 * S5_BASES_MS[base_code];
        Ok(HostValue::DurationNanos(ms * 1_000_000))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let ns = match host {
            HostValue::DurationNanos(n) => *n,
            other => return Err(CodecError::type_mismatch(format!("expected a duration, got {other:?}"))),
        };
        if ns < 0 {
            return Err(CodecError::out_of_range("negative S5TIME"));
        }
        let ms = ns / 1_000_000;
        if ms > 9_990_000 {
            return Err(CodecError::out_of_range(format!("{ms} ms exceeds the 9990s S5TIME ceiling")));
        }
        // Smallest exact base first; fall back to the 10s base rounded to
        // the nearest unit when nothing represents the value exactly.
        for (code, &base) in S5_BASES_MS.iter().take(3).enumerate() {
            if ms % base == 0 {
                let magnitude = ms / base;
                if magnitude <= 999 {
                    let packed = ((code as u16) << 12) | encode_bcd12(magnitude as u16)?;
                    return Ok(WireValue::U16(packed));
                }
            }
        }
        let base = S5_BASES_MS[3];
        let magnitude = ((ms as f64) / (base as f64)).round() as i64;
        let magnitude = magnitude.min(999).max(0) as u16;
        let packed = (3u16 << 12) | encode_bcd12(magnitude)?;
        Ok(WireValue::U16(packed))
    }
}

fn bcd_digit_pair(byte: u8) -> Result<(u8, u8), CodecError> {
    let value = decode_bcd_byte(byte)?;
    Ok((value / 10, value % 10))
}

/// `DATE_AND_TIME`: 8-byte BCD layout.
pub struct DateAndTimeCodec;
impl Codec for DateAndTimeCodec {
    fn target_type(&self) -> &'static str {
        "NaiveDateTime"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let bytes = match wire {
            WireValue::Bytes(b) if b.len() == 8 => b,
            WireValue::Bytes(b) => {
                return Err(CodecError::type_mismatch(format!(
                    "DATE_AND_TIME needs 8 bytes, got {}",
                    b.len()
                )))
            }
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected Bytes, got {}",
                    other.shape_name()
                )))
            }
        };
        let year_raw = decode_bcd_byte(bytes[0])?;
        let year = if year_raw < 90 { 2000 + year_raw as i32 } else { 1900 + year_raw as i32 };
        if !(1990..=2089).contains(&year) {
            log::warn!("DATE_AND_TIME year {year} is outside the nominal 1990-2089 range");
        }
        let month = decode_bcd_byte(bytes[1])?;
        let day = decode_bcd_byte(bytes[2])?;
        let hour = decode_bcd_byte(bytes[3])?;
        let minute = decode_bcd_byte(bytes[4])?;
        let second = decode_bcd_byte(bytes[5])?;
        let (ms_hundreds, ms_tens) = bcd_digit_pair(bytes[6])?;
        let ms_ones = (bytes[7] >> 4) & 0x0F;
        if ms_ones > 9 {
            return Err(CodecError::type_mismatch("byte 7 high nibble is not a valid BCD digit"));
        }
        let weekday_code = bytes[7] & 0x0F;
        if weekday_code == 0 || weekday_code > 7 {
            return Err(CodecError::type_mismatch(format!(
                "byte 7 low nibble {weekday_code} is not a valid day-of-week"
            )));
        }
        let ms = ms_hundreds as u32 * 100 + ms_tens as u32 * 10 + ms_ones as u32;

        let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .ok_or_else(|| CodecError::type_mismatch(format!("{year}-{month:02}-{day:02} is not a valid date")))?;
        let time = NaiveTime::from_hms_milli_opt(hour as u32, minute as u32, second as u32, ms)
            .ok_or_else(|| CodecError::type_mismatch(format!("{hour:02}:{minute:02}:{second:02}.{ms:03} is not a valid time")))?;
        Ok(HostValue::DateTime(NaiveDateTime::new(date, time)))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let dt = match host {
            HostValue::DateTime(dt) => *dt,
            other => return Err(CodecError::type_mismatch(format!("expected DateTime, got {other:?}"))),
        };
        let year = dt.year();
        if !(1990..=2089).contains(&year) {
            log::warn!("DATE_AND_TIME year {year} is outside the nominal 1990-2089 range");
        }
        let year_bcd_value = if (2000..2090).contains(&year) {
            (year - 2000) as u8
        } else if (1990..2000).contains(&year) {
            (year - 1900) as u8
        } else {
            return Err(CodecError::out_of_range(format!("{year} cannot be represented by a 2-digit BCD year")));
        };

        let ms = dt.time().nanosecond() / 1_000_000;
        let ms_hundreds = (ms / 100) as u8;
        let ms_tens = ((ms / 10) % 10) as u8;
        let ms_ones = (ms % 10) as u8;
        let weekday = day_of_week_code(dt.date());

        let bytes = vec![
            encode_bcd_byte(year_bcd_value)?,
            encode_bcd_byte(dt.month() as u8)?,
            encode_bcd_byte(dt.day() as u8)?,
            encode_bcd_byte(dt.hour() as u8)?,
            encode_bcd_byte(dt.minute() as u8)?,
            encode_bcd_byte(dt.second() as u8)?,
            (ms_hundreds << 4) | ms_tens,
            (ms_ones << 4) | weekday,
        ];
        Ok(WireValue::Bytes(bytes))
    }
}

/// `DTL`: 12-byte little-endian payload wrapped in an extension object
///.
pub struct DtlCodec;
impl Codec for DtlCodec {
    fn target_type(&self) -> &'static str {
        "NaiveDateTime"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let body = match wire {
            WireValue::ExtensionObject { type_id, body } if type_id == DTL_EXTENSION_TYPE_ID => body,
            WireValue::ExtensionObject { type_id, .. } => {
                return Err(CodecError::type_mismatch(format!("unexpected extension object type id `{type_id}`")))
            }
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected a DTL extension object, got {}",
                    other.shape_name()
                )))
            }
        };
        if body.len() != 12 {
            return Err(CodecError::type_mismatch(format!("DTL payload must be 12 bytes, got {}", body.len())));
        }
        let year = u16::from_le_bytes([body[0], body[1]]) as i32;
        if !(1970..=2262).contains(&year) {
            log::warn!("DTL year {year} is outside the nominal 1970-2262 range");
        }
        let month = body[2];
        let day = body[3];
        let weekday_code = body[4];
        if weekday_code == 0 || weekday_code > 7 {
            return Err(CodecError::type_mismatch(format!("byte 4 {weekday_code} is not a valid day-of-week")));
        }
        let hour = body[5];
        let minute = body[6];
        let second = body[7];
        let nanos = u32::from_le_bytes([body[8], body[9], body[10], body[11]]);

        let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .ok_or_else(|| CodecError::type_mismatch(format!("{year}-{month:02}-{day:02} is not a valid date")))?;
        let time = NaiveTime::from_hms_nano_opt(hour as u32, minute as u32, second as u32, nanos)
            .ok_or_else(|| CodecError::type_mismatch("invalid time-of-day in DTL payload"))?;
        Ok(HostValue::DateTime(NaiveDateTime::new(date, time)))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let dt = match host {
            HostValue::DateTime(dt) => *dt,
            other => return Err(CodecError::type_mismatch(format!("expected DateTime, got {other:?}"))),
        };
        let year = dt.year();
        if !(1970..=2262).contains(&year) {
            log::warn!("DTL year {year} is outside the nominal 1970-2262 range");
        }
        if !(0..=65535).contains(&year) {
            return Err(CodecError::out_of_range(format!("{year} does not fit in a 16-bit DTL year")));
        }
        let year_bytes = (year as u16).to_le_bytes();
        let weekday = day_of_week_code(dt.date());
        let mut body = vec![
            year_bytes[0],
            year_bytes[1],
            dt.month() as u8,
            dt.day() as u8,
            weekday,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        ];
        body.extend_from_slice(&dt.time().nanosecond().to_le_bytes());
        Ok(WireValue::ExtensionObject {
            type_id: DTL_EXTENSION_TYPE_ID.to_string(),
            body,
        })
    }
}
