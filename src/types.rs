//! Shared value types and their CBOR encodings
use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// ordered by instant, `Utc` itself is not `Ord`
impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .unwrap_or_default()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }
    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "timestamp outside the i64 nanosecond range",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// CBOR codec for [`rust_decimal::Decimal`] fields, used as
/// `#[cbor(with = "crate::types::decimal")]`.
///
/// The 16 byte form keeps scale and mantissa exactly, so a decoded value
/// prints the same as the one that was stored.
pub mod decimal {
    use minicbor::{Decoder, Encoder};
    use rust_decimal::Decimal;

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        value: &Decimal,
        e: &mut Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&value.serialize())?.ok()
    }

    pub fn decode<'b, Ctx>(
        d: &mut Decoder<'b>,
        _: &mut Ctx,
    ) -> Result<Decimal, minicbor::decode::Error> {
        let bytes: [u8; 16] = d.bytes()?.try_into().map_err(|_| {
            minicbor::decode::Error::message("decimal must be encoded as 16 bytes")
        })?;

        Ok(Decimal::deserialize(bytes))
    }
}
