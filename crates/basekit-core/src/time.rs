// crates/basekit-core/src/time.rs
// ============================================================================
// Module: API Timestamps
// Description: Millisecond timestamps in the API wire format.
// Purpose: Parse and render `YYYY-MM-DD HH:MM:SS.mmm` values.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! API timestamps are UTC wall-clock values rendered as
//! `YYYY-MM-DD HH:MM:SS.mmm`. Parsing is calendar-aware, so `2015-02-30 ...`
//! is rejected along with out-of-range hours, minutes, and seconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire format of API timestamps.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
/// Rendered length of a timestamp.
const TIMESTAMP_LEN: usize = 23;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Timestamp parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Text does not match the wire format.
    #[error("invalid timestamp: {0}")]
    Malformed(String),
}

/// UTC timestamp with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    /// Returns the current UTC time truncated to milliseconds.
    #[must_use]
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        let truncated = now.replace_millisecond(now.millisecond()).unwrap_or(now);
        Self(PrimitiveDateTime::new(truncated.date(), truncated.time()))
    }

    /// Parses the wire format.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Malformed`] for any text outside the format.
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        if text.len() != TIMESTAMP_LEN {
            return Err(TimestampError::Malformed(text.to_string()));
        }
        PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT)
            .map(Self)
            .map_err(|_| TimestampError::Malformed(text.to_string()))
    }

    /// Returns the wrapped date-time.
    #[must_use]
    pub const fn as_datetime(&self) -> PrimitiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.0.format(TIMESTAMP_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Returns true when the text is a valid API timestamp.
#[must_use]
pub fn is_timestamp_text(text: &str) -> bool {
    Timestamp::parse(text).is_ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
