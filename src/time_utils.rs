// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, FixedOffset, NaiveDate, ParseResult, Utc};

/// Calendar date layout used in provider URLs and logs.
pub const ISO_DATE: &str = "%Y-%m-%d";

/// Expiry layout for persisted credentials. Always carries an explicit offset.
pub const EXPIRY_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%:z";

pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_DATE).to_string()
}

pub fn parse_date(value: &str) -> ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(value, ISO_DATE)
}

/// Format a credential expiry, keeping its original offset.
pub fn format_expiry(expiry: &DateTime<FixedOffset>) -> String {
    expiry.format(EXPIRY_LAYOUT).to_string()
}

pub fn parse_expiry(value: &str) -> ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, EXPIRY_LAYOUT)
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
