//! Forex session clock
//!
//! Classifies an instant against the four major trading-hub sessions. Pure:
//! it only looks at the instant it is given and the selected display
//! timezone, never at trading state.
//!
//! Session windows in UTC, start inclusive, end exclusive:
//!
//! ```text
//! Sydney    22:00 - 07:00 (wraps midnight)
//! Tokyo     00:00 - 09:00
//! London    08:00 - 17:00
//! New York  13:00 - 22:00
//! ```
//!
//! Windows overlap, so the current session is the first match in the order
//! Sydney, Tokyo, London, New York. The market is closed from Friday 22:00
//! UTC through the whole of Sunday, and reopens inside the Sydney window at
//! Monday 00:00 UTC.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Hour (UTC) on Friday at which the market closes
const CLOSE_HOUR: u32 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketSession {
    Sydney,
    Tokyo,
    London,
    NewYork,
}

impl MarketSession {
    /// Evaluation order for overlapping windows
    pub const PRECEDENCE: [MarketSession; 4] = [
        MarketSession::Sydney,
        MarketSession::Tokyo,
        MarketSession::London,
        MarketSession::NewYork,
    ];

    /// (open, close) hours in UTC
    pub fn window(self) -> (u32, u32) {
        match self {
            MarketSession::Sydney => (22, 7),
            MarketSession::Tokyo => (0, 9),
            MarketSession::London => (8, 17),
            MarketSession::NewYork => (13, 22),
        }
    }

    pub fn opens_at(self) -> u32 {
        self.window().0
    }

    pub fn contains_hour(self, hour: u32) -> bool {
        let (open, close) = self.window();
        if open < close {
            hour >= open && hour < close
        } else {
            hour >= open || hour < close
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MarketSession::Sydney => "Sydney",
            MarketSession::Tokyo => "Tokyo",
            MarketSession::London => "London",
            MarketSession::NewYork => "New York",
        }
    }
}

impl std::fmt::Display for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Display timezones offered for the local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimezoneSelection {
    #[default]
    Utc,
    /// India
    UtcPlus0530,
    /// US Eastern (standard time)
    UtcMinus5,
    /// US Pacific (standard time)
    UtcMinus8,
    UtcPlus1,
    UtcPlus9,
    UtcPlus10,
}

impl TimezoneSelection {
    pub const ALL: [TimezoneSelection; 7] = [
        TimezoneSelection::Utc,
        TimezoneSelection::UtcPlus0530,
        TimezoneSelection::UtcMinus5,
        TimezoneSelection::UtcMinus8,
        TimezoneSelection::UtcPlus1,
        TimezoneSelection::UtcPlus9,
        TimezoneSelection::UtcPlus10,
    ];

    pub fn offset_minutes(self) -> i32 {
        match self {
            TimezoneSelection::Utc => 0,
            TimezoneSelection::UtcPlus0530 => 5 * 60 + 30,
            TimezoneSelection::UtcMinus5 => -5 * 60,
            TimezoneSelection::UtcMinus8 => -8 * 60,
            TimezoneSelection::UtcPlus1 => 60,
            TimezoneSelection::UtcPlus9 => 9 * 60,
            TimezoneSelection::UtcPlus10 => 10 * 60,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimezoneSelection::Utc => "UTC",
            TimezoneSelection::UtcPlus0530 => "UTC+5:30",
            TimezoneSelection::UtcMinus5 => "UTC-5",
            TimezoneSelection::UtcMinus8 => "UTC-8",
            TimezoneSelection::UtcPlus1 => "UTC+1",
            TimezoneSelection::UtcPlus9 => "UTC+9",
            TimezoneSelection::UtcPlus10 => "UTC+10",
        }
    }

    pub fn fixed_offset(self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_minutes() * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl std::fmt::Display for TimezoneSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TimezoneSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|tz| tz.label() == wanted)
            .ok_or_else(|| {
                let labels: Vec<&str> = Self::ALL.iter().map(|tz| tz.label()).collect();
                format!("unknown timezone '{}' (expected one of {})", s, labels.join(", "))
            })
    }
}

impl TryFrom<String> for TimezoneSelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimezoneSelection> for String {
    fn from(value: TimezoneSelection) -> Self {
        value.label().to_string()
    }
}

/// Countdown to the next session boundary, floored to whole minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUntil {
    pub hours: i64,
    pub minutes: i64,
}

impl TimeUntil {
    fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        let total = (to - from).num_minutes().max(0);
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }
}

impl std::fmt::Display for TimeUntil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h {}m", self.hours, self.minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub is_open: bool,
    /// None while the market is closed
    pub current_session: Option<MarketSession>,
    pub next_session: MarketSession,
    pub time_until_next: TimeUntil,
    pub local_time: DateTime<FixedOffset>,
}

impl SessionStatus {
    /// e.g. `Wednesday, January 15, 2025, 11:00:00 PM`
    pub fn local_time_display(&self) -> String {
        self.local_time
            .format("%A, %B %-d, %Y, %I:%M:%S %p")
            .to_string()
    }

    pub fn current_label(&self) -> &'static str {
        self.current_session
            .map(MarketSession::name)
            .unwrap_or("Market Closed")
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)) + Duration::hours(hour as i64)
}

/// Friday 22:00 UTC through Sunday 23:59 UTC
pub fn is_weekend_closure(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Sat | Weekday::Sun => true,
        Weekday::Fri => now.hour() >= CLOSE_HOUR,
        _ => false,
    }
}

/// First Monday 00:00 UTC strictly after `now`
pub fn next_reopen(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = 7 - now.weekday().num_days_from_monday();
    at_hour(now.date_naive() + Duration::days(days_ahead as i64), 0)
}

/// Session whose opening boundary comes next, and when
fn next_boundary(now: DateTime<Utc>) -> (MarketSession, DateTime<Utc>) {
    let today = now.date_naive();
    let upcoming = [today, today + Duration::days(1)]
        .into_iter()
        .flat_map(|date| {
            MarketSession::PRECEDENCE
                .into_iter()
                .map(move |s| (s, at_hour(date, s.opens_at())))
        })
        .filter(|(_, at)| *at > now)
        .min_by_key(|(_, at)| *at);

    match upcoming {
        Some((session, at)) if !is_weekend_closure(at) => (session, at),
        _ => (MarketSession::Sydney, next_reopen(now)),
    }
}

/// Classify `now` against the session calendar
pub fn compute_session_status(now: DateTime<Utc>, timezone: TimezoneSelection) -> SessionStatus {
    let local_time = now.with_timezone(&timezone.fixed_offset());

    if is_weekend_closure(now) {
        let reopen = next_reopen(now);
        return SessionStatus {
            is_open: false,
            current_session: None,
            next_session: MarketSession::Sydney,
            time_until_next: TimeUntil::between(now, reopen),
            local_time,
        };
    }

    let hour = now.hour();
    let current_session = MarketSession::PRECEDENCE
        .into_iter()
        .find(|s| s.contains_hour(hour));
    let (next_session, next_at) = next_boundary(now);

    SessionStatus {
        is_open: current_session.is_some(),
        current_session,
        next_session,
        time_until_next: TimeUntil::between(now, next_at),
        local_time,
    }
}
