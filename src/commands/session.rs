//! Session clock command

use anyhow::Result;
use chrono::Utc;
use prop_risk_engine::{compute_session_status, Config, SessionStatus, TimezoneSelection};
use std::time::Duration;
use tracing::debug;

fn render(status: &SessionStatus, timezone: TimezoneSelection) -> String {
    format!(
        "{} [{}] | Market {} | Session: {} | Next: {} in {}",
        status.local_time_display(),
        timezone,
        if status.is_open { "OPEN" } else { "CLOSED" },
        status.current_label(),
        status.next_session,
        status.time_until_next
    )
}

pub fn run(config: &Config, timezone: Option<&str>, watch: bool, interval: u64) -> Result<()> {
    let timezone: TimezoneSelection = match timezone {
        Some(tz) => tz.parse().map_err(anyhow::Error::msg)?,
        None => config.session.timezone,
    };

    if !watch {
        println!("{}", render(&compute_session_status(Utc::now(), timezone), timezone));
        return Ok(());
    }

    let tick = Duration::from_secs(interval.max(1));
    debug!("Session clock ticking every {:?}", tick);
    loop {
        println!("{}", render(&compute_session_status(Utc::now(), timezone), timezone));
        std::thread::sleep(tick);
    }
}
