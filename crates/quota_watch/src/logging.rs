use std::io::Write;

use chrono::{FixedOffset, Utc};

/// Western Indonesia Time, UTC+07:00
const WIB_OFFSET_SECS: i32 = 7 * 3600;

/// Current time as `YYYY-MM-DD HH:MM:SS WIB`
pub fn now_wib() -> String {
    match FixedOffset::east_opt(WIB_OFFSET_SECS) {
        Some(wib) => Utc::now()
            .with_timezone(&wib)
            .format("%Y-%m-%d %H:%M:%S WIB")
            .to_string(),
        None => Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}

/// Initialize the logger, `info` unless `RUST_LOG` says otherwise
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                now_wib(),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_wib_format() {
        let stamp = now_wib();
        assert!(stamp.ends_with(" WIB"));
        assert_eq!(stamp.len(), "2025-10-18 21:43:05 WIB".len());
    }
}
