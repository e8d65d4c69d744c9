use chrono::{DateTime, NaiveTime, TimeZone};

const TIME_FORMAT: &str = "%H:%M";

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT).ok()
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Closing time is exclusive. A window whose closing time is earlier than
/// its opening time runs past midnight, and equal times mean open all day.
pub fn is_within_hours(opening_time: NaiveTime, closing_time: NaiveTime, now: NaiveTime) -> bool {
    if opening_time == closing_time {
        return true;
    }

    if opening_time < closing_time {
        now >= opening_time && now < closing_time
    } else {
        now >= opening_time || now < closing_time
    }
}

/// Unparseable hours are treated as closed.
pub fn is_open_at<Tz: TimeZone>(opening_time: &str, closing_time: &str, now: &DateTime<Tz>) -> bool {
    match (parse_time_of_day(opening_time), parse_time_of_day(closing_time)) {
        (Some(opening_time), Some(closing_time)) => {
            is_within_hours(opening_time, closing_time, now.time())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn t(raw: &str) -> NaiveTime {
        parse_time_of_day(raw).unwrap()
    }

    #[test]
    fn same_day_window() {
        assert!(is_within_hours(t("09:00"), t("17:00"), t("09:00")));
        assert!(is_within_hours(t("09:00"), t("17:00"), t("16:59")));
        assert!(!is_within_hours(t("09:00"), t("17:00"), t("17:00")));
        assert!(!is_within_hours(t("09:00"), t("17:00"), t("08:59")));
    }

    #[test]
    fn window_spanning_midnight() {
        assert!(is_within_hours(t("20:00"), t("04:00"), t("20:00")));
        assert!(is_within_hours(t("20:00"), t("04:00"), t("23:59")));
        assert!(is_within_hours(t("20:00"), t("04:00"), t("00:00")));
        assert!(is_within_hours(t("20:00"), t("04:00"), t("03:59")));
        assert!(!is_within_hours(t("20:00"), t("04:00"), t("04:00")));
        assert!(!is_within_hours(t("20:00"), t("04:00"), t("12:00")));
    }

    #[test]
    fn equal_times_mean_always_open() {
        assert!(is_within_hours(t("00:00"), t("00:00"), t("13:37")));
    }

    #[test]
    fn evaluates_in_local_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        // 17:00 UTC is 22:30 in UTC+05:30
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 17, 0, 0).unwrap().with_timezone(&ist);
        assert!(is_open_at("22:00", "03:00", &now));
        assert!(!is_open_at("09:00", "22:00", &now));
    }

    #[test]
    fn malformed_hours_are_closed() {
        let now = Utc::now();
        assert!(!is_open_at("late", "03:00", &now));
    }
}
