use chrono::{DateTime, FixedOffset, Utc};

/// Midnight of the current day at `offset`, as a UTC instant.
pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    now.with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(offset)
        .single()
        .map(|midnight| midnight.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn local_midnight_respects_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        // 20:00 UTC is already 01:30 the next day in IST.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let start = start_of_local_day(now, ist).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap());
    }

    #[test]
    fn utc_midnight_is_date_start() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 15, 0).unwrap();
        assert_eq!(
            start_of_local_day(now, utc).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
