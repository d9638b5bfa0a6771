use chrono::TimeDelta;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Render milliseconds as `H:MM:SS.mmm`.
pub fn format_ms(ms: u64) -> String {
    let delta = TimeDelta::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX));
    let hours = delta.num_hours();
    let minutes = delta.num_minutes() % 60;
    let seconds = delta.num_seconds() % 60;
    let millis = delta.num_milliseconds() % 1000;
    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims() {
        assert_eq!(split_csv(" a.csv, ,b/*.csv "), vec!["a.csv", "b/*.csv"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_ms(0), "0:00:00.000");
        assert_eq!(format_ms(83_456), "0:01:23.456");
        assert_eq!(format_ms(3_723_004), "1:02:03.004");
    }
}
