//! Metric value formatting.
//!
//! Maps a raw measure value to its display form by metric value type.
//! Values that do not parse for their declared type pass through
//! unchanged, as do unrecognized types.

/// Working hours per day for work-duration values.
const HOURS_IN_DAY: i64 = 8;

/// Format a raw value by metric value type.
#[must_use]
pub fn format_measure(value: &str, value_type: &str) -> String {
    match value_type {
        "INT" => parse_f64(value).map_or_else(|| value.to_string(), format_int),
        "SHORT_INT" => parse_f64(value).map_or_else(|| value.to_string(), format_short_int),
        "FLOAT" => parse_f64(value).map_or_else(|| value.to_string(), |v| format!("{v:.1}")),
        "PERCENT" => parse_f64(value).map_or_else(|| value.to_string(), |v| format_percent(v, 1)),
        "WORK_DUR" => value
            .parse::<i64>()
            .map_or_else(|_| value.to_string(), format_work_duration),
        "RATING" => parse_f64(value).map_or_else(|| value.to_string(), |v| format_rating(value, v)),
        _ => value.to_string(),
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}

/// Plain integer, no thousands separators.
fn format_int(value: f64) -> String {
    format!("{}", value.round() as i64)
}

/// Shortened integer with a unit suffix.
fn format_short_int(value: f64) -> String {
    if value >= 1e9 {
        format!("{}G", up_to_one_decimal(value / 1e9))
    } else if value >= 1e6 {
        format!("{}M", up_to_one_decimal(value / 1e6))
    } else if value >= 1e4 {
        format!("{}k", (value / 1e3).round() as i64)
    } else if value >= 1e3 {
        format!("{}k", up_to_one_decimal(value / 1e3))
    } else {
        format_int(value)
    }
}

/// One decimal place with a trailing `.0` trimmed away.
fn up_to_one_decimal(value: f64) -> String {
    let formatted = format!("{value:.1}");
    formatted
        .strip_suffix(".0")
        .map_or(formatted.clone(), str::to_string)
}

/// Percentage: `100%` exactly at one hundred, otherwise fixed decimals.
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    if (value - 100.0).abs() < f64::EPSILON {
        "100%".to_string()
    } else {
        format!("{value:.decimals$}%")
    }
}

/// Work duration in an 8-hour day, as `Nd Nh Nmin`.
///
/// Hours are shown only while days stay below ten; minutes only when no
/// days are shown and hours stay below ten. The sign lands on the first
/// displayed unit only. Zero renders as `0`.
#[must_use]
pub fn format_work_duration(total_minutes: i64) -> String {
    let negative = total_minutes < 0;
    let abs = total_minutes.abs();

    let days = abs / (HOURS_IN_DAY * 60);
    let hours = (abs % (HOURS_IN_DAY * 60)) / 60;
    let minutes = abs % 60;

    let mut parts: Vec<String> = Vec::new();
    let push = |amount: i64, unit: &str, parts: &mut Vec<String>| {
        let sign = if negative && parts.is_empty() { "-" } else { "" };
        parts.push(format!("{sign}{amount}{unit}"));
    };

    if days > 0 {
        push(days, "d", &mut parts);
    }
    if hours > 0 && days < 10 {
        push(hours, "h", &mut parts);
    }
    if minutes > 0 && hours < 10 && days == 0 {
        push(minutes, "min", &mut parts);
    }

    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join(" ")
    }
}

/// Letter rating: 1 maps to `A`, 2 to `B`, and so on. Out-of-range
/// values pass through unchanged.
fn format_rating(raw: &str, value: f64) -> String {
    let index = value.round() as i64;
    if (1..=26).contains(&index) {
        let letter = (b'A' + (index as u8 - 1)) as char;
        letter.to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_formatting() {
        assert_eq!(format_measure("12", "INT"), "12");
        assert_eq!(format_measure("1234567", "INT"), "1234567");
        assert_eq!(format_measure("12.0", "INT"), "12");
    }

    #[test]
    fn test_short_int_thresholds() {
        assert_eq!(format_measure("999", "SHORT_INT"), "999");
        assert_eq!(format_measure("1000", "SHORT_INT"), "1k");
        assert_eq!(format_measure("1500", "SHORT_INT"), "1.5k");
        assert_eq!(format_measure("10000", "SHORT_INT"), "10k");
        assert_eq!(format_measure("15500", "SHORT_INT"), "16k");
        assert_eq!(format_measure("1000000", "SHORT_INT"), "1M");
        assert_eq!(format_measure("2500000", "SHORT_INT"), "2.5M");
        assert_eq!(format_measure("1000000000", "SHORT_INT"), "1G");
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(format_measure("100", "PERCENT"), "100%");
        assert_eq!(format_measure("100.0", "PERCENT"), "100%");
        assert_eq!(format_measure("13", "PERCENT"), "13.0%");
        assert_eq!(format_measure("42.55", "PERCENT"), "42.5%");
        assert_eq!(format_measure("0", "PERCENT"), "0.0%");
    }

    #[test]
    fn test_percent_caller_decimals() {
        assert_eq!(format_percent(13.0, 2), "13.00%");
        assert_eq!(format_percent(13.0, 0), "13%");
        assert_eq!(format_percent(100.0, 2), "100%");
    }

    #[test]
    fn test_work_duration() {
        assert_eq!(format_measure("373832", "WORK_DUR"), "778d");
        assert_eq!(format_measure("0", "WORK_DUR"), "0");
        assert_eq!(format_work_duration(30), "30min");
        assert_eq!(format_work_duration(90), "1h 30min");
        // Minutes suppressed once days are shown.
        assert_eq!(format_work_duration(480 + 65), "1d 1h");
        // Hours suppressed once days reach double digits.
        assert_eq!(format_work_duration(10 * 480 + 120), "10d");
        assert_eq!(format_work_duration(9 * 480 + 120), "9d 2h");
    }

    #[test]
    fn test_work_duration_sign_on_first_unit_only() {
        assert_eq!(format_work_duration(-90), "-1h 30min");
        assert_eq!(format_work_duration(-(2 * 480 + 60)), "-2d 1h");
    }

    #[test]
    fn test_rating_letters() {
        assert_eq!(format_measure("1", "RATING"), "A");
        assert_eq!(format_measure("1.0", "RATING"), "A");
        assert_eq!(format_measure("3", "RATING"), "C");
        assert_eq!(format_measure("5", "RATING"), "E");
        assert_eq!(format_measure("13", "RATING"), "M");
    }

    #[test]
    fn test_rating_out_of_range_passes_through() {
        assert_eq!(format_measure("0", "RATING"), "0");
        assert_eq!(format_measure("27", "RATING"), "27");
    }

    #[test]
    fn test_unknown_type_passes_through() {
        assert_eq!(format_measure("whatever", "LEVEL"), "whatever");
        assert_eq!(format_measure("42", "DATA"), "42");
    }

    #[test]
    fn test_unparseable_value_passes_through() {
        assert_eq!(format_measure("n/a", "INT"), "n/a");
        assert_eq!(format_measure("n/a", "PERCENT"), "n/a");
        assert_eq!(format_measure("1.5", "WORK_DUR"), "1.5");
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_measure("3.14159", "FLOAT"), "3.1");
        assert_eq!(format_measure("3", "FLOAT"), "3.0");
    }
}
