//! Removal delay parsing, display and presets
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.0.0: Duration parsing adapted for minute-granularity removal delays

/// A removal delay offered to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalPreset {
    pub id: &'static str,
    pub minutes: u32,
}

impl RemovalPreset {
    /// Human-readable label, e.g. "2 hours"
    pub fn label(&self) -> String {
        format_minutes(i64::from(self.minutes))
    }
}

/// Delays offered by the interactive schedule prompt
pub const REMOVAL_PRESETS: [RemovalPreset; 7] = [
    RemovalPreset { id: "5min", minutes: 5 },
    RemovalPreset { id: "15min", minutes: 15 },
    RemovalPreset { id: "30min", minutes: 30 },
    RemovalPreset { id: "1hour", minutes: 60 },
    RemovalPreset { id: "2hours", minutes: 120 },
    RemovalPreset { id: "4hours", minutes: 240 },
    RemovalPreset { id: "8hours", minutes: 480 },
];

/// Index into [`REMOVAL_PRESETS`] selected by default (30 minutes)
pub const DEFAULT_PRESET: usize = 2;

/// Parse a removal delay into minutes.
///
/// Accepts a bare number of minutes (`"30"`, `"0"`, `"-1"`), the words
/// `none`/`never`/`off` (zero), or unit-suffixed parts such as `30m`, `2h`,
/// `1d`, `1w` and combinations like `1h30m`. Zero or less means "do not
/// schedule a removal"; callers decide what to do with it.
pub fn parse_delay_minutes(input: &str) -> Option<i64> {
    let input = input.trim().to_lowercase();

    if matches!(input.as_str(), "none" | "never" | "off") {
        return Some(0);
    }

    if let Ok(minutes) = input.parse::<i64>() {
        return Some(minutes);
    }

    let mut total_minutes: i64 = 0;
    let mut current_number = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
        } else if !current_number.is_empty() {
            let value: i64 = current_number.parse().ok()?;
            current_number.clear();

            let minutes = match c {
                'm' => value,
                'h' => value.checked_mul(60)?,
                'd' => value.checked_mul(60 * 24)?,
                'w' => value.checked_mul(60 * 24 * 7)?,
                _ => return None,
            };
            total_minutes = total_minutes.checked_add(minutes)?;
        } else {
            return None;
        }
    }

    // A trailing number without a unit is ambiguous ("1h30")
    if !current_number.is_empty() {
        return None;
    }

    if total_minutes > 0 {
        Some(total_minutes)
    } else {
        None
    }
}

/// Format a delay in minutes into a human-readable string
pub fn format_minutes(minutes: i64) -> String {
    fn plural(n: i64) -> &'static str {
        if n == 1 {
            ""
        } else {
            "s"
        }
    }

    if minutes < 60 {
        format!("{} minute{}", minutes, plural(minutes))
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins > 0 {
            format!(
                "{} hour{} {} minute{}",
                hours,
                plural(hours),
                mins,
                plural(mins)
            )
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = minutes / 1440;
        let hours = (minutes % 1440) / 60;
        if hours > 0 {
            format!(
                "{} day{} {} hour{}",
                days,
                plural(days),
                hours,
                plural(hours)
            )
        } else {
            format!("{} day{}", days, plural(days))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_minutes() {
        assert_eq!(parse_delay_minutes("30"), Some(30));
        assert_eq!(parse_delay_minutes(" 45 "), Some(45));
        assert_eq!(parse_delay_minutes("0"), Some(0));
        assert_eq!(parse_delay_minutes("-1"), Some(-1));
    }

    #[test]
    fn test_parse_no_removal_words() {
        assert_eq!(parse_delay_minutes("none"), Some(0));
        assert_eq!(parse_delay_minutes("Never"), Some(0));
        assert_eq!(parse_delay_minutes("off"), Some(0));
    }

    #[test]
    fn test_parse_unit_suffixes() {
        assert_eq!(parse_delay_minutes("30m"), Some(30));
        assert_eq!(parse_delay_minutes("2h"), Some(120));
        assert_eq!(parse_delay_minutes("1d"), Some(1440));
        assert_eq!(parse_delay_minutes("1w"), Some(10080));
        assert_eq!(parse_delay_minutes("1h30m"), Some(90));
        assert_eq!(parse_delay_minutes("1H30M"), Some(90));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_delay_minutes("soon"), None);
        assert_eq!(parse_delay_minutes(""), None);
        assert_eq!(parse_delay_minutes("30s"), None);
        assert_eq!(parse_delay_minutes("1h30"), None);
        assert_eq!(parse_delay_minutes("0m"), None);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(1), "1 minute");
        assert_eq!(format_minutes(30), "30 minutes");
        assert_eq!(format_minutes(60), "1 hour");
        assert_eq!(format_minutes(90), "1 hour 30 minutes");
        assert_eq!(format_minutes(61), "1 hour 1 minute");
        assert_eq!(format_minutes(1440), "1 day");
        assert_eq!(format_minutes(1500), "1 day 1 hour");
    }

    #[test]
    fn test_preset_labels() {
        let labels: Vec<String> = REMOVAL_PRESETS.iter().map(|p| p.label()).collect();
        assert_eq!(
            labels,
            vec![
                "5 minutes",
                "15 minutes",
                "30 minutes",
                "1 hour",
                "2 hours",
                "4 hours",
                "8 hours"
            ]
        );
        assert_eq!(REMOVAL_PRESETS[DEFAULT_PRESET].minutes, 30);
    }
}
