use std::str::FromStr;
use tokio::time::Duration;

/// Parses a duration string such as "250ms", "15s", "10m", "2h" or "1d".
///
/// Supported units:
/// - `ms` for milliseconds
/// - `s` for seconds
/// - `m` for minutes
/// - `h` for hours
/// - `d` for days
pub fn parse_duration_string(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration string cannot be empty".to_string());
    }

    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("Missing duration unit in '{}'. Use 'ms', 's', 'm', 'h', or 'd'.", s))?;
    let (value_str, unit) = s.split_at(split_at);

    let value = u64::from_str(value_str)
        .map_err(|_| format!("Invalid numeric value in duration: '{}'", value_str))?;

    let secs_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "Unknown duration unit: '{}'. Use 'ms', 's', 'm', 'h', or 'd'.",
                unit
            ))
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration '{}' is too large", s))
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
///
/// Example: `" qwen3-32b, ,tiny-llama "` becomes `["qwen3-32b", "tiny-llama"]`.
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Formats a duration as seconds with two decimals, e.g. `1.25s`.
pub fn format_secs(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}
