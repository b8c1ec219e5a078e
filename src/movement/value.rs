/// Parse a number the way a form field does: surrounding whitespace is
/// ignored, the longest numeric prefix wins, and anything unusable is 0.
///
/// `"12.5"` → 12.5, `" 40kWh"` → 40.0, `"abc"` → 0.0, `""` → 0.0.
pub fn parse_lenient(input: &str) -> f64 {
    let trimmed = input.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        return finite_or_zero(value);
    }

    let prefix_len = numeric_prefix_len(trimmed);
    trimmed[..prefix_len]
        .parse::<f64>()
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Length in bytes of the leading `[+-]digits[.digits][e[+-]digits]` run.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut seen_digit = end > digits_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || seen_digit {
            seen_digit = seen_digit || frac_end > frac_start;
            end = frac_end;
        }
    }

    if !seen_digit {
        return 0;
    }

    // Exponent only counts when followed by at least one digit.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    end
}

/// Format a stored quantity for display: whole numbers without a fraction,
/// everything else with up to two decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{:.2}", value);
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse_lenient("100"), 100.0);
        assert_eq!(parse_lenient(" 12.5 "), 12.5);
        assert_eq!(parse_lenient("-3"), -3.0);
        assert_eq!(parse_lenient(".5"), 0.5);
    }

    #[test]
    fn test_parse_numeric_prefix() {
        assert_eq!(parse_lenient("40kWh"), 40.0);
        assert_eq!(parse_lenient("7.25 units"), 7.25);
        assert_eq!(parse_lenient("1e3x"), 1000.0);
        assert_eq!(parse_lenient("2e"), 2.0);
    }

    #[test]
    fn test_parse_garbage_is_zero() {
        assert_eq!(parse_lenient(""), 0.0);
        assert_eq!(parse_lenient("abc"), 0.0);
        assert_eq!(parse_lenient("-"), 0.0);
        assert_eq!(parse_lenient("."), 0.0);
        assert_eq!(parse_lenient("NaN"), 0.0);
        assert_eq!(parse_lenient("inf"), 0.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(150.0), "150");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(0.126), "0.13");
        assert_eq!(format_number(-20.0), "-20");
    }
}
