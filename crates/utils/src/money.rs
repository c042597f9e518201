//! Money is stored and computed in integer cents.

/// Amount of `percent` percent of `cents`, rounded half away from zero.
pub fn apply_rate(cents: i64, percent: f64) -> i64 {
    (cents as f64 * percent / 100.0).round() as i64
}

/// Extended amount of a line item.
pub fn line_amount(quantity: f64, unit_price_cents: i64) -> i64 {
    (quantity * unit_price_cents as f64).round() as i64
}

/// "$1,234.50" style rendering for documents and e-mails.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let dollars = (abs / 100).to_string();
    let remainder = abs % 100;

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{remainder:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_grouping() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(123_450), "$1,234.50");
        assert_eq!(format_cents(100_000_000), "$1,000,000.00");
        assert_eq!(format_cents(-2_599), "-$25.99");
    }

    #[test]
    fn rate_rounds_half_away_from_zero() {
        assert_eq!(apply_rate(10_000, 8.25), 825);
        assert_eq!(apply_rate(1_001, 50.0), 501);
        assert_eq!(apply_rate(0, 12.0), 0);
    }

    #[test]
    fn line_amount_handles_fractional_quantities() {
        assert_eq!(line_amount(2.5, 1_999), 4_998);
        assert_eq!(line_amount(3.0, 12_500), 37_500);
    }
}
