//! Number formatting for answers and chart axes.

/// Render a count as a whole number with thousands separators.
///
/// The fractional part is truncated, so `1234.9` becomes `"1,234"`.
pub fn format_count(value: f64) -> String {
    let whole = value.trunc();
    let negative = whole < 0.0;
    let digits = format!("{:.0}", whole.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
