//! Small helpers for the fixed-width text tables the jobs print.

/// Truncate to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// Fraction as a percentage, e.g. `pct(0.1234, 1)` → `12.3%`.
pub fn pct(fraction: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, fraction * 100.0)
}

/// Optional statistic, or `-` when absent.
pub fn opt_f64(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

/// Dollar amount with thousands separators and no cents.
pub fn money(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        format!("-${out}")
    } else {
        format!("${out}")
    }
}

pub fn rule(width: usize) -> String {
    "-".repeat(width)
}
