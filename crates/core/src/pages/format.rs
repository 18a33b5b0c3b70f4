/// `{:.4}` rendering of a log-scale value.
pub fn format_log(v: f64) -> String {
    format!("{v:.4}")
}

/// Rounds to an integer and groups thousands: 1234567.4 -> "1,234,567".
pub fn format_volume(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let rounded = format!("{:.0}", v.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, c) in rounded.chars().enumerate() {
        if i != 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if v < 0.0 && grouped != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}
