use chrono::NaiveDate;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub y_ticks: usize,
    pub x_labels: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 420.0,
            margin: 64.0,
            y_ticks: 5,
            x_labels: 6,
        }
    }
}

pub struct Series<'a> {
    pub label: &'a str,
    pub color: &'a str,
    pub values: &'a [f64],
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compact axis label: 61200000 -> "61.2M".
pub fn compact(v: f64) -> String {
    let a = v.abs();
    if a >= 1e9 {
        format!("{:.1}B", v / 1e9)
    } else if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e3 {
        format!("{:.1}K", v / 1e3)
    } else {
        format!("{v:.1}")
    }
}

/// Multi-series line chart over a shared date axis. Non-finite values are
/// skipped when computing bounds and break nothing but their own vertex.
pub fn line_chart(opts: &ChartOptions, title: &str, dates: &[NaiveDate], series: &[Series<'_>]) -> String {
    let (w, h, m) = (opts.width, opts.height, opts.margin);
    let plot_w = w - 2.0 * m;
    let plot_h = h - 2.0 * m;

    let finite = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| v.is_finite());
    let (mut lo, mut hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        lo = 0.0;
        hi = 1.0;
    }
    if (hi - lo).abs() < f64::EPSILON {
        lo -= 1.0;
        hi += 1.0;
    }

    let n = dates.len();
    let x_at = |i: usize| {
        if n <= 1 {
            m + plot_w / 2.0
        } else {
            m + plot_w * (i as f64) / ((n - 1) as f64)
        }
    };
    let y_at = |v: f64| m + plot_h * (1.0 - (v - lo) / (hi - lo));

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="100%" role="img">"#
    );
    let _ = write!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="16" font-family="sans-serif">{}</text>"#,
        w / 2.0,
        m / 2.0,
        escape(title)
    );

    // Grid and y labels.
    let ticks = opts.y_ticks.max(1);
    for t in 0..=ticks {
        let v = lo + (hi - lo) * (t as f64) / (ticks as f64);
        let y = y_at(v);
        let _ = write!(
            out,
            r##"<line x1="{m}" y1="{y:.1}" x2="{}" y2="{y:.1}" stroke="#dddddd" stroke-width="0.5"/>"##,
            w - m
        );
        let _ = write!(
            out,
            r#"<text x="{}" y="{:.1}" text-anchor="end" font-size="10" font-family="sans-serif">{}</text>"#,
            m - 6.0,
            y + 3.0,
            compact(v)
        );
    }

    // X labels, evenly thinned.
    if n > 0 {
        let step = (n / opts.x_labels.max(1)).max(1);
        for i in (0..n).step_by(step) {
            let _ = write!(
                out,
                r#"<text x="{:.1}" y="{}" text-anchor="middle" font-size="10" font-family="sans-serif">{}</text>"#,
                x_at(i),
                h - m + 16.0,
                dates[i]
            );
        }
    }

    let _ = write!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="11" font-family="sans-serif">Date</text>"#,
        w / 2.0,
        h - m / 4.0
    );
    let _ = write!(
        out,
        r#"<text x="14" y="{}" text-anchor="middle" font-size="11" font-family="sans-serif" transform="rotate(-90 14 {})">Volume</text>"#,
        h / 2.0,
        h / 2.0
    );

    for s in series {
        let points: Vec<String> = s
            .values
            .iter()
            .take(n)
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| format!("{:.1},{:.1}", x_at(i), y_at(*v)))
            .collect();
        let _ = write!(
            out,
            r#"<polyline fill="none" stroke="{}" stroke-width="1.5" points="{}"/>"#,
            escape(s.color),
            points.join(" ")
        );
    }

    // Legend.
    for (i, s) in series.iter().enumerate() {
        let lx = m + 8.0 + 110.0 * i as f64;
        let ly = m + 8.0;
        let _ = write!(
            out,
            r#"<rect x="{lx}" y="{ly}" width="14" height="3" fill="{}"/>"#,
            escape(s.color)
        );
        let _ = write!(
            out,
            r#"<text x="{}" y="{}" font-size="11" font-family="sans-serif">{}</text>"#,
            lx + 18.0,
            ly + 4.0,
            escape(s.label)
        );
    }

    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap())
            .collect()
    }

    #[test]
    fn escapes_title_and_labels() {
        let svg = line_chart(
            &ChartOptions::default(),
            "<S&P>",
            &dates(2),
            &[Series {
                label: "a\"b",
                color: "#000",
                values: &[1.0, 2.0],
            }],
        );
        assert!(svg.contains("&lt;S&amp;P&gt;"));
        assert!(svg.contains("a&quot;b"));
        assert!(!svg.contains("<S&P>"));
    }

    #[test]
    fn one_polyline_per_series_and_skips_nan() {
        let svg = line_chart(
            &ChartOptions::default(),
            "t",
            &dates(3),
            &[
                Series {
                    label: "x",
                    color: "#111",
                    values: &[1.0, f64::NAN, 3.0],
                },
                Series {
                    label: "y",
                    color: "#222",
                    values: &[2.0, 2.0, 2.0],
                },
            ],
        );
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn flat_series_does_not_divide_by_zero() {
        let svg = line_chart(
            &ChartOptions::default(),
            "flat",
            &dates(1),
            &[Series {
                label: "x",
                color: "#111",
                values: &[5.0],
            }],
        );
        assert!(!svg.contains("inf"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn compact_labels() {
        assert_eq!(compact(61_200_000.0), "61.2M");
        assert_eq!(compact(1_500.0), "1.5K");
        assert_eq!(compact(2.5e9), "2.5B");
        assert_eq!(compact(12.0), "12.0");
    }
}
