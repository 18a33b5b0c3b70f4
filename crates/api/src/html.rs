use chrono::NaiveDate;
use std::fmt::Write;
use volcast_core::chart::svg::escape;
use volcast_core::domain::instrument::Instrument;
use volcast_core::domain::prediction::PredictionSet;
use volcast_core::pages::features::FeatureTable;
use volcast_core::pages::format::{format_log, format_volume};
use volcast_core::pages::visualization::ChartTab;
use volcast_core::time::us_market::{FEATURE_DATE_MAX, FEATURE_DATE_MIN};

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; color: #222; }
nav { background: #0e1117; padding: 10px 24px; }
nav a { color: #fafafa; margin-right: 18px; text-decoration: none; }
main { padding: 16px 24px; max-width: 1100px; }
.error { background: #fde8e8; color: #8a1c1c; padding: 10px 14px; border-radius: 6px; }
.success { background: #e6f4ea; color: #1e5631; padding: 10px 14px; border-radius: 6px; }
table { border-collapse: collapse; margin-top: 12px; }
th, td { border: 1px solid #ddd; padding: 4px 10px; text-align: right; font-variant-numeric: tabular-nums; }
th { background: #f4f4f6; }
.tabs input { display: none; }
.tabs label { display: inline-block; padding: 8px 16px; cursor: pointer; border-bottom: 2px solid transparent; }
.tabs input:checked + label { border-bottom-color: #ff4b4b; font-weight: bold; }
.tab { display: none; padding-top: 12px; }
.metric { display: inline-block; margin-right: 40px; }
.metric .label { font-size: 13px; color: #555; }
.metric .value { font-size: 30px; }
"#;

pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html><html><head><meta charset="utf-8"><title>{title}</title><style>{STYLE}</style></head><body><nav><a href="/">Home</a><a href="/visualization">Model Visualization</a><a href="/features">Get Features</a><a href="/predict">Predict Volume</a></nav><main>{body}</main></body></html>"#,
        title = escape(title)
    )
}

pub fn error_banner(prefix: &str, message: &str) -> String {
    format!(r#"<p class="error">{}: {}</p>"#, escape(prefix), escape(message))
}

/// CSS-only tab strip; each panel body is raw HTML.
fn tabs(group: &str, panels: &[(String, String)]) -> String {
    let mut out = String::from(r#"<div class="tabs">"#);
    let mut css = String::new();
    for (i, (label, _)) in panels.iter().enumerate() {
        let id = format!("{group}-{i}");
        let checked = if i == 0 { " checked" } else { "" };
        let _ = write!(
            out,
            r#"<input type="radio" name="{group}" id="{id}"{checked}><label for="{id}">{}</label>"#,
            escape(label)
        );
        let _ = write!(css, "#{id}:checked ~ #{id}-panel {{ display: block; }}");
    }
    for (i, (_, body)) in panels.iter().enumerate() {
        let _ = write!(out, r#"<div class="tab" id="{group}-{i}-panel">{body}</div>"#);
    }
    out.push_str("</div>");
    format!("<style>{css}</style>{out}")
}

pub fn index_page() -> String {
    layout(
        "Volume Dashboard",
        r#"<h1>ETF Trading Volume Dashboard</h1>
<p>Predicted and actual trading volumes for SPY, SSO and UPRO.</p>
<ul>
<li><a href="/visualization">Prediction vs actual charts</a></li>
<li><a href="/features">Feature row for a date</a></li>
<li><a href="/predict">Predict volume for a date</a></li>
</ul>"#,
    )
}

pub fn visualization_page(charts: &[ChartTab]) -> String {
    let panels: Vec<(String, String)> = charts
        .iter()
        .map(|tab| {
            let body = match &tab.svg {
                Ok(svg) => format!("<h2>{} Prediction vs Actual</h2>{svg}", tab.instrument),
                Err(err) => error_banner("Error rendering chart", &format!("{err:#}")),
            };
            (tab.instrument.symbol().to_string(), body)
        })
        .collect();

    let body = format!(
        "<h1>Prediction vs Actual Visualization</h1><p>Validation plots comparing predicted vs actual trading volumes for SPY, SSO, and UPRO.</p>{}",
        tabs("viz", &panels)
    );
    layout("Model Visualization", &body)
}

fn instrument_options(selected: Instrument) -> String {
    Instrument::ALL
        .iter()
        .map(|i| {
            let sel = if *i == selected { " selected" } else { "" };
            format!(r#"<option value="{i}"{sel}>{i}</option>"#)
        })
        .collect()
}

pub fn features_page(
    date: NaiveDate,
    instrument: Instrument,
    outcome: Option<Result<FeatureTable, String>>,
) -> String {
    let mut body = format!(
        r#"<h1>Get Features for a Specific Date</h1>
<form method="get" action="/features">
<label>Select a date: <input type="date" name="date" value="{date}" min="{FEATURE_DATE_MIN}" max="{FEATURE_DATE_MAX}"></label>
<select name="instrument">{}</select>
<button type="submit">Get Features</button>
</form>"#,
        instrument_options(instrument)
    );

    match outcome {
        None => {}
        Some(Ok(table)) => {
            body.push_str(r#"<p class="success">Features successfully generated!</p>"#);
            body.push_str(&feature_table(&table));
        }
        Some(Err(message)) => {
            body.push_str(&error_banner(
                volcast_core::pages::features::ERROR_PREFIX,
                &message,
            ));
        }
    }

    layout("Get Features", &body)
}

fn feature_table(table: &FeatureTable) -> String {
    let mut out = String::from("<table><thead><tr><th>date</th><th>ticker</th>");
    for c in &table.columns {
        let _ = write!(out, "<th>{}</th>", escape(&c.name));
    }
    let _ = write!(
        out,
        "</tr></thead><tbody><tr><td>{}</td><td>{}</td>",
        table.date, table.instrument
    );
    for c in &table.columns {
        let _ = write!(out, "<td>{}</td>", c.value);
    }
    out.push_str("</tr></tbody></table>");
    out
}

pub fn predict_page(date: NaiveDate, outcome: Option<Result<PredictionSet, String>>) -> String {
    let mut body = format!(
        r#"<h1>Predict Trading Volume</h1>
<form method="get" action="/predict">
<label>Select a date to predict: <input type="date" name="date" value="{date}"></label>
<button type="submit">Predict Volume</button>
</form>"#
    );

    match outcome {
        None => {}
        Some(Ok(set)) => {
            let panels: Vec<(String, String)> = set
                .predictions
                .iter()
                .map(|p| {
                    let panel = format!(
                        r#"<h2>{} Prediction</h2>
<div class="metric"><div class="label">Predicted log(volume+1)</div><div class="value">{}</div></div>
<div class="metric"><div class="label">Predicted volume</div><div class="value">{}</div></div>"#,
                        p.instrument,
                        format_log(p.pred_log),
                        format_volume(p.pred_vol)
                    );
                    (p.instrument.symbol().to_string(), panel)
                })
                .collect();
            body.push_str(&tabs("pred", &panels));
        }
        // Stage prefix is already part of the message.
        Some(Err(message)) => {
            let _ = write!(body, r#"<p class="error">{}</p>"#, escape(&message));
        }
    }

    layout("Predict Volume", &body)
}
