use crate::domain::instrument::Instrument;
use crate::pages::Services;

pub struct ChartTab {
    pub instrument: Instrument,
    pub svg: anyhow::Result<String>,
}

/// One chart per instrument. A failing instrument only affects its own tab.
pub async fn render_charts(services: &Services) -> Vec<ChartTab> {
    let mut tabs = Vec::with_capacity(Instrument::ALL.len());
    for instrument in Instrument::ALL {
        let svg = services.charts.render(instrument).await;
        if let Err(err) = &svg {
            tracing::warn!(%instrument, error = %err, "chart render failed");
        }
        tabs.push(ChartTab { instrument, svg });
    }
    tabs
}
