//! HTML chart rendering
//!
//! Charts are plotly figures serialized to self-contained HTML, returned
//! directly from the prediction and analysis endpoints.

use plotly::common::{Line, Mode, Title};
use plotly::layout::Axis;
use plotly::{HeatMap, Layout, Plot, Scatter, Surface};

use crate::analysis::{AnalysisReport, HourDaySurface};
use crate::forecast::PredictionOutcome;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

fn axis(title: &str) -> Axis {
    Axis::new().title(Title::with_text(title))
}

fn line_trace<X, Y>(x: Vec<X>, y: Vec<Y>, name: &str, color: &'static str) -> Box<Scatter<X, Y>>
where
    X: serde::Serialize + Clone + 'static,
    Y: serde::Serialize + Clone + 'static,
{
    Scatter::new(x, y)
        .name(name)
        .mode(Mode::LinesMarkers)
        .line(Line::new().color(color))
}

/// Actual vs predicted values for the scored horizon
pub fn prediction_plot(outcome: &PredictionOutcome) -> Plot {
    let x: Vec<String> = outcome.timestamps.iter().map(|t| t.to_string()).collect();

    let mut plot = Plot::new();
    plot.add_trace(line_trace(x.clone(), outcome.observed.clone(), "Actual", "blue"));
    plot.add_trace(line_trace(x, outcome.predicted.clone(), "Predicted", "red"));
    plot.set_layout(
        Layout::new()
            .title(Title::with_text(&format!(
                "{} forecast for {} hours ({})",
                outcome.model_type, outcome.forecast_horizon, outcome.metrics
            )))
            .x_axis(axis("Time"))
            .y_axis(axis("Value")),
    );
    plot
}

pub fn prediction_html(outcome: &PredictionOutcome) -> String {
    prediction_plot(outcome).to_html()
}

fn surface_plot(surface: &HourDaySurface, title: &str) -> Plot {
    let z: Vec<Vec<Option<f64>>> = surface.values.clone();
    let mut plot = Plot::new();
    plot.add_trace(
        Surface::new(z)
            .x(surface.days_of_year.clone())
            .y(surface.hours.clone())
            .show_scale(false),
    );
    plot.set_layout(Layout::new().title(Title::with_text(title)));
    plot
}

/// Every figure of the analysis page, in display order
pub fn analysis_plots(report: &AnalysisReport) -> Vec<(&'static str, Plot)> {
    let mut correlation = Plot::new();
    correlation.add_trace(
        HeatMap::new(
            report.correlation.columns.clone(),
            report.correlation.columns.clone(),
            report.correlation.values.clone(),
        )
        .show_scale(false),
    );
    correlation.set_layout(Layout::new().title(Title::with_text("Correlation matrix")));

    let x: Vec<String> = report.plan_fact.timestamps.iter().map(|t| t.to_string()).collect();
    let mut comparison = Plot::new();
    comparison.add_trace(line_trace(x.clone(), report.plan_fact.plan.clone(), "Plan", "royalblue"));
    comparison.add_trace(line_trace(x, report.plan_fact.fact.clone(), "Fact", "firebrick"));
    comparison.set_layout(
        Layout::new()
            .title(Title::with_text("Plan and fact comparison"))
            .x_axis(axis("Time"))
            .y_axis(axis("Value (MWh)")),
    );

    let days: Vec<String> = report.daily_plan_fact.days.iter().map(|d| d.to_string()).collect();
    let mut daily = Plot::new();
    daily.add_trace(line_trace(days.clone(), report.daily_plan_fact.plan.clone(), "Plan", "blue"));
    daily.add_trace(line_trace(days, report.daily_plan_fact.fact.clone(), "Fact", "orange"));
    daily.set_layout(
        Layout::new()
            .title(Title::with_text("Daily mean plan vs fact"))
            .x_axis(axis("Day"))
            .y_axis(axis("Value (MWh)")),
    );

    vec![
        ("correlation", correlation),
        ("weather", surface_plot(&report.temperature_surface, "Weather data (temperature)")),
        ("generation", surface_plot(&report.generation_surface, "Solar generation")),
        ("comparison", comparison),
        ("daily", daily),
    ]
}

/// Analysis page: all figures stacked in one document
pub fn analysis_html(report: &AnalysisReport) -> String {
    let body: String = analysis_plots(report)
        .into_iter()
        .map(|(id, plot)| plot.to_inline_html(Some(id)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n\
         <title>Analysis results</title>\n<script src=\"{PLOTLY_CDN}\"></script>\n</head>\n\
         <body>\n<h1>Analysis results</h1>\n<p>{} rows</p>\n{body}\n</body>\n</html>\n",
        report.row_count
    )
}
