//! Life-trajectory chart for one agent.
//!
//! Layout and drawing are split: [`TrajectoryPlotRenderer::layout`] computes
//! every coordinate, and [`TrajectoryPlot::draw`] replays them onto any
//! [`PlotCanvas`]. [`SvgCanvas`] is the canvas used for export.

use bevy::math::Vec2;
use mobility_events::HistorySample;
use std::fmt::Write as _;
use std::path::Path;

const GRID_COLOR: &str = "#374151";
const AXIS_COLOR: &str = "#9ca3af";
const TICK_TEXT_COLOR: &str = "#d1d5db";
const TITLE_COLOR: &str = "#f3f4f6";
const BACKGROUND: &str = "#1f2937";

const VERTICAL_GRID_LINES: usize = 5;
const HORIZONTAL_GRID_LINES: usize = 4;
const SERIES_WIDTH: f32 = 2.5;
const POINT_RADIUS: f32 = 3.0;
const LEGEND_WIDTH: f32 = 150.0;
const LEGEND_SPACING: f32 = 20.0;
const LEGEND_LINE: f32 = 30.0;

/// Tracked per-sample metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Confidence,
    Competence,
    Aspiration,
    RiskTolerance,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Confidence,
        Metric::Competence,
        Metric::Aspiration,
        Metric::RiskTolerance,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Confidence => "Confidence",
            Metric::Competence => "Competence",
            Metric::Aspiration => "Aspiration",
            Metric::RiskTolerance => "Risk Tolerance",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Metric::Confidence => "#60a5fa",
            Metric::Competence => "#34d399",
            Metric::Aspiration => "#fbbf24",
            Metric::RiskTolerance => "#f87171",
        }
    }

    pub fn sample(&self, sample: &HistorySample) -> f32 {
        let value = match self {
            Metric::Confidence => sample.confidence,
            Metric::Competence => sample.competence,
            Metric::Aspiration => sample.aspiration,
            Metric::RiskTolerance => sample.risk_tolerance,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    fn as_svg(&self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: &'static str,
    pub size: f32,
    pub bold: bool,
    pub anchor: TextAnchor,
    /// Clockwise rotation in degrees around the anchor point
    pub rotation: f32,
}

impl TextStyle {
    fn tick(anchor: TextAnchor) -> Self {
        Self {
            color: TICK_TEXT_COLOR,
            size: 12.0,
            bold: false,
            anchor,
            rotation: 0.0,
        }
    }

    fn title() -> Self {
        Self {
            color: TITLE_COLOR,
            size: 14.0,
            bold: true,
            anchor: TextAnchor::Middle,
            rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotLine {
    pub from: Vec2,
    pub to: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotText {
    pub position: Vec2,
    pub text: String,
    pub style: TextStyle,
}

/// One metric's polyline in canvas pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLayout {
    pub metric: Metric,
    pub points: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub metric: Metric,
    pub line: PlotLine,
    pub label: PlotText,
}

/// Fully computed chart geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub width: f32,
    pub height: f32,
    pub min_age: f32,
    pub max_age: f32,
    pub grid: Vec<PlotLine>,
    /// Left and bottom axis as one polyline
    pub axes: [Vec2; 3],
    pub texts: Vec<PlotText>,
    pub series: Vec<SeriesLayout>,
    pub legend: Vec<LegendEntry>,
}

/// Result of laying out a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryPlot {
    /// History is empty; nothing is drawn
    NoData,
    Chart(ChartLayout),
}

impl TrajectoryPlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, TrajectoryPlot::NoData)
    }

    /// Replays the chart onto a canvas. Returns false, without touching the
    /// canvas, when there is no data.
    pub fn draw<C: PlotCanvas>(&self, canvas: &mut C) -> bool {
        let TrajectoryPlot::Chart(chart) = self else {
            return false;
        };

        for line in &chart.grid {
            canvas.line(line.from, line.to, GRID_COLOR, 1.0);
        }
        canvas.polyline(&chart.axes, AXIS_COLOR, 2.0);
        for text in &chart.texts {
            canvas.text(text.position, &text.text, &text.style);
        }
        for series in &chart.series {
            canvas.polyline(&series.points, series.metric.color(), SERIES_WIDTH);
            for point in &series.points {
                canvas.circle(*point, POINT_RADIUS, series.metric.color());
            }
        }
        for entry in &chart.legend {
            canvas.line(entry.line.from, entry.line.to, entry.metric.color(), SERIES_WIDTH);
            canvas.text(entry.label.position, &entry.label.text, &entry.label.style);
        }
        true
    }
}

/// Drawing surface for trajectory charts.
pub trait PlotCanvas {
    fn line(&mut self, from: Vec2, to: Vec2, color: &str, width: f32);
    fn polyline(&mut self, points: &[Vec2], color: &str, width: f32);
    fn circle(&mut self, center: Vec2, radius: f32, color: &str);
    fn text(&mut self, position: Vec2, text: &str, style: &TextStyle);
}

/// Computes chart geometry for a history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPlotRenderer {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
}

impl Default for TrajectoryPlotRenderer {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 300.0,
            padding: 40.0,
        }
    }
}

impl TrajectoryPlotRenderer {
    pub fn layout(&self, history: &[HistorySample]) -> TrajectoryPlot {
        if history.is_empty() {
            return TrajectoryPlot::NoData;
        }

        let (w, h, pad) = (self.width, self.height, self.padding);
        let graph = Vec2::new(w - pad * 2.0, h - pad * 2.0);
        let bottom = h - pad;

        let min_age = history.iter().map(|s| s.age).fold(f32::INFINITY, f32::min);
        let max_age = history.iter().map(|s| s.age).fold(f32::NEG_INFINITY, f32::max);
        let age_span = max_age - min_age;

        let x_of = |age: f32| {
            if age_span > f32::EPSILON {
                pad + (age - min_age) / age_span * graph.x
            } else {
                pad + graph.x / 2.0
            }
        };
        let y_of = |value: f32| bottom - value * graph.y;

        let mut grid = Vec::with_capacity(VERTICAL_GRID_LINES + HORIZONTAL_GRID_LINES + 2);
        for i in 0..=VERTICAL_GRID_LINES {
            let x = pad + graph.x / VERTICAL_GRID_LINES as f32 * i as f32;
            grid.push(PlotLine {
                from: Vec2::new(x, pad),
                to: Vec2::new(x, bottom),
            });
        }
        for i in 0..=HORIZONTAL_GRID_LINES {
            let y = pad + graph.y / HORIZONTAL_GRID_LINES as f32 * i as f32;
            grid.push(PlotLine {
                from: Vec2::new(pad, y),
                to: Vec2::new(w - pad, y),
            });
        }

        let mut texts = Vec::new();
        for i in 0..=HORIZONTAL_GRID_LINES {
            let y = bottom - graph.y / HORIZONTAL_GRID_LINES as f32 * i as f32;
            texts.push(PlotText {
                position: Vec2::new(pad - 10.0, y + 4.0),
                text: format!("{}%", i * 25),
                style: TextStyle::tick(TextAnchor::End),
            });
        }
        for i in 0..=VERTICAL_GRID_LINES {
            let fraction = i as f32 / VERTICAL_GRID_LINES as f32;
            let age = min_age + age_span * fraction;
            texts.push(PlotText {
                position: Vec2::new(pad + graph.x * fraction, bottom + 20.0),
                text: format!("{}", age.round() as i64),
                style: TextStyle::tick(TextAnchor::Middle),
            });
        }
        texts.push(PlotText {
            position: Vec2::new(w / 2.0, h - 5.0),
            text: "Age".into(),
            style: TextStyle::title(),
        });
        texts.push(PlotText {
            position: Vec2::new(15.0, h / 2.0),
            text: "Value (%)".into(),
            style: TextStyle {
                rotation: -90.0,
                ..TextStyle::title()
            },
        });

        let series = Metric::ALL
            .iter()
            .map(|&metric| SeriesLayout {
                metric,
                points: history
                    .iter()
                    .map(|s| Vec2::new(x_of(s.age), y_of(metric.sample(s))))
                    .collect(),
            })
            .collect();

        let legend_x = w - pad - LEGEND_WIDTH;
        let legend = Metric::ALL
            .iter()
            .enumerate()
            .map(|(i, &metric)| {
                let y = pad + 10.0 + i as f32 * LEGEND_SPACING;
                LegendEntry {
                    metric,
                    line: PlotLine {
                        from: Vec2::new(legend_x, y),
                        to: Vec2::new(legend_x + LEGEND_LINE, y),
                    },
                    label: PlotText {
                        position: Vec2::new(legend_x + 40.0, y + 4.0),
                        text: metric.label().into(),
                        style: TextStyle {
                            color: TITLE_COLOR,
                            ..TextStyle::tick(TextAnchor::Start)
                        },
                    },
                }
            })
            .collect();

        TrajectoryPlot::Chart(ChartLayout {
            width: w,
            height: h,
            min_age,
            max_age,
            grid,
            axes: [
                Vec2::new(pad, pad),
                Vec2::new(pad, bottom),
                Vec2::new(w - pad, bottom),
            ],
            texts,
            series,
            legend,
        })
    }
}

/// Errors that can occur while exporting a chart.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no trajectory data to export")]
    NoData,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Canvas that accumulates an SVG document.
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    width: f32,
    height: f32,
    body: String,
}

impl SvgCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    /// Completes the document.
    pub fn finish(self) -> String {
        format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<rect width="100%" height="100%" fill="{BACKGROUND}"/>
{body}</svg>
"##,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

impl PlotCanvas for SvgCanvas {
    fn line(&mut self, from: Vec2, to: Vec2, color: &str, width: f32) {
        let _ = writeln!(
            self.body,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{color}" stroke-width="{width}"/>"#,
            from.x, from.y, to.x, to.y
        );
    }

    fn polyline(&mut self, points: &[Vec2], color: &str, width: f32) {
        let coords: Vec<String> = points.iter().map(|p| format!("{:.1},{:.1}", p.x, p.y)).collect();
        let _ = writeln!(
            self.body,
            r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="{width}"/>"#,
            coords.join(" ")
        );
    }

    fn circle(&mut self, center: Vec2, radius: f32, color: &str) {
        let _ = writeln!(
            self.body,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{radius}" fill="{color}"/>"#,
            center.x, center.y
        );
    }

    fn text(&mut self, position: Vec2, text: &str, style: &TextStyle) {
        let weight = if style.bold { "bold" } else { "normal" };
        let transform = if style.rotation != 0.0 {
            format!(
                r#" transform="rotate({} {:.1} {:.1})""#,
                style.rotation, position.x, position.y
            )
        } else {
            String::new()
        };
        let _ = writeln!(
            self.body,
            r#"<text x="{:.1}" y="{:.1}" fill="{}" font-family="Arial" font-size="{}" font-weight="{weight}" text-anchor="{}"{transform}>{}</text>"#,
            position.x,
            position.y,
            style.color,
            style.size,
            style.anchor.as_svg(),
            escape_xml(text)
        );
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a plot to an SVG string, or `None` when there is no data.
pub fn render_svg(plot: &TrajectoryPlot) -> Option<String> {
    let TrajectoryPlot::Chart(chart) = plot else {
        return None;
    };
    let mut canvas = SvgCanvas::new(chart.width, chart.height);
    plot.draw(&mut canvas);
    Some(canvas.finish())
}

/// Writes a plot as an SVG file.
pub fn write_svg(plot: &TrajectoryPlot, path: &Path) -> Result<(), ExportError> {
    let svg = render_svg(plot).ok_or(ExportError::NoData)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, svg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(age: f32, confidence: f32) -> HistorySample {
        HistorySample {
            age,
            confidence,
            competence: 0.5,
            aspiration: 0.25,
            risk_tolerance: 1.0,
        }
    }

    #[derive(Default)]
    struct CountingCanvas {
        calls: usize,
    }

    impl PlotCanvas for CountingCanvas {
        fn line(&mut self, _: Vec2, _: Vec2, _: &str, _: f32) {
            self.calls += 1;
        }
        fn polyline(&mut self, _: &[Vec2], _: &str, _: f32) {
            self.calls += 1;
        }
        fn circle(&mut self, _: Vec2, _: f32, _: &str) {
            self.calls += 1;
        }
        fn text(&mut self, _: Vec2, _: &str, _: &TextStyle) {
            self.calls += 1;
        }
    }

    fn chart(plot: &TrajectoryPlot) -> &ChartLayout {
        match plot {
            TrajectoryPlot::Chart(chart) => chart,
            TrajectoryPlot::NoData => panic!("expected a chart"),
        }
    }

    #[test]
    fn test_empty_history_is_no_data() {
        let plot = TrajectoryPlotRenderer::default().layout(&[]);
        assert_eq!(plot, TrajectoryPlot::NoData);

        let mut canvas = CountingCanvas::default();
        assert!(!plot.draw(&mut canvas));
        assert_eq!(canvas.calls, 0);
        assert!(render_svg(&plot).is_none());
    }

    #[test]
    fn test_single_sample_maps_to_midpoint() {
        let plot = TrajectoryPlotRenderer::default().layout(&[sample(12.0, 0.5)]);
        let chart = chart(&plot);
        let point = chart.series[0].points[0];
        assert_eq!(point.x, 300.0);
        assert_eq!(point.y, 260.0 - 0.5 * 220.0);
        assert!(point.x.is_finite() && point.y.is_finite());
    }

    #[test]
    fn test_series_span_the_graph() {
        let history = [sample(10.0, 0.0), sample(15.0, 0.5), sample(20.0, 1.0)];
        let plot = TrajectoryPlotRenderer::default().layout(&history);
        let chart = chart(&plot);

        assert_eq!(chart.series.len(), 4);
        let confidence = &chart.series[0];
        assert_eq!(confidence.metric, Metric::Confidence);
        assert_eq!(confidence.points[0], Vec2::new(40.0, 260.0));
        assert_eq!(confidence.points[2], Vec2::new(560.0, 40.0));
        assert_eq!((chart.min_age, chart.max_age), (10.0, 20.0));
    }

    #[test]
    fn test_grid_ticks_and_legend() {
        let history = [sample(10.0, 0.2), sample(20.0, 0.4)];
        let plot = TrajectoryPlotRenderer::default().layout(&history);
        let chart = chart(&plot);

        assert_eq!(chart.grid.len(), 6 + 5);
        let texts: Vec<&str> = chart.texts.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"0%"));
        assert!(texts.contains(&"100%"));
        assert!(texts.contains(&"12"));
        assert!(texts.contains(&"20"));
        assert_eq!(chart.legend.len(), 4);
        assert_eq!(chart.legend[0].line.from, Vec2::new(410.0, 50.0));
        assert_eq!(chart.legend[3].label.text, "Risk Tolerance");
    }

    #[test]
    fn test_svg_contains_series_colors() {
        let history = [sample(10.0, 0.2), sample(11.0, 0.3)];
        let svg = render_svg(&TrajectoryPlotRenderer::default().layout(&history)).unwrap();
        assert!(svg.starts_with("<svg"));
        for metric in Metric::ALL {
            assert!(svg.contains(metric.color()));
        }
        assert!(svg.contains("rotate(-90"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & c>"), "a&lt;b &amp; c&gt;");
    }
}
