//! Lightweight painter-based plots for the spectrum, time and IQ views.

use std::ops::RangeInclusive;

use eframe::egui::{Align2, FontId, ProgressBar, Rect, Response, Sense, Ui, Vec2, pos2};
use eframe::epaint::{Color32, CornerRadius, Pos2, Shape, Stroke};

const BACKGROUND: Color32 = Color32::from_gray(16);
const GRID: Color32 = Color32::from_gray(60);
const LABEL: Color32 = Color32::from_gray(170);
const TRACE_I: Color32 = Color32::from_rgb(0x4f, 0xc3, 0xf7);
const TRACE_Q: Color32 = Color32::from_rgb(0xff, 0xb7, 0x4d);

/// One series to draw: x values, y values and a color.
pub struct Trace<'a> {
    pub xs: &'a [f64],
    pub ys: &'a [f32],
    pub color: Color32,
}

/// Draw `traces` against shared axes. `y_range` fixes the vertical scale;
/// otherwise it is fitted to the data.
pub fn line_plot(
    ui: &mut Ui,
    title: &str,
    height: f32,
    traces: &[Trace<'_>],
    y_range: Option<RangeInclusive<f32>>,
) -> Response {
    let size = Vec2::new(ui.available_width(), height);
    let (response, painter) = ui.allocate_painter(size, Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, CornerRadius::ZERO, BACKGROUND);
    draw_grid(&painter, rect);

    let x_range = traces
        .iter()
        .filter_map(|t| Some(*t.xs.first()?..=*t.xs.last()?))
        .next()
        .unwrap_or(0.0..=1.0);
    let y_range = y_range
        .or_else(|| value_range(traces.iter().flat_map(|t| t.ys.iter().copied())))
        .unwrap_or(-1.0..=1.0);

    for trace in traces {
        let points = to_screen(trace.xs, trace.ys, &x_range, &y_range, rect);
        if points.len() > 1 {
            painter.add(Shape::line(points, Stroke::new(1.0, trace.color)));
        }
    }

    let font = FontId::monospace(10.0);
    painter.text(rect.left_top() + Vec2::splat(4.0), Align2::LEFT_TOP, title, font.clone(), LABEL);
    painter.text(
        rect.left_bottom() + Vec2::new(4.0, -4.0),
        Align2::LEFT_BOTTOM,
        format!("{:.3}", x_range.start()),
        font.clone(),
        LABEL,
    );
    painter.text(
        rect.right_bottom() + Vec2::new(-4.0, -4.0),
        Align2::RIGHT_BOTTOM,
        format!("{:.3}", x_range.end()),
        font.clone(),
        LABEL,
    );
    painter.text(
        rect.right_top() + Vec2::new(-4.0, 4.0),
        Align2::RIGHT_TOP,
        format!("{:.1}", y_range.end()),
        font,
        LABEL,
    );
    response
}

/// Frequency sink: PSD in dB against frequency in MHz.
pub fn spectrum_plot(ui: &mut Ui, freq_mhz: &[f64], spectrum: &[f32], height: f32) -> Response {
    let trace = Trace {
        xs: freq_mhz,
        ys: spectrum,
        color: TRACE_I,
    };
    line_plot(ui, "PSD [dB] / frequency [MHz]", height, &[trace], None)
}

/// Time sink: I and Q against time in ms.
pub fn time_plot(ui: &mut Ui, time_ms: &[f64], i: &[f32], q: &[f32], height: f32) -> Response {
    let traces = [
        Trace {
            xs: time_ms,
            ys: i,
            color: TRACE_I,
        },
        Trace {
            xs: time_ms,
            ys: q,
            color: TRACE_Q,
        },
    ];
    line_plot(ui, "I/Q / time [ms]", height, &traces, None)
}

/// IQ constellation scaled to the largest magnitude in the excerpt.
pub fn constellation(ui: &mut Ui, i: &[f32], q: &[f32], side: f32) -> Response {
    let (response, painter) = ui.allocate_painter(Vec2::splat(side), Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, CornerRadius::ZERO, BACKGROUND);
    painter.line_segment(
        [rect.center_top(), rect.center_bottom()],
        Stroke::new(1.0, GRID),
    );
    painter.line_segment(
        [rect.left_center(), rect.right_center()],
        Stroke::new(1.0, GRID),
    );

    let peak = i
        .iter()
        .chain(q)
        .fold(0.0f32, |acc, v| acc.max(v.abs()))
        .max(f32::EPSILON);
    let range = -peak..=peak;
    for (&x, &y) in i.iter().zip(q) {
        let point = map_point(x as f64, y, &(-peak as f64..=peak as f64), &range, rect);
        painter.circle_filled(point, 1.5, TRACE_I);
    }
    response
}

pub fn utilization_bar(ui: &mut Ui, utilization: f32) -> Response {
    let fill = if utilization >= 1.0 {
        Color32::from_rgb(0xe5, 0x39, 0x35)
    } else {
        Color32::from_rgb(0x43, 0xa0, 0x47)
    };
    ui.add(
        ProgressBar::new(utilization.clamp(0.0, 1.0))
            .fill(fill)
            .text(format!("utilization {:.0}%", utilization * 100.0)),
    )
}

fn draw_grid(painter: &eframe::egui::Painter, rect: Rect) {
    let stroke = Stroke::new(0.5, GRID);
    for step in 1..4 {
        let t = step as f32 / 4.0;
        let x = rect.left() + rect.width() * t;
        let y = rect.top() + rect.height() * t;
        painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], stroke);
        painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], stroke);
    }
}

/// Smallest range covering every finite value, padded when flat.
pub fn value_range(values: impl Iterator<Item = f32>) -> Option<RangeInclusive<f32>> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })?;
    if hi - lo < f32::EPSILON {
        Some(lo - 1.0..=hi + 1.0)
    } else {
        Some(lo..=hi)
    }
}

/// Map paired samples into `rect`. Larger y is drawn higher.
pub fn to_screen(
    xs: &[f64],
    ys: &[f32],
    x_range: &RangeInclusive<f64>,
    y_range: &RangeInclusive<f32>,
    rect: Rect,
) -> Vec<Pos2> {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| map_point(x, y, x_range, y_range, rect))
        .collect()
}

fn map_point(
    x: f64,
    y: f32,
    x_range: &RangeInclusive<f64>,
    y_range: &RangeInclusive<f32>,
    rect: Rect,
) -> Pos2 {
    let x_span = (x_range.end() - x_range.start()).max(f64::EPSILON);
    let y_span = (y_range.end() - y_range.start()).max(f32::EPSILON);
    let tx = ((x - x_range.start()) / x_span) as f32;
    let ty = ((y - y_range.start()) / y_span).clamp(0.0, 1.0);
    pos2(
        rect.left() + tx * rect.width(),
        rect.bottom() - ty * rect.height(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_screen_corners() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 50.0));
        let points = to_screen(&[0.0, 10.0], &[-1.0, 1.0], &(0.0..=10.0), &(-1.0..=1.0), rect);
        assert_eq!(points, vec![pos2(0.0, 50.0), pos2(100.0, 0.0)]);
    }

    #[test]
    fn test_to_screen_clamps_y() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(10.0, 10.0));
        let points = to_screen(&[5.0], &[-200.0], &(0.0..=10.0), &(-100.0..=0.0), rect);
        assert_eq!(points[0], pos2(5.0, 10.0));
    }

    #[test]
    fn test_value_range_skips_non_finite() {
        let range = value_range([f32::NEG_INFINITY, -20.0, -80.0, f32::NAN].into_iter());
        assert_eq!(range, Some(-80.0..=-20.0));
    }

    #[test]
    fn test_value_range_pads_flat_data() {
        assert_eq!(value_range([0.0, 0.0].into_iter()), Some(-1.0..=1.0));
        assert_eq!(value_range(std::iter::empty()), None);
    }
}
