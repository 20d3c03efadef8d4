//! Timeline widgets: frame slider and score chart.
//!
//! Both only report what the user did; the session decides what happens.
//! Frame <-> x mapping goes through `ScoreChart::frame_at()` /
//! `ScoreChart::fraction_of()`, so the slider, the chart marker and chart
//! clicks agree on every pixel.

use eframe::egui::{self, Color32, Pos2, Rect, Response, Sense, Shape, Stroke, Ui, Vec2};

use crate::entities::ScoreChart;

const COLOR_TRACK: Color32 = Color32::from_rgb(40, 40, 45);
const COLOR_RANGE: Color32 = Color32::from_rgb(60, 100, 180);
const COLOR_PROBLEM: Color32 = Color32::from_rgb(200, 60, 60);
const COLOR_PLAYHEAD: Color32 = Color32::from_rgb(255, 220, 100);
const COLOR_SERIES: Color32 = Color32::from_rgb(80, 200, 120);
const COLOR_THRESHOLD: Color32 = Color32::from_rgb(220, 160, 60);

/// What the user did with the slider this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderAction {
    DragStart,
    DragTo(i32),
    DragEnd,
    /// Single click (explicit frame entry)
    Click(i32),
}

/// Configuration for the frame slider
#[derive(Clone, Debug)]
pub struct TimeSliderConfig {
    pub height: f32,
    pub show_problems: bool,
    pub problem_marker_height: f32,
}

impl Default for TimeSliderConfig {
    fn default() -> Self {
        Self {
            height: 24.0,
            show_problems: true,
            problem_marker_height: 4.0,
        }
    }
}

/// Frame slider over `range` (inclusive). `slider` is the displayed value.
pub fn time_slider(
    ui: &mut Ui,
    slider: i32,
    range: (i32, i32),
    problems: &[i32],
    config: &TimeSliderConfig,
) -> Vec<SliderAction> {
    let total_height = if config.show_problems {
        config.height + config.problem_marker_height
    } else {
        config.height
    };
    let desired_size = Vec2::new(ui.available_width(), total_height);
    let (rect, response) = ui.allocate_exact_size(desired_size, Sense::click_and_drag());
    let slider_rect = Rect::from_min_max(rect.min, Pos2::new(rect.max.x, rect.min.y + config.height));

    if ui.is_rect_visible(rect) {
        let painter = ui.painter();
        painter.rect_filled(slider_rect, 0.0, COLOR_TRACK);

        // Range bar in middle 50% of height
        let bar = Rect::from_min_max(
            Pos2::new(slider_rect.min.x, slider_rect.min.y + slider_rect.height() * 0.25),
            Pos2::new(slider_rect.max.x, slider_rect.min.y + slider_rect.height() * 0.75),
        );
        painter.rect_filled(bar, 2.0, COLOR_RANGE.gamma_multiply(0.5));

        if config.show_problems {
            draw_problem_markers(painter, rect, slider_rect, problems, range, config.problem_marker_height);
        }
        draw_playhead(painter, slider_rect, slider, range);
    }

    handle_interaction(&response, slider_rect, range)
}

fn frame_to_x(rect: Rect, frame: i32, range: (i32, i32)) -> f32 {
    rect.min.x + ScoreChart::fraction_of(frame, range) * rect.width()
}

fn x_to_frame(rect: Rect, x: f32, range: (i32, i32)) -> i32 {
    let fraction = if rect.width() > 0.0 {
        (x - rect.min.x) / rect.width()
    } else {
        0.0
    };
    ScoreChart::frame_at(fraction, range)
}

/// Small red blocks under the slider at problem frames
fn draw_problem_markers(
    painter: &egui::Painter,
    rect: Rect,
    slider_rect: Rect,
    problems: &[i32],
    range: (i32, i32),
    height: f32,
) {
    let span = (range.1 - range.0 + 1).max(1) as f32;
    let width = (slider_rect.width() / span).max(2.0);
    for &frame in problems {
        let x = frame_to_x(slider_rect, frame, range);
        let block = Rect::from_min_max(
            Pos2::new(x - width / 2.0, slider_rect.max.y),
            Pos2::new(x + width / 2.0, rect.max.y.min(slider_rect.max.y + height)),
        );
        painter.rect_filled(block, 0.0, COLOR_PROBLEM);
    }
}

/// Draw playhead indicator at current frame
fn draw_playhead(painter: &egui::Painter, rect: Rect, frame: i32, range: (i32, i32)) {
    let x = frame_to_x(rect, frame, range);
    painter.line_segment(
        [Pos2::new(x, rect.min.y), Pos2::new(x, rect.max.y)],
        (2.0, COLOR_PLAYHEAD),
    );

    let frame_text = format!("{}", frame);
    let text_pos = Pos2::new(x + 4.0, rect.min.y + 2.0);

    // Background for readability
    let galley = painter.layout_no_wrap(frame_text.clone(), egui::FontId::proportional(11.0), Color32::WHITE);
    let text_rect = Rect::from_min_size(text_pos, galley.size());
    painter.rect_filled(text_rect.expand(2.0), 2.0, Color32::from_black_alpha(180));

    painter.text(
        text_pos,
        egui::Align2::LEFT_TOP,
        frame_text,
        egui::FontId::proportional(11.0),
        Color32::from_rgba_unmultiplied(255, 255, 255, 200),
    );
}

/// Map pointer interaction to slider actions
fn handle_interaction(response: &Response, rect: Rect, range: (i32, i32)) -> Vec<SliderAction> {
    let mut actions = Vec::new();
    let frame = response.interact_pointer_pos().map(|pos| x_to_frame(rect, pos.x, range));

    if response.drag_started() {
        actions.push(SliderAction::DragStart);
    }
    if response.dragged() {
        if let Some(frame) = frame {
            actions.push(SliderAction::DragTo(frame));
        }
    }
    if response.drag_stopped() {
        actions.push(SliderAction::DragEnd);
    } else if response.clicked() {
        if let Some(frame) = frame {
            actions.push(SliderAction::Click(frame));
        }
    }
    actions
}

/// Score chart with threshold line, problem points and the guide marker.
/// Returns the clicked frame, if any.
pub fn score_chart(ui: &mut Ui, chart: &ScoreChart, range: (i32, i32), height: f32) -> Option<i32> {
    let desired_size = Vec2::new(ui.available_width(), height);
    let (rect, response) = ui.allocate_exact_size(desired_size, Sense::click());

    if ui.is_rect_visible(rect) {
        let painter = ui.painter();
        painter.rect_filled(rect, 0.0, COLOR_TRACK);

        let (lo, hi) = chart.value_range();
        let span = if hi > lo { hi - lo } else { 1.0 };
        let value_to_y = |v: f64| rect.max.y - (((v - lo) / span) as f32) * rect.height();

        if let Some(t) = chart.threshold() {
            if t >= lo && t <= hi {
                let y = value_to_y(t);
                painter.hline(rect.x_range(), y, Stroke::new(1.0, COLOR_THRESHOLD));
            }
        }

        let points: Vec<Pos2> = chart
            .points()
            .iter()
            .map(|p| Pos2::new(frame_to_x(rect, p.frame, range), value_to_y(p.value)))
            .collect();
        if points.len() > 1 {
            painter.add(Shape::line(points.clone(), Stroke::new(1.5, COLOR_SERIES)));
        }
        for (pos, p) in points.iter().zip(chart.points()) {
            if chart.is_problem(p.value) {
                painter.circle_filled(*pos, 3.0, COLOR_PROBLEM);
            }
        }

        if let Some(marker) = chart.marker() {
            let x = frame_to_x(rect, marker, range);
            painter.vline(x, rect.y_range(), Stroke::new(2.0, COLOR_PLAYHEAD));
        }
    }

    if response.clicked() {
        let pos = response.interact_pointer_pos()?;
        return Some(x_to_frame(rect, pos.x, range));
    }
    None
}
