//! Per-frame score chart model.
//!
//! Holds the score series of the open event and the guide marker. The marker
//! is moved synchronously with the timeline position, independent of image
//! load completion, so it is the one element always exactly in sync.
//!
//! Drawing is left to the UI; this type only owns the frame-index contract:
//! `frame_at()` maps a horizontal position inside a visible frame range back
//! to a frame number, `fraction_of()` maps the other way.

use super::event::{EventInfo, ScorePoint};

#[derive(Debug, Clone, Default)]
pub struct ScoreChart {
    /// Sorted by frame, one point per frame
    points: Vec<ScorePoint>,
    min_val: f64,
    max_val: f64,
    marker: Option<i32>,
    threshold: Option<f64>,
    higher_is_worse: bool,
}

impl ScoreChart {
    pub fn new(event: &EventInfo, threshold: Option<f64>, higher_is_worse: bool) -> Self {
        let mut points = event.scores.clone();
        points.sort_by_key(|p| p.frame);
        points.dedup_by_key(|p| p.frame);

        let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.value), hi.max(p.value))
        });
        let min_val = event.min_val.unwrap_or(if lo.is_finite() { lo } else { 0.0 });
        let max_val = event.max_val.unwrap_or(if hi.is_finite() { hi } else { 1.0 });

        Self {
            points,
            min_val,
            max_val,
            marker: None,
            threshold,
            higher_is_worse,
        }
    }

    pub fn points(&self) -> &[ScorePoint] {
        &self.points
    }

    /// (min, max) of the value axis
    pub fn value_range(&self) -> (f64, f64) {
        (self.min_val, self.max_val)
    }

    pub fn set_marker(&mut self, frame: i32) {
        self.marker = Some(frame);
    }

    pub fn marker(&self) -> Option<i32> {
        self.marker
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: Option<f64>) {
        self.threshold = threshold;
    }

    /// Score of one frame, if the series has it
    pub fn value_at(&self, frame: i32) -> Option<f64> {
        self.points
            .binary_search_by_key(&frame, |p| p.frame)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    /// Whether a score crosses the problem threshold
    pub fn is_problem(&self, value: f64) -> bool {
        match self.threshold {
            Some(t) if self.higher_is_worse => value > t,
            Some(t) => value < t,
            None => false,
        }
    }

    /// Frames whose score crosses the threshold, ascending
    pub fn problem_frames(&self) -> Vec<i32> {
        self.points
            .iter()
            .filter(|p| self.is_problem(p.value))
            .map(|p| p.frame)
            .collect()
    }

    /// First problem frame strictly after `frame`
    pub fn next_problem_after(&self, frame: i32) -> Option<i32> {
        self.points
            .iter()
            .find(|p| p.frame > frame && self.is_problem(p.value))
            .map(|p| p.frame)
    }

    /// Last problem frame strictly before `frame`
    pub fn prev_problem_before(&self, frame: i32) -> Option<i32> {
        self.points
            .iter()
            .rev()
            .find(|p| p.frame < frame && self.is_problem(p.value))
            .map(|p| p.frame)
    }

    /// Frame with the worst score
    pub fn worst_frame(&self) -> Option<i32> {
        let better = |a: f64, b: f64| if self.higher_is_worse { a < b } else { a > b };
        let mut worst: Option<&ScorePoint> = None;
        for p in &self.points {
            match worst {
                Some(w) if !better(w.value, p.value) => {}
                _ => worst = Some(p),
            }
        }
        worst.map(|p| p.frame)
    }

    /// Map a horizontal fraction (0..1) inside `view` (inclusive frame range) to a frame.
    pub fn frame_at(fraction: f32, view: (i32, i32)) -> i32 {
        let (lo, hi) = if view.0 <= view.1 { view } else { (view.1, view.0) };
        let span = (hi - lo) as f32;
        let frame = lo + (fraction.clamp(0.0, 1.0) * span).round() as i32;
        frame.clamp(lo, hi)
    }

    /// Map a frame to its horizontal fraction (0..1) inside `view`.
    pub fn fraction_of(frame: i32, view: (i32, i32)) -> f32 {
        let (lo, hi) = if view.0 <= view.1 { view } else { (view.1, view.0) };
        if hi == lo {
            return 0.0;
        }
        ((frame - lo) as f32 / (hi - lo) as f32).clamp(0.0, 1.0)
    }
}
