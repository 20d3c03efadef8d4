//! Viewer window - eframe::App around one `Session`.
//!
//! Each repaint:
//! 1. `session.pump(now)` (timers, finished loads, timeouts)
//! 2. drain load reports into the message list
//! 3. dropped event files, keyboard shortcuts
//! 4. panels: controls, timeline + score chart, image windows
//! 5. schedule the next repaint from the session's deadlines
//!
//! Textures are re-uploaded only when a window's rendered `Arc<Frame>` changes.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use eframe::egui;
use log::{debug, info, warn};

use crate::config::Settings;
use crate::core::timeline::SPEED_PRESETS;
use crate::core::{ErrorKind, Layout, LoadReport, PlaybackState, Session};
use crate::entities::effects::EffectParams;
use crate::entities::{EventInfo, Frame, VariantKind};
use crate::timeslider::{SliderAction, TimeSliderConfig, score_chart, time_slider};

/// Messages kept in the status list
const MAX_MESSAGES: usize = 50;
/// Repaint interval while loads are in flight
const LOADING_REPAINT: Duration = Duration::from_millis(16);
const CHART_HEIGHT: f32 = 90.0;

struct WindowTexture {
    source: Arc<Frame>,
    handle: egui::TextureHandle,
}

pub struct ViewerApp {
    session: Session,
    reports: Receiver<LoadReport>,
    messages: VecDeque<String>,
    textures: HashMap<VariantKind, WindowTexture>,
    settings: Settings,
    settings_path: PathBuf,
    slider_config: TimeSliderConfig,
    show_effects: bool,
}

impl ViewerApp {
    pub fn new(session: Session, reports: Receiver<LoadReport>, settings: Settings, settings_path: PathBuf) -> Self {
        Self {
            session,
            reports,
            messages: VecDeque::new(),
            textures: HashMap::new(),
            settings,
            settings_path,
            slider_config: TimeSliderConfig::default(),
            show_effects: true,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Load an event descriptor and open it; failures go to the message list
    pub fn open_path(&mut self, path: &Path) -> bool {
        match EventInfo::load(path) {
            Ok(event) => {
                self.textures.clear();
                self.session.open_event(event, Instant::now());
                true
            }
            Err(e) => {
                warn!("{}", e);
                self.push_message(e.to_string());
                false
            }
        }
    }

    fn push_message(&mut self, message: String) {
        if self.messages.len() >= MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    fn drain_reports(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            if report.kind == ErrorKind::UnresolvedComponent {
                continue;
            }
            self.push_message(report.to_string());
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });
        // Last dropped descriptor wins
        if let Some(path) = dropped.last() {
            info!("Event dropped: {}", path.display());
            self.open_path(path);
        }
    }

    fn handle_keyboard_input(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let now = Instant::now();
        let input = ctx.input(|i| i.clone());

        if input.key_pressed(egui::Key::Space) {
            self.session.toggle_play(now);
        }
        if input.key_pressed(egui::Key::L) {
            self.session.play_forward(now);
        }
        if input.key_pressed(egui::Key::J) {
            self.session.play_reverse(now);
        }
        if input.key_pressed(egui::Key::K) {
            self.session.stop(now);
        }
        if input.key_pressed(egui::Key::ArrowRight) {
            self.session.step(1, now);
        }
        if input.key_pressed(egui::Key::ArrowLeft) {
            self.session.step(-1, now);
        }
        if input.key_pressed(egui::Key::Home) {
            self.session.to_start(now);
        }
        if input.key_pressed(egui::Key::End) {
            self.session.to_end(now);
        }
        if input.key_pressed(egui::Key::ArrowUp) {
            self.session.faster(now);
        }
        if input.key_pressed(egui::Key::ArrowDown) {
            self.session.slower(now);
        }
        if input.key_pressed(egui::Key::N) {
            self.session.next_problem(now);
        }
        if input.key_pressed(egui::Key::P) {
            self.session.prev_problem(now);
        }
        if input.key_pressed(egui::Key::Tab) {
            self.switch_layout(self.session.layout().toggled());
        }
        if input.key_pressed(egui::Key::A) && self.session.layout() == Layout::AlphaOnly {
            self.session.toggle_alpha_base(now);
        }
    }

    fn switch_layout(&mut self, layout: Layout) {
        if layout == self.session.layout() {
            return;
        }
        info!("Layout: {:?}", layout);
        self.session.set_layout(layout, Instant::now());
        self.settings.default_layout = layout;
        self.textures.clear();
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        ui.horizontal(|ui| {
            if ui.button("⏮").on_hover_text("First frame (Home)").clicked() {
                self.session.to_start(now);
            }
            if ui.button("◀|").on_hover_text("Step back (Left)").clicked() {
                self.session.step(-1, now);
            }
            let state = self.session.playback_state();
            if ui
                .selectable_label(state == PlaybackState::PlayingReverse, "◀")
                .on_hover_text("Play reverse (J)")
                .clicked()
            {
                self.session.play_reverse(now);
            }
            if ui.button("■").on_hover_text("Stop (K)").clicked() {
                self.session.stop(now);
            }
            if ui
                .selectable_label(state == PlaybackState::PlayingForward, "▶")
                .on_hover_text("Play forward (L)")
                .clicked()
            {
                self.session.play_forward(now);
            }
            if ui.button("|▶").on_hover_text("Step forward (Right)").clicked() {
                self.session.step(1, now);
            }
            if ui.button("⏭").on_hover_text("Last frame (End)").clicked() {
                self.session.to_end(now);
            }

            ui.separator();

            let mut speed_index = self.session.timeline().speed_index();
            egui::ComboBox::from_id_salt("speed")
                .selected_text(format!("{}x", SPEED_PRESETS[speed_index]))
                .show_ui(ui, |ui| {
                    for (idx, speed) in SPEED_PRESETS.iter().enumerate() {
                        ui.selectable_value(&mut speed_index, idx, format!("{}x", speed));
                    }
                });
            if speed_index != self.session.timeline().speed_index() {
                self.session.set_speed_index(speed_index, now);
                self.settings.speed_index = speed_index;
            }

            ui.separator();

            if ui.button("◀ problem").on_hover_text("Previous problem frame (P)").clicked() {
                self.session.prev_problem(now);
            }
            if ui.button("problem ▶").on_hover_text("Next problem frame (N)").clicked() {
                self.session.next_problem(now);
            }

            ui.separator();

            let mut layout = self.session.layout();
            ui.selectable_value(&mut layout, Layout::SideBySide, "Side by side");
            ui.selectable_value(&mut layout, Layout::AlphaOnly, "Alpha");
            self.switch_layout(layout);

            if layout == Layout::AlphaOnly {
                let label = format!("Base: {}", self.session.alpha_base().variant().label());
                if ui.button(label).on_hover_text("Switch Alpha base (A)").clicked() {
                    self.session.toggle_alpha_base(now);
                }
            }

            ui.separator();
            ui.checkbox(&mut self.show_effects, "Effects");

            ui.separator();
            let frame = self.session.frame();
            ui.label(format!("Frame {}", frame));
            if self.session.is_loading() {
                ui.spinner();
            }
        });
    }

    fn render_threshold(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut enabled = self.settings.score_threshold.is_some();
            let mut value = self.settings.score_threshold.unwrap_or(0.5);
            ui.checkbox(&mut enabled, "Threshold");
            ui.add_enabled(enabled, egui::DragValue::new(&mut value).speed(0.01));
            let threshold = enabled.then_some(value);
            if threshold != self.settings.score_threshold {
                self.settings.score_threshold = threshold;
                self.session.set_score_threshold(threshold);
            }
        });
    }

    fn render_timing(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut throttle_ms = self.settings.throttle_ms;
            let mut preload_delay_ms = self.settings.preload_delay_ms;
            ui.label("Throttle ms");
            ui.add(egui::DragValue::new(&mut throttle_ms).range(1..=500));
            ui.label("Preload delay ms");
            ui.add(egui::DragValue::new(&mut preload_delay_ms).range(0..=5000));
            if throttle_ms != self.settings.throttle_ms || preload_delay_ms != self.settings.preload_delay_ms {
                self.settings.throttle_ms = throttle_ms;
                self.settings.preload_delay_ms = preload_delay_ms;
                self.session.set_timing(throttle_ms, preload_delay_ms);
            }
        });
    }

    fn render_timeline(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        let range = self.session.timeline().range();
        let problems = self
            .session
            .chart()
            .map(|c| c.problem_frames())
            .unwrap_or_default();

        let clicked = self
            .session
            .chart()
            .and_then(|chart| score_chart(ui, chart, range, CHART_HEIGHT));
        if let Some(frame) = clicked {
            debug!("Chart click at frame {}", frame);
            self.session.seek(frame, now);
        }

        let slider = self.session.timeline().slider();
        for action in time_slider(ui, slider, range, &problems, &self.slider_config) {
            match action {
                SliderAction::DragStart => self.session.begin_scrub(now),
                SliderAction::DragTo(frame) => self.session.scrub_to(frame, now),
                SliderAction::DragEnd => self.session.end_scrub(now),
                SliderAction::Click(frame) => self.session.seek(frame, now),
            }
        }
    }

    fn render_messages(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("{} message(s)", self.messages.len()));
            if ui.small_button("Clear").clicked() {
                self.messages.clear();
            }
        });
        egui::ScrollArea::vertical()
            .max_height(60.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in &self.messages {
                    ui.colored_label(egui::Color32::from_rgb(230, 120, 120), message);
                }
            });
    }

    /// Upload `kind`'s picture if it changed since the last repaint
    fn texture_for(&mut self, ctx: &egui::Context, kind: VariantKind) -> Option<egui::TextureId> {
        let Some(frame) = self.session.render(kind) else {
            self.textures.remove(&kind);
            return None;
        };
        let (w, h) = frame.resolution();

        match self.textures.get_mut(&kind) {
            Some(tex) if Arc::ptr_eq(&tex.source, &frame) => {}
            Some(tex) => {
                let image = egui::ColorImage::from_rgba_unmultiplied([w, h], frame.pixels());
                tex.handle.set(image, egui::TextureOptions::LINEAR);
                tex.source = frame;
            }
            None => {
                let image = egui::ColorImage::from_rgba_unmultiplied([w, h], frame.pixels());
                let handle = ctx.load_texture(kind.label(), image, egui::TextureOptions::LINEAR);
                self.textures.insert(kind, WindowTexture { source: frame, handle });
            }
        }
        self.textures.get(&kind).map(|t| t.handle.id())
    }

    fn render_effect_sliders(&mut self, ui: &mut egui::Ui, kind: VariantKind) {
        if !kind.takes_color_effects() {
            return;
        }
        let mut params = self.session.effect_parameters(kind);
        let before = params;
        ui.horizontal(|ui| {
            ui.add(egui::Slider::new(&mut params.hue, -1.0..=1.0).text("H"));
            ui.add(egui::Slider::new(&mut params.saturation, -1.0..=1.0).text("S"));
            ui.add(egui::Slider::new(&mut params.lightness, -1.0..=1.0).text("L"));
            if kind.takes_opacity() {
                ui.add(egui::Slider::new(&mut params.opacity, 0.0..=1.0).text("Opacity"));
            }
            if ui.small_button("Reset").clicked() {
                params = EffectParams::default();
            }
        });
        if params != before {
            self.session.set_effect_parameters(kind, params);
        }
    }

    fn render_window(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, kind: VariantKind) {
        let shown = self.session.displayed_frame(kind);
        let title = match (kind, shown) {
            (VariantKind::Alpha, Some(frame)) => {
                let base = self
                    .session
                    .coordinator()
                    .and_then(|c| c.window(kind))
                    .and_then(|w| w.as_alpha())
                    .and_then(|a| a.shown_base())
                    .map(|base| base.variant().label())
                    .unwrap_or("-");
                format!("{} over {} - {}", kind.label(), base, frame)
            }
            (_, Some(frame)) => format!("{} - {}", kind.label(), frame),
            (_, None) => kind.label().to_string(),
        };
        ui.strong(title);

        if self.show_effects {
            self.render_effect_sliders(ui, kind);
        }

        let avail = ui.available_size();
        match self.texture_for(ctx, kind) {
            Some(id) => {
                let (w, h) = self
                    .textures
                    .get(&kind)
                    .map(|t| t.source.resolution())
                    .unwrap_or((1, 1));
                let scale = (avail.x / w.max(1) as f32).min(avail.y / h.max(1) as f32);
                let size = egui::vec2(w as f32 * scale, h as f32 * scale);
                ui.image(egui::load::SizedTexture::new(id, size));
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.weak(if self.session.is_open() { "loading…" } else { "no event" });
                });
            }
        }
    }

    fn schedule_repaint(&self, ctx: &egui::Context, now: Instant) {
        if self.session.is_loading() {
            ctx.request_repaint_after(LOADING_REPAINT);
        } else if let Some(deadline) = self.session.next_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.session.pump(now);
        self.drain_reports();
        self.handle_dropped_files(ctx);
        self.handle_keyboard_input(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            self.render_controls(ui);
        });

        egui::TopBottomPanel::bottom("timeline").show(ctx, |ui| {
            if self.session.is_open() {
                ui.horizontal(|ui| {
                    self.render_threshold(ui);
                    ui.separator();
                    self.render_timing(ui);
                });
                self.render_timeline(ui);
            }
            self.render_messages(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.session.is_open() {
                ui.centered_and_justified(|ui| {
                    ui.label("Drop an event descriptor (.json) here");
                });
                return;
            }
            let windows = self.session.layout().windows();
            ui.columns(windows.len(), |columns| {
                for (column, &kind) in columns.iter_mut().zip(windows) {
                    self.render_window(column, ctx, kind);
                }
            });
        });

        self.schedule_repaint(ctx, Instant::now());
    }

    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        if let Err(e) = self.settings.save(&self.settings_path) {
            warn!("{}", e);
        }
    }
}
