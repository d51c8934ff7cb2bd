// SPDX-License-Identifier: GPL-3.0-only

//! Terminal user interface
//!
//! Renders the home menu, the registration form, the identify screen and
//! the scanner. The scanner preview is drawn with Unicode half-block
//! characters for improved vertical resolution.

use crate::app::{App, FormField, HomeAction};
use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{CameraFrame, PixelFormat, PreviewSurface, SensorRotation};
use crate::config::Config;
use crate::constants::timing;
use crate::navigation::Route;
use crate::pipelines::PreviewStream;
use crate::scanner::{
    ScanCommand, ScanExit, ScanOrchestrator, ScanScreenHandle, ScanState, spawn_scan_screen,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::{FutureExt, StreamExt};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Paragraph, Widget},
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the interactive terminal application
pub fn run(
    config: &Config,
    backend: Arc<dyn CameraBackend>,
    runtime: &tokio::runtime::Handle,
) -> Result<(), Box<dyn std::error::Error>> {
    // Scanner screens spawn tokio tasks from this thread
    let _runtime = runtime.enter();

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    // Run the app
    let result = TerminalUi::new(config, backend).run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// A running scanner screen plus what it renders
struct ScannerScreen {
    handle: ScanScreenHandle,
    preview: Option<PreviewStream>,
    surface: Option<PreviewSurface>,
    frame: FrameWidget,
    last_notice_seq: u64,
}

impl ScannerScreen {
    fn new(handle: ScanScreenHandle, mirror: bool) -> Self {
        Self {
            handle,
            preview: None,
            surface: None,
            frame: FrameWidget::new(mirror),
            last_notice_seq: 0,
        }
    }

    /// Pull new preview streams, surfaces and frames without blocking
    fn poll_preview(&mut self) {
        if let Some(stream) = self.handle.next_preview() {
            debug!(binding = stream.binding_id(), "New preview stream");
            self.preview = Some(stream);
            self.surface = None;
            self.frame.clear();
        }

        if let Some(stream) = self.preview.as_mut() {
            while let Some(next) = stream.next().now_or_never() {
                match next {
                    Some(surface) => {
                        debug!(
                            generation = surface.generation,
                            width = surface.width,
                            height = surface.height,
                            "Preview surface ready"
                        );
                        self.surface = Some(surface);
                    }
                    None => {
                        self.preview = None;
                        break;
                    }
                }
            }
        }

        if let Some(surface) = self.surface.as_mut()
            && surface.frames.has_changed().unwrap_or(false)
            && let Some(frame) = surface.frames.borrow_and_update().clone()
        {
            self.frame.update_frame(frame);
        }
    }
}

/// Transient status bar message
struct Toast {
    message: String,
    shown_at: Instant,
}

struct TerminalUi<'a> {
    config: &'a Config,
    backend: Arc<dyn CameraBackend>,
    app: App,
    home_selection: usize,
    scanner: Option<ScannerScreen>,
    toast: Option<Toast>,
    quit: bool,
}

impl<'a> TerminalUi<'a> {
    fn new(config: &'a Config, backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            config,
            backend,
            app: App::new(),
            home_selection: 0,
            scanner: None,
            toast: None,
            quit: false,
        }
    }

    fn show_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    fn run(
        mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        while !self.quit {
            self.sync_scanner();

            terminal.draw(|f| self.draw(f))?;

            // Handle input with timeout for frame updates
            if event::poll(timing::TUI_POLL_INTERVAL)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                // Ctrl+C to quit from anywhere
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    break;
                }
                self.handle_key(key);
            }
        }
        Ok(())
    }

    /// Start, poll and finish the scanner screen task to match the route
    fn sync_scanner(&mut self) {
        if self.app.route() == Route::Scanner && self.scanner.is_none() {
            let orchestrator = ScanOrchestrator::from_config(
                Arc::clone(&self.backend),
                self.config,
                self.app.scan_symbologies(),
            );
            info!("Opening scanner screen");
            self.scanner = Some(ScannerScreen::new(
                spawn_scan_screen(orchestrator),
                self.config.mirror_preview,
            ));
        }

        let Some(scanner) = self.scanner.as_mut() else {
            return;
        };
        scanner.poll_preview();

        let view = scanner.handle.view();
        if view.notice_seq != scanner.last_notice_seq {
            scanner.last_notice_seq = view.notice_seq;
            if let Some(notice) = view.notice {
                let message = notice.to_string();
                self.show_toast(message);
            }
        }

        let exit = self.scanner.as_mut().and_then(|s| s.handle.try_finish());
        if let Some(exit) = exit {
            info!(exit = ?exit, "Scanner screen finished");
            self.scanner = None;
            self.app.finish_scan(&exit);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.app.route() {
            Route::Home => self.handle_home_key(key),
            Route::Registration => self.handle_registration_key(key),
            Route::Identify => self.handle_identify_key(key),
            Route::Scanner => self.handle_scanner_key(key),
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        let count = HomeAction::ALL.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.home_selection = (self.home_selection + count - 1) % count;
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.home_selection = (self.home_selection + 1) % count;
            }
            KeyCode::Enter => self.app.open(HomeAction::ALL[self.home_selection]),
            KeyCode::Char('r') => self.app.open(HomeAction::Register),
            KeyCode::Char('i') => self.app.open(HomeAction::Identify),
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            _ => {}
        }
    }

    fn handle_registration_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.app.back();
            }
            KeyCode::Char('s') if ctrl => {
                self.app.request_scan();
            }
            KeyCode::Enter => match self.app.register() {
                Ok(record) => self.show_toast(format!("Registered {}", record.isbn)),
                Err(e) => self.show_toast(e.to_string()),
            },
            KeyCode::Tab | KeyCode::Down => {
                let form = self.app.registration_mut();
                form.set_focus(form.focus().next());
            }
            KeyCode::BackTab | KeyCode::Up => {
                let form = self.app.registration_mut();
                form.set_focus(form.focus().previous());
            }
            KeyCode::Backspace => {
                let form = self.app.registration_mut();
                let focus = form.focus();
                form.field_mut(focus).pop();
            }
            KeyCode::Char(c) if !ctrl => {
                let form = self.app.registration_mut();
                let focus = form.focus();
                form.field_mut(focus).push(c);
            }
            _ => {}
        }
    }

    fn handle_identify_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('q') => {
                self.app.back();
            }
            KeyCode::Char('s') | KeyCode::Enter => {
                self.app.request_scan();
            }
            _ => {}
        }
    }

    fn handle_scanner_key(&mut self, key: KeyEvent) {
        let Some(scanner) = self.scanner.as_ref() else {
            return;
        };
        let command = match key.code {
            KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('p') => ScanCommand::Capture,
            KeyCode::Char('s') => ScanCommand::SwitchLens,
            KeyCode::Char('r') => ScanCommand::Retry,
            KeyCode::Esc | KeyCode::Char('q') => ScanCommand::Dismiss,
            _ => return,
        };
        if !scanner.handle.send(command) {
            warn!(command = ?command, "Scanner screen is no longer running");
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let [body_area, status_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);

        match self.app.route() {
            Route::Home => self.draw_home(f, body_area),
            Route::Registration => self.draw_registration(f, body_area),
            Route::Identify => self.draw_identify(f, body_area),
            Route::Scanner => self.draw_scanner(f, body_area),
        }

        if self
            .toast
            .as_ref()
            .is_some_and(|t| t.shown_at.elapsed() > timing::NOTICE_DURATION)
        {
            self.toast = None;
        }
        let message = match &self.toast {
            Some(toast) => toast.message.clone(),
            None => self.key_hints(),
        };
        f.render_widget(StatusBar { message: &message }, status_area);
    }

    fn key_hints(&self) -> String {
        match self.app.route() {
            Route::Home => "↑/↓ select | Enter open | q quit".to_string(),
            Route::Registration => {
                "Tab next field | Ctrl+S scan | Enter register | Esc cancel".to_string()
            }
            Route::Identify => "s scan | Esc back".to_string(),
            Route::Scanner => {
                let view = self.scanner.as_ref().map(|s| s.handle.view());
                let mut msg = match &view {
                    Some(v) if v.state == ScanState::Binding => "'r' retry camera".to_string(),
                    _ => "Space capture".to_string(),
                };
                if view.as_ref().is_some_and(|v| v.lens_controls_enabled) {
                    msg.push_str(" | 's' switch camera");
                }
                msg.push_str(" | Esc cancel");
                msg
            }
        }
    }

    fn draw_home(&self, f: &mut Frame, area: Rect) {
        let mut lines = vec![Line::from("Home"), Line::from("")];
        for (index, action) in HomeAction::ALL.iter().enumerate() {
            let style = if index == self.home_selection {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            lines.push(Line::styled(format!("  {}  ", action.label()), style));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(format!(
            "{} book(s) registered",
            self.app.registry().len()
        )));
        f.render_widget(
            Paragraph::new(lines).block(Block::bordered().title(" bookscan ")),
            area,
        );
    }

    fn draw_registration(&self, f: &mut Frame, area: Rect) {
        let form = self.app.registration();
        let mut lines = vec![Line::from("Registration"), Line::from("")];
        for field in FormField::ALL {
            let focused = field == form.focus();
            let marker = if focused { "▶" } else { " " };
            let style = if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::styled(
                format!("{} {:<7}{}", marker, field.label(), form.field(field)),
                style,
            ));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(format!(
            "[{}]   [Cancel]   [Register]",
            form.scan_button_label()
        )));
        f.render_widget(Paragraph::new(lines).block(Block::bordered()), area);
    }

    fn draw_identify(&self, f: &mut Frame, area: Rect) {
        let view = self.app.identify();
        let mut lines = vec![
            Line::from(format!("[Back]   [{}]", view.scan_button_label())),
            Line::from(""),
        ];
        lines.extend(self.app.identify_lines().into_iter().map(Line::from));
        f.render_widget(
            Paragraph::new(lines).block(Block::bordered().title(" Identify ISBN ")),
            area,
        );
    }

    fn draw_scanner(&self, f: &mut Frame, area: Rect) {
        let Some(scanner) = &self.scanner else {
            return;
        };
        let view = scanner.handle.view();

        let [preview_area, info_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);
        f.render_widget(&scanner.frame, preview_area);

        let state = match view.state {
            ScanState::Idle => "Idle",
            ScanState::Binding => "Opening camera...",
            ScanState::Ready => "Ready",
            ScanState::Capturing => "Capturing...",
            ScanState::Decoding => "Decoding...",
        };
        let busy = if view.busy { " (busy)" } else { "" };
        let text = format!("{} camera | {}{}", view.lens, state, busy);
        f.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::Yellow)),
            info_area,
        );
    }
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    frame: Option<CameraFrame>,
    mirror: bool,
}

impl FrameWidget {
    fn new(mirror: bool) -> Self {
        Self {
            frame: None,
            mirror,
        }
    }

    fn update_frame(&mut self, frame: CameraFrame) {
        self.frame = Some(frame);
    }

    fn clear(&mut self) {
        self.frame = None;
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };
        if frame.width == 0 || frame.height == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Upright dimensions after applying the sensor rotation
        let (upright_w, upright_h) = if frame.rotation.swaps_dimensions() {
            (frame.height, frame.width)
        } else {
            (frame.width, frame.height)
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = upright_w as f64 / upright_h as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = upright_w as f64 / display_width as f64;
        let y_scale = upright_h as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let mut ux = (tx as f64 * x_scale) as u32;
                if self.mirror {
                    ux = upright_w.saturating_sub(1).saturating_sub(ux);
                }
                let uy_top = (ty as f64 * 2.0 * y_scale) as u32;
                let uy_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_upright(frame, ux, uy_top);
                let bottom_color = sample_upright(frame, ux, uy_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Map upright coordinates back to the sensor image
fn source_coords(frame: &CameraFrame, ux: u32, uy: u32) -> (u32, u32) {
    let (w, h) = (frame.width, frame.height);
    match frame.rotation {
        SensorRotation::None => (ux, uy),
        SensorRotation::Rotate90 => (uy, h.saturating_sub(1).saturating_sub(ux)),
        SensorRotation::Rotate180 => (
            w.saturating_sub(1).saturating_sub(ux),
            h.saturating_sub(1).saturating_sub(uy),
        ),
        SensorRotation::Rotate270 => (w.saturating_sub(1).saturating_sub(uy), ux),
    }
}

fn sample_upright(frame: &CameraFrame, ux: u32, uy: u32) -> Color {
    let (x, y) = source_coords(frame, ux, uy);
    let (r, g, b) = sample_pixel_rgb(frame, x, y);
    Color::Rgb(r, g, b)
}

fn sample_pixel_rgb(frame: &CameraFrame, x: u32, y: u32) -> (u8, u8, u8) {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let data: &[u8] = &frame.data;

    match frame.format {
        PixelFormat::RGBA | PixelFormat::RGB24 => {
            let bpp = frame.format.bytes_per_pixel();
            let idx = (y * frame.stride + x * bpp) as usize;
            if idx + 2 < data.len() {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::Gray8 => {
            let idx = (y * frame.stride + x) as usize;
            data.get(idx).map(|&v| (v, v, v)).unwrap_or((0, 0, 0))
        }
        PixelFormat::NV12 => {
            let y_idx = (y * frame.stride + x) as usize;
            let Some(&luma) = data.get(y_idx) else {
                return (0, 0, 0);
            };

            // UV plane follows the Y plane, at half resolution
            let uv_offset = (frame.stride * frame.height) as usize;
            let uv_idx = uv_offset + (y / 2) as usize * frame.stride as usize + (x & !1) as usize;
            match (data.get(uv_idx), data.get(uv_idx + 1)) {
                (Some(&u), Some(&v)) => yuv_to_rgb(luma, u, v),
                _ => (luma, luma, luma),
            }
        }
    }
}

/// Convert YUV (BT.601) to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_coords_match_image_rotation() {
        // A 4x2 sensor image rotated 90° clockwise is 2x4 upright
        let frame = CameraFrame::from_gray_image(
            image::GrayImage::from_fn(4, 2, |x, y| image::Luma([(y * 4 + x) as u8])),
            SensorRotation::Rotate90,
        );
        let upright = image::imageops::rotate90(&image::GrayImage::from_fn(4, 2, |x, y| {
            image::Luma([(y * 4 + x) as u8])
        }));
        for uy in 0..4 {
            for ux in 0..2 {
                let (x, y) = source_coords(&frame, ux, uy);
                assert_eq!(
                    (y * 4 + x) as u8,
                    upright.get_pixel(ux, uy).0[0],
                    "upright ({}, {})",
                    ux,
                    uy
                );
            }
        }
    }

    #[test]
    fn test_yuv_gray_passthrough() {
        assert_eq!(yuv_to_rgb(100, 128, 128), (100, 100, 100));
    }
}
