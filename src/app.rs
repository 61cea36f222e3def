//! egui front-end: maps the session state onto panels and feeds clicks back
//! into the controller.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eframe::{App, Frame, egui};
use egui::{Color32, ColorImage, RichText, TextureOptions};
use rfd::FileDialog;
use tokio::runtime::Handle;
use tracing::warn;

use crate::controller::DownloadSessionController;
use crate::model::{VideoInfo, format_duration, format_views};
use crate::session::{DownloadView, SessionState};
use crate::thumbnail;
use crate::validate::is_supported_url;

/// How long the fetch button stays green after a valid URL is pasted.
const PASTE_FLASH: Duration = Duration::from_secs(1);

/// Brief highlight of the fetch button acknowledging a pasted URL.
#[derive(Debug, Default)]
struct PasteFlash {
    until: Option<Instant>,
}

impl PasteFlash {
    /// Starts the flash when the field now holds a supported URL.
    fn pasted(&mut self, field_text: &str, now: Instant) {
        if is_supported_url(field_text.trim()) {
            self.until = Some(now + PASTE_FLASH);
        }
    }

    fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

/// Application state for the GUI
pub struct VidgrabApp {
    /// Session driver; owns all backend interaction
    controller: DownloadSessionController,
    /// Runtime used for blocking thumbnail fetches
    runtime: Handle,
    /// Input field for the video URL
    url_input: String,
    /// Cached textures keyed by thumbnail URL
    thumbnails: HashMap<String, egui::TextureHandle>,
    /// Thumbnail URLs already requested
    requested: HashSet<String>,
    /// Incoming thumbnail fetch results (url, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
    paste_flash: PasteFlash,
}

impl VidgrabApp {
    pub fn new(controller: DownloadSessionController, runtime: Handle) -> Self {
        Self {
            controller,
            runtime,
            url_input: String::new(),
            thumbnails: HashMap::new(),
            requested: HashSet::new(),
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            paste_flash: PasteFlash::default(),
        }
    }

    fn submit(&mut self) {
        // Errors are already reflected in the session state.
        let _ = self.controller.fetch_info(&self.url_input);
    }

    fn request_thumbnail(&mut self, ctx: &egui::Context, url: &str) {
        if url.is_empty() || !self.requested.insert(url.to_string()) {
            return;
        }
        let url = url.to_string();
        let results = Arc::clone(&self.thumbnail_results);
        let ctx = ctx.clone();
        self.runtime.spawn_blocking(move || {
            if let Some(img) = thumbnail::fetch_thumbnail(&url) {
                if let Ok(mut pending) = results.lock() {
                    pending.push((url, img));
                }
                ctx.request_repaint();
            }
        });
    }

    fn url_form(&mut self, ui: &mut egui::Ui) {
        ui.label("Paste YouTube video URL:");
        let loading = matches!(self.controller.state(), SessionState::Loading { .. });
        let mut submit = false;
        ui.horizontal(|ui| {
            let field = ui.text_edit_singleline(&mut self.url_input);
            if field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
            }
            let pasted = ui.input(|i| i.events.iter().any(|e| matches!(e, egui::Event::Paste(_))));
            if field.changed() && pasted {
                self.paste_flash.pasted(&self.url_input, Instant::now());
            }

            let caption = if loading { "Loading..." } else { "Get Video Info" };
            let mut button = egui::Button::new(caption);
            if self.paste_flash.is_active(Instant::now()) {
                button = button.fill(Color32::from_rgb(22, 163, 74));
            }
            if ui.add_enabled(!loading, button).clicked() {
                submit = true;
            }
        });
        if submit && !loading {
            self.submit();
        }

        // Folder selection
        ui.horizontal(|ui| {
            ui.label("Download folder:");
            let mut folder = self.controller.download_folder().to_string();
            if ui.text_edit_singleline(&mut folder).changed() {
                self.controller.set_download_folder(folder.clone());
            }
            if ui.button("Browse…").clicked() {
                if let Some(picked) = FileDialog::new().set_directory(&folder).pick_folder() {
                    self.controller.set_download_folder(picked.display().to_string());
                }
            }
        });
    }

    fn info_panel(&mut self, ui: &mut egui::Ui, info: &VideoInfo) -> Option<String> {
        let mut chosen = None;
        ui.horizontal(|ui| {
            if let Some(tex) = self.thumbnails.get(&info.thumbnail_url) {
                ui.add(egui::Image::new(tex).max_width(240.0));
            }
            ui.vertical(|ui| {
                ui.label(RichText::new(&info.title).heading());
                ui.label(format!("By {}", info.uploader));
                ui.label(format!(
                    "{}  •  {}",
                    format_duration(info.duration),
                    format_views(info.view_count)
                ));
            });
        });
        ui.separator();
        ui.label("Choose a format:");
        for option in info.quality_choices() {
            let color = if option.is_audio() {
                Color32::from_rgb(22, 163, 74)
            } else {
                Color32::from_rgb(37, 99, 235)
            };
            let text = RichText::new(format!("{}  —  {}", option.caption(), option.format_label()))
                .color(color);
            if ui.add(egui::Button::new(text).min_size([280.0, 28.0].into())).clicked() {
                chosen = Some(option.label.clone());
            }
        }
        chosen
    }

    fn progress_panel(ui: &mut egui::Ui, view: &DownloadView) {
        ui.label(RichText::new(&view.status_text).strong());
        ui.add(egui::ProgressBar::new(view.percent / 100.0).show_percentage());
        if !view.speed_text.is_empty() {
            ui.label(&view.speed_text);
        }
        ui.label(format!("Quality: {}", view.quality));
    }

    fn notice(&self, ctx: &egui::Context) {
        let Some(text) = self.controller.notice() else {
            return;
        };
        egui::Area::new(egui::Id::new("success_notice"))
            .anchor(egui::Align2::RIGHT_TOP, [-16.0, 16.0])
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style())
                    .fill(Color32::from_rgb(34, 197, 94))
                    .show(ui, |ui| {
                        ui.label(RichText::new(text).color(Color32::WHITE));
                    });
            });
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for VidgrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply backend results that arrived since the last frame
        if self.controller.pump().is_some() {
            self.url_input.clear();
        }

        // 2️⃣ Handle completed thumbnail fetches
        if let Ok(mut pending) = self.thumbnail_results.lock() {
            for (url, img) in pending.drain(..) {
                let tex = ctx.load_texture(&url, img, TextureOptions::default());
                self.thumbnails.insert(url, tex);
            }
        }

        // 3️⃣ Main panel: URL form plus whichever phase is current
        let state = self.controller.state().clone();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("YouTube Downloader");
            self.url_form(ui);
            ui.separator();

            match &state {
                SessionState::Idle => {
                    if let Some(saved) = self.controller.last_saved() {
                        ui.horizontal(|ui| {
                            ui.label(format!("Saved {}", saved.display()));
                            if ui.button("Open Folder").clicked() {
                                if let Some(dir) = saved.parent() {
                                    open_folder(dir);
                                }
                            }
                        });
                    }
                }
                SessionState::Loading { .. } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Fetching video information...");
                    });
                }
                SessionState::InfoDisplayed { info, .. } => {
                    self.request_thumbnail(ctx, &info.thumbnail_url);
                    if let Some(quality) = self.info_panel(ui, info) {
                        if let Err(e) = self.controller.choose_quality(&quality) {
                            warn!("cannot start download: {}", e);
                        }
                    }
                }
                SessionState::Downloading(view) => Self::progress_panel(ui, view),
                SessionState::Error { message } => {
                    ui.label(RichText::new(message).color(Color32::RED));
                    if ui.button("Try Again").clicked() {
                        self.controller.dismiss_error();
                    }
                }
            }
        });

        self.notice(ctx);

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn open_folder(folder: &Path) {
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        {
            let _ = std::process::Command::new("explorer").arg(folder).spawn();
        }
        #[cfg(target_os = "macos")]
        {
            let _ = std::process::Command::new("open").arg(folder).spawn();
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let _ = std::process::Command::new("xdg-open").arg(folder).spawn();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn valid_paste_flashes_for_one_second() {
        let start = Instant::now();
        let mut flash = PasteFlash::default();
        assert!(!flash.is_active(start));

        flash.pasted(&format!("  {URL} "), start);
        assert!(flash.is_active(start));
        assert!(flash.is_active(start + Duration::from_millis(999)));
        assert!(!flash.is_active(start + PASTE_FLASH));
    }

    #[test]
    fn other_pastes_do_not_flash() {
        let start = Instant::now();
        let mut flash = PasteFlash::default();
        flash.pasted("https://vimeo.com/123", start);
        flash.pasted("", start);
        assert!(!flash.is_active(start));
    }
}
