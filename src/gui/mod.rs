//! The eframe/egui window.
//!
//! [`PlayerWindow`] implements `eframe::App` around an [`Installation`]. Each
//! `update` call is one iteration of the control loop: forward key presses,
//! poll the serial link once, run the due playback ticks, then upload the
//! presented frame as a texture stretched over the whole window. The window
//! schedules its own next repaint for when the next tick is due, so playback
//! speed follows the configured frame rate rather than the display refresh.

use std::time::Instant;

use eframe::egui;
use tracing::{error, info};

use crate::app::{command_for_key, FixedTimestep, Installation, Key};
use crate::config::WindowSettings;
use crate::error::{AppResult, PlayerError};
use crate::playback::{Frame, VideoBackend};
use crate::serial::LineSource;

const KEY_BINDINGS: [(egui::Key, Key); 11] = [
    (egui::Key::Escape, Key::Escape),
    (egui::Key::F11, Key::F11),
    (egui::Key::S, Key::Char('s')),
    (egui::Key::D, Key::Char('d')),
    (egui::Key::F, Key::Char('f')),
    (egui::Key::G, Key::Char('g')),
    (egui::Key::H, Key::Char('h')),
    (egui::Key::J, Key::Char('j')),
    (egui::Key::V, Key::Char('v')),
    (egui::Key::B, Key::Char('b')),
    (egui::Key::N, Key::Char('n')),
];

/// Window presenting the engine's frames.
pub struct PlayerWindow<B: VideoBackend, P: LineSource> {
    installation: Installation<B, P>,
    clock: FixedTimestep,
    texture: Option<egui::TextureHandle>,
    uploaded: Option<u64>,
    fullscreen: bool,
}

impl<B: VideoBackend, P: LineSource> PlayerWindow<B, P> {
    /// Wrap an installation and run its initial selection.
    pub fn new(mut installation: Installation<B, P>, fps: u32) -> Self {
        installation.start();
        let fullscreen = installation.fullscreen();
        Self {
            installation,
            clock: FixedTimestep::new(fps, Instant::now()),
            texture: None,
            uploaded: None,
            fullscreen,
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let pressed: Vec<Key> = ctx.input(|i| {
            KEY_BINDINGS
                .iter()
                .filter(|(egui_key, _)| i.key_pressed(*egui_key))
                .map(|(_, key)| *key)
                .collect()
        });
        for command in pressed.into_iter().filter_map(command_for_key) {
            self.installation.handle_command(command);
        }
    }

    fn sync_viewport(&mut self, ctx: &egui::Context) {
        if !self.installation.is_running() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }
        let wanted = self.installation.fullscreen();
        if wanted != self.fullscreen {
            self.fullscreen = wanted;
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(wanted));
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let count = self.installation.engine().presented_count();
        if self.uploaded == Some(count) {
            return;
        }
        let image = color_image(self.installation.presented());
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("video-frame", image, egui::TextureOptions::LINEAR));
            }
        }
        self.uploaded = Some(count);
    }
}

impl<B: VideoBackend, P: LineSource> eframe::App for PlayerWindow<B, P> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);
        self.installation.poll_serial();

        for _ in 0..self.clock.due_ticks(Instant::now()) {
            self.installation.tick();
        }
        self.upload_frame(ctx);
        self.sync_viewport(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::WHITE))
            .show(ctx, |ui| {
                if let Some(texture) = &self.texture {
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter()
                        .image(texture.id(), ui.max_rect(), uv, egui::Color32::WHITE);
                }
            });

        ctx.request_repaint_after(self.clock.until_next());
    }
}

fn color_image(frame: &Frame) -> egui::ColorImage {
    egui::ColorImage::from_rgb(
        [frame.width() as usize, frame.height() as usize],
        frame.pixels(),
    )
}

/// Open the window and run until it is closed or the operator quits.
pub fn run<B, P>(installation: Installation<B, P>, window: &WindowSettings, fps: u32) -> AppResult<()>
where
    B: VideoBackend + 'static,
    P: LineSource + 'static,
{
    let size = {
        let frame = installation.presented();
        [frame.width() as f32, frame.height() as f32]
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(window.title.clone())
            .with_inner_size(size)
            .with_fullscreen(installation.fullscreen()),
        ..Default::default()
    };

    info!("Opening window '{}'", window.title);
    let result = eframe::run_native(
        &window.title,
        options,
        Box::new(move |_cc| Ok(Box::new(PlayerWindow::new(installation, fps)))),
    );
    result.map_err(|e| {
        error!("Window failed: {}", e);
        PlayerError::Window(e.to_string())
    })
}
