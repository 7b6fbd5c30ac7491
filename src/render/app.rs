//! Application window and event loop handler.
//!
//! This module owns the window, turns keyboard events into game actions on
//! the session event queue, and drives the presentation loop once per
//! display refresh.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use winit::application::ApplicationHandler;
use winit::error::EventLoopError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::input::events::RawInputEvent;
use crate::input::manager::InputManager;
use crate::logic::{LoopStatus, PresentationLoop};
use crate::models::engine::PlayfieldArea;
use crate::render::projector::{self, Scene, TextRole};
use crate::render::raster;
use crate::render::text::GlyphPainter;
use crate::system::bus::SessionEvent;

/// How often the queue is polled while nothing is animating.
const IDLE_POLL: Duration = Duration::from_millis(20);

const WINDOW_TITLE: &str = "rhythmforge";

struct Surface {
    _context: softbuffer::Context<Arc<Window>>,
    surface: softbuffer::Surface<Arc<Window>, Arc<Window>>,
}

/// Main application struct handling window events.
pub struct App {
    game: PresentationLoop,
    input: InputManager,
    events_tx: Sender<SessionEvent>,
    max_playfield_width: f32,
    font: Option<GlyphPainter>,

    window: Option<Arc<Window>>,
    surface: Option<Surface>,
    area: PlayfieldArea,
    title: String,
}

impl App {
    pub fn new(
        game: PresentationLoop,
        input: InputManager,
        events_tx: Sender<SessionEvent>,
        max_playfield_width: f32,
        font: Option<GlyphPainter>,
    ) -> Self {
        Self {
            game,
            input,
            events_tx,
            max_playfield_width,
            font,
            window: None,
            surface: None,
            area: PlayfieldArea::new(1280, 720, max_playfield_width),
            title: String::new(),
        }
    }

    /// Runs the application event loop (blocking).
    pub fn run(mut self) -> Result<(), EventLoopError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), String> {
        log::info!("RENDER: Creating window...");
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| e.to_string())?,
        );

        log::info!("RENDER: Initializing software surface (softbuffer)...");
        let context = softbuffer::Context::new(window.clone()).map_err(|e| e.to_string())?;
        let surface =
            softbuffer::Surface::new(&context, window.clone()).map_err(|e| e.to_string())?;

        let size = window.inner_size();
        self.area = PlayfieldArea::new(size.width, size.height, self.max_playfield_width);
        self.surface = Some(Surface {
            _context: context,
            surface,
        });
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<(), softbuffer::SoftBufferError> {
        let snapshot = self.game.snapshot();
        let scene = projector::project(&snapshot, &self.area, self.game.tolerance());
        self.update_title(&scene);

        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        let (Some(width), Some(height)) = (
            NonZeroU32::new(scene.width),
            NonZeroU32::new(scene.height),
        ) else {
            return Ok(());
        };

        surface.surface.resize(width, height)?;
        let mut buffer = surface.surface.buffer_mut()?;
        raster::rasterize(
            &scene,
            &mut buffer,
            width.get() as usize,
            height.get() as usize,
            self.font.as_ref(),
        );
        buffer.present()
    }

    /// Without a font, text goes to the title bar.
    fn update_title(&mut self, scene: &Scene) {
        if self.font.is_some() {
            return;
        }
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(scene.texts(TextRole::Overlay).into_iter().take(2));
        parts.extend(scene.texts(TextRole::Judgement));
        parts.extend(scene.texts(TextRole::Hud));
        parts.extend(scene.texts(TextRole::Notification));

        let title = if parts.is_empty() {
            WINDOW_TITLE.to_string()
        } else {
            format!("{WINDOW_TITLE} | {}", parts.join(" | "))
        };
        if title != self.title
            && let Some(window) = self.window.as_ref()
        {
            window.set_title(&title);
            self.title = title;
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_window(event_loop) {
            log::error!("RENDER: Window setup failed: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(raw) = RawInputEvent::from_winit(&event) {
            if let Some(action) = self.input.process(raw) {
                let _ = self.events_tx.send(SessionEvent::Input(action));
            }
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("RENDER: Close requested");
                let _ = self
                    .events_tx
                    .send(SessionEvent::Input(crate::input::events::GameAction::Quit));
                // Let the loop tear the session down before exiting.
                self.game.step();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.area
                    .update_size(size.width, size.height, self.max_playfield_width);
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    log::error!("RENDER: Present failed: {}", e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        match self.game.step() {
            LoopStatus::Quit => {
                event_loop.exit();
                return;
            }
            LoopStatus::Running => event_loop.set_control_flow(ControlFlow::Poll),
            LoopStatus::Stopped => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + IDLE_POLL))
            }
        }

        if self.game.needs_redraw()
            && let Some(window) = self.window.as_ref()
        {
            window.request_redraw();
        }
    }
}
