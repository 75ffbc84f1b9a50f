use std::sync::Arc;

use anyhow::{Context, Result};
use iat_core::KeyInput;
use iat_experiment::{BlockPlan, ExperimentConfig, ExportStatus, FileSink, Session, StimulusSets};
use iat_render::{FontVec, SkiaRenderer, load_font};
use iat_timing::HighPrecisionTimer;
use pixels::{Pixels, SurfaceTexture};
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::Cli;

/// Longest identifier the start screen accepts as typed; validation decides
/// the rest.
const MAX_ID_INPUT: usize = 8;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    font: Option<FontVec>,
    session: Session<HighPrecisionTimer, FileSink>,

    id_input: String,
    cursor: (f64, f64),
    windowed: bool,
    should_exit: bool,
}

impl App {
    /// Loads configuration, stimuli and font, and builds the block plan.
    /// Any failure here is fatal.
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => ExperimentConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => {
                let config = ExperimentConfig::default();
                config.validate()?;
                config
            }
        };
        let sets = StimulusSets::load(&config).context("loading stimulus files")?;
        let plan = BlockPlan::build(&config, &sets, &mut rand::rng());
        let font = load_font(&cli.font)?;

        let sink = FileSink::new(&cli.output_dir);
        info!(output_dir = %sink.dir().display(), "results directory");
        let session = Session::new(config, plan, HighPrecisionTimer::new(), sink);

        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            font: Some(font),
            session,
            id_input: String::new(),
            cursor: (0.0, 0.0),
            windowed: cli.windowed,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "starting"
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let font = self.font.take().context("window already created")?;

        let mut attributes = Window::default_attributes().with_title("IAT");
        if !self.windowed {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .context("no monitor available")?;
            attributes = attributes
                .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
                .with_resizable(false);
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            "display"
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);

        let texts = &self.session.config().texts;
        self.renderer = Some(SkiaRenderer::new(
            size.width,
            size.height,
            font,
            &texts.start_prompt,
            &texts.end,
        )?);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        renderer.render_frame(pixels.frame_mut())?;
        pixels.render()?;
        Ok(())
    }

    fn handle_key(&mut self, event: KeyEvent, event_loop: &ActiveEventLoop) {
        if event.logical_key == Key::Named(NamedKey::Escape) {
            self.cleanup_and_exit(event_loop);
            return;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if self.session.phase().is_start() {
            match &event.logical_key {
                Key::Named(NamedKey::Enter) => {
                    match self.session.submit_participant(&self.id_input, renderer) {
                        Ok(()) => self.id_input.clear(),
                        Err(e) => warn!(error = %e, "identifier rejected"),
                    }
                }
                Key::Named(NamedKey::Backspace) => {
                    self.id_input.pop();
                }
                Key::Character(s) => {
                    for c in s.chars().filter(|c| !c.is_control()) {
                        if self.id_input.chars().count() < MAX_ID_INPUT {
                            self.id_input.push(c);
                        }
                    }
                }
                _ => {}
            }
            renderer.set_start_input(&self.id_input);
            return;
        }

        let key = match &event.logical_key {
            Key::Named(NamedKey::Enter) => KeyInput::from_label("Enter"),
            Key::Character(s) => KeyInput::from_label(s),
            _ => KeyInput::Other,
        };
        self.session.key_pressed(key, renderer);
    }

    fn handle_click(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if renderer.hits_continue(self.cursor.0, self.cursor.1) {
            self.session.continue_pressed(renderer);
        }
    }

    /// Fires due timers, then reports a finished stimulus load.
    fn pump(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        self.session.poll(renderer);
        if renderer.finish_pending_load() {
            self.session.asset_ready(renderer);
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!(error = ?e, "failed to resize renderer");
            }
        }
        info!(width = new_size.width, height = new_size.height, "display resized");
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_finished() {
            match self.session.export_status() {
                ExportStatus::Saved(path) => info!(path = %path.display(), "results saved"),
                ExportStatus::Skipped => info!("no results to save"),
                ExportStatus::Failed(e) => error!(error = %e, "results were not saved"),
                ExportStatus::Pending => {}
            }
        } else {
            warn!(
                completed = self.session.completed_trials(),
                total = self.session.total_trials(),
                "session closed before the end, nothing saved"
            );
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = ?e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = ?e, "render failed");
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                self.handle_key(event, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        self.pump();

        if let (Some(window), Some(renderer)) = (&self.window, &self.renderer) {
            if renderer.is_dirty() {
                window.request_redraw();
            }
        }

        let flow = match self
            .session
            .next_deadline()
            .and_then(|ns| self.session.clock().instant_at(ns))
        {
            Some(at) => ControlFlow::WaitUntil(at),
            None => ControlFlow::Wait,
        };
        event_loop.set_control_flow(flow);
    }
}
