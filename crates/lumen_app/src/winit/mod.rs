//! Winit-based Application Framework
//!
//! - [`App`]: builder for configuring and launching an application
//! - [`AppHandler`]: trait implemented by the application
//! - `AppRunner`: the winit event loop handler (internal)
//!
//! The runner owns the [`RenderContext`]. Window resizes are forwarded to
//! [`RenderContext::resize`], and every redraw renders one frame through
//! [`RenderContext::render_frame`] with the handler drawing the scene.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumen_app::{App, AppHandler, FrameState, Key};
//!
//! struct Viewer;
//!
//! impl AppHandler for Viewer {
//!     fn init(ctx: &mut RenderContext, window: &Arc<Window>) -> Result<Self> {
//!         Ok(Viewer)
//!     }
//!
//!     fn draw_scene(&mut self, device: &mut WgpuDevice) {
//!         // record scene passes via device.begin_scene_pass(..)
//!     }
//! }
//!
//! fn main() -> lumen_core::Result<()> {
//!     App::new().with_title("Viewer").run::<Viewer>()
//! }
//! ```

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
pub use winit::window::{Window, WindowId};

use lumen_core::{LumenError, Result, Timer};
use lumen_render::{FrameStatus, RenderContext, RendererSettings, WgpuDevice};

use crate::input::Key;

pub mod input_adapter;

/// Frame timing handed to [`AppHandler::update`].
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    /// Seconds since the application started
    pub time: f32,
    /// Seconds since the previous frame
    pub dt: f32,
    pub frame_count: u64,
}

/// Application behavior.
///
/// # Lifecycle
///
/// 1. [`init`](Self::init): once, after the window and renderer exist
/// 2. [`on_key`](Self::on_key): for each key press
/// 3. [`update`](Self::update): each frame before rendering
/// 4. [`draw_scene`](Self::draw_scene): each frame, with the HDR target bound
pub trait AppHandler: Sized + 'static {
    fn init(ctx: &mut RenderContext, window: &Arc<Window>) -> Result<Self>;

    /// Handles a key press. Return `true` to consume it; unconsumed
    /// [`Key::Escape`] closes the window.
    #[allow(unused_variables)]
    fn on_key(&mut self, ctx: &mut RenderContext, key: Key) -> bool {
        false
    }

    #[allow(unused_variables)]
    fn update(&mut self, ctx: &mut RenderContext, window: &Arc<Window>, frame: &FrameState) {}

    /// Records the scene into the bound HDR color and depth.
    fn draw_scene(&mut self, device: &mut WgpuDevice);

    /// Called after every frame with what happened to it.
    #[allow(unused_variables)]
    fn frame_finished(&mut self, status: FrameStatus) {}
}

/// Application builder.
///
/// ```rust,ignore
/// App::new()
///     .with_title("HDR")
///     .with_settings(RendererSettings::default().with_vsync(false))
///     .run::<MyHandler>()?;
/// ```
pub struct App {
    title: String,
    size: (u32, u32),
    render_settings: RendererSettings,
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: "Lumen".into(),
            size: (1280, 720),
            render_settings: RendererSettings::default(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Initial logical window size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: RendererSettings) -> Self {
        self.render_settings = settings;
        self
    }

    /// Runs the application until its window closes.
    ///
    /// Returns the error that stopped the renderer, if any.
    pub fn run<H: AppHandler>(self) -> Result<()> {
        let event_loop =
            EventLoop::new().map_err(|e| LumenError::EventLoopError(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut runner = AppRunner::<H>::new(self.title, self.size, self.render_settings);
        event_loop
            .run_app(&mut runner)
            .map_err(|e| LumenError::EventLoopError(e.to_string()))?;

        match runner.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

struct AppRunner<H: AppHandler> {
    title: String,
    size: (u32, u32),
    render_settings: RendererSettings,

    window: Option<Arc<Window>>,
    ctx: Option<RenderContext>,
    user_state: Option<H>,

    timer: Timer,
    fatal: Option<LumenError>,
}

impl<H: AppHandler> AppRunner<H> {
    fn new(title: String, size: (u32, u32), render_settings: RendererSettings) -> Self {
        Self {
            title,
            size,
            render_settings,
            window: None,
            ctx: None,
            user_state: None,
            timer: Timer::new(),
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: LumenError) {
        log::error!("Fatal Renderer Error: {error}");
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn init(&mut self, window: &Arc<Window>) -> Result<()> {
        log::info!("Initializing Renderer Backend...");

        let size = window.inner_size();
        let mut ctx = pollster::block_on(RenderContext::new(
            Arc::clone(window),
            size.width,
            size.height,
            self.render_settings.clone(),
        ))?;
        let user_state = H::init(&mut ctx, window)?;

        self.ctx = Some(ctx);
        self.user_state = Some(user_state);
        self.timer = Timer::new();
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        self.timer.tick();

        let (Some(window), Some(ctx), Some(user_state)) =
            (&self.window, &mut self.ctx, &mut self.user_state)
        else {
            return Ok(());
        };

        let frame_state = FrameState {
            time: self.timer.elapsed.as_secs_f32(),
            dt: self.timer.dt_seconds(),
            frame_count: self.timer.frame_count,
        };
        user_state.update(ctx, window, &frame_state);

        let status = match ctx.render_frame(|device| user_state.draw_scene(device)) {
            Ok(status) => status,
            Err(e) if e.is_recoverable() => {
                log::warn!("Frame dropped: {e}");
                FrameStatus::Skipped
            }
            Err(e) => return Err(e),
        };
        user_state.frame_finished(status);
        Ok(())
    }
}

impl<H: AppHandler> ApplicationHandler for AppRunner<H> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.size;
        let window_attributes = Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, LumenError::EventLoopError(e.to_string()));
                return;
            }
        };
        self.window = Some(Arc::clone(&window));

        if let Err(e) = self.init(&window) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(ctx), Some(user_state)) = (&mut self.ctx, &mut self.user_state) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Err(e) = ctx.resize(size.width, size.height) {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                let Some(key) = input_adapter::translate_key(event.physical_key) else {
                    return;
                };
                if !user_state.on_key(ctx, key) && key == Key::Escape {
                    event_loop.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.ctx.is_some()
            && let Some(window) = &self.window
        {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.user_state = None;
        if let Some(ctx) = self.ctx.take() {
            ctx.destroy();
        }
    }
}
