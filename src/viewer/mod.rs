//! Standalone host window embedding one map canvas.
//!
//! The window plays the role of the surrounding UI: every frame it drains the
//! disposal queue, asks the canvas for its texture at the window's size, and
//! blits that texture onto the surface.

pub mod config;
pub mod present;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

pub use config::ViewerConfig;
pub use present::Presenter;

use crate::canvas::Canvas;
use crate::deferred::DisposalQueue;
use crate::gpu::{PipelineCache, TextureId, WgpuGpu};
use crate::map::TileMap;
use crate::renderer::bucket::{Bucket, Placeholder};
use crate::renderer::view::ViewState;
use crate::sprites::SpriteStore;

// ── ViewerBuilder ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ViewerBuilder {
    config: ViewerConfig,
    map_path: Option<PathBuf>,
}

impl ViewerBuilder {
    pub fn with_config(mut self, config: ViewerConfig) -> Self { self.config = config; self }

    /// Directory scanned recursively for `.png` sprite sheets at startup.
    pub fn with_sprite_folder(mut self, path: &str) -> Self {
        self.config.sprite_folder = Some(path.to_string()); self
    }

    /// Map snapshot loaded at startup and again on every `R` press.
    pub fn with_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_path = Some(path.into()); self
    }

    /// Open the window and block until it closes.
    pub fn run(self) -> anyhow::Result<()> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        let mut app = App {
            config: self.config,
            map_path: self.map_path,
            pipelines: PipelineCache::new(),
            viewer: None,
            fatal: None,
        };
        event_loop.run_app(&mut app).context("event loop terminated abnormally")?;
        match app.fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── Viewer ────────────────────────────────────────────────────────────────────

/// Everything that exists only while the window does.
struct Viewer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    gpu: WgpuGpu,
    presenter: Presenter,
    sprites: SpriteStore,
    canvas: Option<Canvas<WgpuGpu>>,
    disposal: DisposalQueue<WgpuGpu>,
    /// Texture shown when the canvas fails to produce a new one.
    shown: Option<TextureId>,
    cursor: [f32; 2],
    dragging: bool,
}

async fn init_wgpu(
    window: Arc<Window>,
) -> anyhow::Result<(wgpu::Surface<'static>, wgpu::SurfaceConfiguration, wgpu::Device, wgpu::Queue)> {
    let size = window.inner_size();

    let instance = wgpu::Instance::default();
    let surface = instance.create_surface(window).context("failed to create surface")?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            compatible_surface: Some(&surface),
            ..Default::default()
        })
        .await
        .context("no suitable GPU adapter found")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default())
        .await
        .context("failed to create device")?;

    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .context("surface reports no formats")?;

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    Ok((surface, surface_config, device, queue))
}

/// Build the batch for `map_path`.  A missing or malformed map yields an
/// empty batch so the viewer still opens.
fn build_bucket(map_path: Option<&PathBuf>, sprites: &SpriteStore) -> Bucket {
    let Some(path) = map_path else { return Bucket::empty() };
    match TileMap::load(path) {
        Ok(map) => {
            log::info!(
                "[viewer] map {:?}: {}x{} tiles, {} objects",
                path,
                map.width,
                map.height,
                map.object_count()
            );
            Bucket::build(&map, sprites, &Placeholder::tile(map.tile_size))
        }
        Err(e) => {
            log::warn!("[viewer] failed to load map {:?}: {e}", path);
            Bucket::empty()
        }
    }
}

impl Viewer {
    fn panel_size(&self) -> [f32; 2] {
        [self.surface_config.width as f32, self.surface_config.height as f32]
    }

    fn reload_map(&mut self, map_path: Option<&PathBuf>) {
        let bucket = build_bucket(map_path, &self.sprites);
        let Some(canvas) = self.canvas.as_mut() else { return };
        if let Err(e) = canvas.load_batch(&mut self.gpu, &mut self.disposal, bucket) {
            log::warn!("[viewer] failed to upload batch: {e}");
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(self.gpu.device(), &self.surface_config);
    }

    fn zoom(&mut self, notches: f32, config: &ViewerConfig) {
        let anchor = self.cursor;
        let height = self.surface_config.height as f32;
        let Some(canvas) = self.canvas.as_mut() else { return };
        let state = canvas.state_mut();
        let target = config.clamp_zoom(state.scale() * config.zoom_step.powf(notches));
        state.zoom_at(target / state.scale(), anchor, height);
    }

    fn redraw(&mut self) {
        self.disposal.drain(&mut self.gpu);

        let panel = self.panel_size();
        if let Some(canvas) = self.canvas.as_mut() {
            match canvas.process_frame(&mut self.gpu, &mut self.disposal, panel) {
                Ok(texture) => self.shown = Some(texture),
                Err(e) => log::warn!("[viewer] canvas frame failed: {e}"),
            }
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.resize_surface(size.width, size.height);
                return;
            }
            Err(e) => {
                log::warn!("[viewer] surface error: {e}");
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(texture) = self.shown {
            self.presenter.present(&self.gpu, texture, &view);
        }
        self.window.pre_present_notify();
        frame.present();
    }

    /// Dispose the canvas and run the queue once more so nothing outlives the device.
    fn shutdown(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            canvas.dispose(&mut self.disposal);
        }
        self.presenter.invalidate();
        self.shown = None;
        let ran = self.disposal.drain(&mut self.gpu);
        log::debug!("[viewer] shutdown ran {} disposal tasks", ran);
    }
}

// ── App (winit ApplicationHandler) ────────────────────────────────────────────

struct App {
    config: ViewerConfig,
    map_path: Option<PathBuf>,
    pipelines: PipelineCache<WgpuGpu>,
    viewer: Option<Viewer>,
    /// Error that ended the event loop; returned from [`ViewerBuilder::run`].
    fatal: Option<anyhow::Error>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Viewer> {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title(&self.config.title)
                        .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height)),
                )
                .context("failed to create window")?,
        );

        let (surface, surface_config, device, queue) = pollster::block_on(init_wgpu(Arc::clone(&window)))?;
        let presenter = Presenter::new(&device, surface_config.format);
        let mut gpu = WgpuGpu::new(device, queue);

        let pipeline = self.pipelines.get_or_init(&mut gpu).context("tile pipeline unavailable")?;

        let sprites = match &self.config.sprite_folder {
            Some(folder) => {
                SpriteStore::load_folder(&mut gpu, folder, self.config.frame_width, self.config.frame_height)
            }
            None => SpriteStore::new(),
        };

        let mut viewer = Viewer {
            window,
            surface,
            surface_config,
            gpu,
            presenter,
            sprites,
            canvas: Some(Canvas::new(pipeline).with_background(self.config.background)),
            disposal: DisposalQueue::new(),
            shown: None,
            cursor: [0.0, 0.0],
            dragging: false,
        };
        viewer.reload_map(self.map_path.as_ref());
        Ok(viewer)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(viewer) => self.viewer = Some(viewer),
            Err(e) => {
                log::error!("[viewer] {e:#}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_ref() {
            viewer.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(viewer) = self.viewer.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => {
                viewer.shutdown();
                self.viewer = None;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => viewer.resize_surface(size.width, size.height),

            WindowEvent::CursorMoved { position, .. } => {
                let pos = [position.x as f32, position.y as f32];
                if viewer.dragging {
                    let (dx, dy) = (pos[0] - viewer.cursor[0], pos[1] - viewer.cursor[1]);
                    if let Some(canvas) = viewer.canvas.as_mut() {
                        canvas.state_mut().pan_by(dx, dy);
                    }
                }
                viewer.cursor = pos;
            }

            WindowEvent::MouseInput { button: MouseButton::Left, state, .. } => {
                viewer.dragging = state == ElementState::Pressed;
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 100.0) as f32,
                };
                viewer.zoom(notches, &self.config);
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::KeyR => {
                    log::info!("[viewer] reloading map");
                    viewer.reload_map(self.map_path.as_ref());
                }
                KeyCode::Home => {
                    if let Some(canvas) = viewer.canvas.as_mut() {
                        *canvas.state_mut() = ViewState::new();
                    }
                }
                _ => {}
            },

            WindowEvent::RedrawRequested => viewer.redraw(),

            _ => {}
        }
    }
}
