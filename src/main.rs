//! Overdraw Monitor
//!
//! Renders a layered stack of opaque and transparent quads through the
//! overdraw pipeline and shows the measured ratio in the window title.
//!
//! Controls: right mouse drag orbits, wheel zooms, `S` toggles the scene view,
//! `H` switches the composite between heatmap and shaded scene.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3};
use overdraw_core::DEFAULT_SETTINGS_FILE;
use overdraw_renderer::{
    Camera, Drawable, FrameInput, Mesh, OverdrawPipeline, OverdrawSettings, RenderQueue,
    RenderTargetDescriptor,
};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const OPAQUE_LAYERS: usize = 24;
const TRANSPARENT_LAYERS: usize = 16;
const SCENE_SPREAD: f32 = 4.0;

/// One quad of the demo scene.
struct SceneObject {
    transform: Mat4,
    position: Vec3,
    color: [f32; 4],
    render_queue: RenderQueue,
}

/// Scatter overlapping quads in front of the origin, opaque layers first
fn build_scene() -> Vec<SceneObject> {
    let mut rng = rand::rng();
    let mut objects = Vec::with_capacity(OPAQUE_LAYERS + TRANSPARENT_LAYERS);

    for i in 0..OPAQUE_LAYERS + TRANSPARENT_LAYERS {
        let transparent = i >= OPAQUE_LAYERS;
        let position = Vec3::new(
            rng.random_range(-SCENE_SPREAD..SCENE_SPREAD),
            rng.random_range(-SCENE_SPREAD..SCENE_SPREAD),
            rng.random_range(-SCENE_SPREAD..SCENE_SPREAD),
        );
        let scale = rng.random_range(1.0..4.0);
        let rotation = Quat::from_rotation_y(rng.random_range(-0.6..0.6))
            * Quat::from_rotation_x(rng.random_range(-0.6..0.6));

        let alpha = if transparent { 0.35 } else { 1.0 };
        objects.push(SceneObject {
            transform: Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, position),
            position,
            color: [
                rng.random_range(0.2..1.0),
                rng.random_range(0.2..1.0),
                rng.random_range(0.2..1.0),
                alpha,
            ],
            render_queue: if transparent {
                RenderQueue::TRANSPARENT
            } else {
                RenderQueue::GEOMETRY
            },
        });
    }

    objects
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    pipeline: OverdrawPipeline,
    camera: Camera,
    quad: Mesh,
    scene: Vec<SceneObject>,
    scene_view: bool,

    frame_times: VecDeque<f32>,
    last_frame_time: Instant,
}

impl GpuState {
    async fn new(window: Arc<Window>, settings: &OverdrawSettings) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;

        log::info!("✓ Using GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let pipeline = OverdrawPipeline::new(
            &device,
            &queue,
            settings,
            RenderTargetDescriptor::from_surface_config(&config),
        )
        .await?;
        log::info!("✓ Overdraw pipeline initialized");

        let quad = Mesh::quad(&device, "Scene Quad", Vec2::splat(-0.5), Vec2::splat(0.5), 0.0);
        let scene = build_scene();
        log::info!("✓ Scene built with {} quads", scene.len());

        let mut camera = Camera::new(config.width, config.height);
        camera.distance = 14.0;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            camera,
            quad,
            scene,
            scene_view: false,
            frame_times: VecDeque::with_capacity(100),
            last_frame_time: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.camera.resize(new_size.width, new_size.height);
        }
    }

    /// Render one frame; returns the averaged FPS.
    fn render(&mut self) -> Result<f32, wgpu::SurfaceError> {
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32() * 1000.0;
        self.last_frame_time = now;

        self.frame_times.push_back(frame_time);
        if self.frame_times.len() > 100 {
            self.frame_times.pop_front();
        }
        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let drawables: Vec<Drawable<'_>> = self
            .scene
            .iter()
            .map(|object| Drawable {
                mesh: &self.quad,
                transform: object.transform,
                color: object.color,
                render_queue: object.render_queue,
                sort_key: self.camera.view_depth(object.position),
            })
            .collect();

        let frame = FrameInput {
            descriptor: RenderTargetDescriptor::from_surface_config(&self.config),
            view_proj: self.camera.build_view_projection_matrix(),
            drawables: &drawables,
            scene_view: self.scene_view,
            destination: &view,
        };
        self.pipeline.render_frame(&frame);

        output.present();
        Ok(1000.0 / avg_frame_time.max(f32::EPSILON))
    }
}

struct App {
    settings: OverdrawSettings,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Overdraw Monitor")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(GpuState::new(window.clone(), &self.settings)) {
            Ok(gpu_state) => {
                self.window = Some(window);
                self.gpu_state = Some(gpu_state);
            }
            Err(e) => {
                log::error!("Failed to initialize GPU state: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    match key_code {
                        KeyCode::KeyS => {
                            gpu_state.scene_view = !gpu_state.scene_view;
                            log::info!("Scene view: {}", gpu_state.scene_view);
                        }
                        KeyCode::KeyH => {
                            let mode = gpu_state.pipeline.composite_mode().toggled();
                            gpu_state.pipeline.set_composite_mode(mode);
                            log::info!("Composite mode: {mode:?}");
                        }
                        _ => {}
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Right {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let (Some(last_pos), Some(gpu_state)) =
                        (self.last_mouse_pos, &mut self.gpu_state)
                    {
                        let delta_x = (position.x - last_pos.0) as f32;
                        let delta_y = (position.y - last_pos.1) as f32;
                        gpu_state.camera.rotate(-delta_x * 0.005, delta_y * 0.005);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_x, y) => y * 10.0,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };

                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state
                        .camera
                        .zoom(-scroll * gpu_state.camera.distance / 100.0);
                }
            }

            WindowEvent::RedrawRequested => {
                if let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) {
                    match gpu_state.render() {
                        Ok(fps) => {
                            window.set_title(&format!(
                                "Overdraw {} - {:?}{} - {:.0} FPS",
                                gpu_state.pipeline.ratio_handle().load(),
                                gpu_state.pipeline.composite_mode(),
                                if gpu_state.scene_view { " (scene view)" } else { "" },
                                fps
                            ));
                        }
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu_state.resize(window.inner_size())
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => log::warn!("Render error: {e:?}"),
                    }
                }
            }

            _ => {}
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu_state) = &mut self.gpu_state {
            gpu_state.pipeline.teardown();
        }
    }
}

fn main() -> Result<()> {
    // Initialize logger (RUST_LOG=debug for per-frame readback output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());
    let settings = OverdrawSettings::load_or_default(&settings_path)
        .with_context(|| format!("failed to load settings from {settings_path}"))?;

    log::info!("Starting overdraw monitor...");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        settings,
        window: None,
        gpu_state: None,
        mouse_pressed: false,
        last_mouse_pos: None,
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
