use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{debug, error, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{GpuContext, GpuHost, GpuLayerSurface, GpuState};
use crate::runtime::FrameScheduler;
use crate::types::{RendererConfig, SurfaceSize};
use crate::visualizer::{Visualizer, VisualizerOptions};

/// Per-second fade of the pointer glow after the button is released.
const POINTER_DECAY: f32 = 2.5;

/// Aggregates GPU state and the visualizer for the windowed preview path.
struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
    visualizer: Visualizer<GpuLayerSurface>,
    mouse: MouseState,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        let context = GpuContext::new(
            window.as_ref(),
            size,
            config.antialiasing,
            config.color_space,
        )?;
        let gpu = GpuState::new(context);
        let mut host = GpuHost::new(gpu.context());
        let options = VisualizerOptions::from_config(config).with_pointer_decay(POINTER_DECAY);
        let visualizer = Visualizer::construct(&mut host, options);
        if visualizer.surfaces().live_count() == 0 {
            return Err(anyhow!("no layer surface could be created"));
        }

        Ok(Self {
            window,
            gpu,
            visualizer,
            mouse: MouseState::default(),
        })
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.visualizer
            .resize(SurfaceSize::new(new_size.width, new_size.height));
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.mouse.position = Some(position);
        let [x, y] = self.mouse.normalized(self.gpu.size());
        if self.mouse.pressed {
            self.visualizer.update_mouse(x, y, 1.0);
        } else {
            self.visualizer.move_mouse(x, y);
        }
    }

    fn handle_mouse_button(&mut self, button_state: ElementState) {
        self.mouse.pressed = button_state == ElementState::Pressed;
        if self.mouse.pressed {
            let [x, y] = self.mouse.normalized(self.gpu.size());
            self.visualizer.update_mouse(x, y, 1.0);
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) -> KeyAction {
        if event.state != ElementState::Pressed || event.repeat {
            return KeyAction::None;
        }
        let current = self.visualizer.variant();
        let next = match event.logical_key {
            Key::Named(NamedKey::Escape) => return KeyAction::Exit,
            Key::Named(NamedKey::Space) => current.saturating_add(1),
            Key::Named(NamedKey::Backspace) => current.saturating_sub(1),
            _ => return KeyAction::None,
        };
        if next != current {
            self.visualizer.set_variant(next);
        }
        KeyAction::Redraw
    }

    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        // A held button keeps the glow at full strength between cursor moves.
        if self.mouse.pressed {
            let [x, y] = self.mouse.normalized(self.gpu.size());
            self.visualizer.update_mouse(x, y, 1.0);
        }
        let Some(report) = self.visualizer.tick() else {
            return Ok(());
        };
        if report.skipped > 0 {
            debug!(frame = report.frame, skipped = report.skipped, "layers skipped");
        }
        let layers = self
            .visualizer
            .surfaces_mut()
            .live_mut()
            .map(|(_, _, surface)| surface);
        self.gpu.present(layers)
    }
}

enum KeyAction {
    None,
    Redraw,
    Exit,
}

#[derive(Debug, Default)]
struct MouseState {
    position: Option<PhysicalPosition<f64>>,
    pressed: bool,
}

impl MouseState {
    /// Pointer in surface uv with the origin at the bottom-left corner.
    fn normalized(&self, size: PhysicalSize<u32>) -> [f32; 2] {
        let Some(position) = self.position else {
            return [0.5, 0.5];
        };
        let width = f64::from(size.width.max(1));
        let height = f64::from(size.height.max(1));
        [
            (position.x / width) as f32,
            (1.0 - position.y / height) as f32,
        ]
    }
}

/// Opens the preview window and runs the visualizer until it is closed.
pub(crate) fn run(config: RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("holoshade")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err}"))?;
    let mut scheduler = FrameScheduler::new(&config.policy);
    if scheduler.ready_for_frame(Instant::now()) {
        state.window().request_redraw();
    }

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        state.visualizer.stop();
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => match state.handle_key(&event) {
                        KeyAction::Exit => {
                            state.visualizer.stop();
                            elwt.exit();
                        }
                        KeyAction::Redraw => {
                            scheduler.reset();
                            state.window().request_redraw();
                        }
                        KeyAction::None => {}
                    },
                    WindowEvent::CursorMoved { position, .. } => {
                        state.handle_cursor_moved(position);
                    }
                    WindowEvent::MouseInput {
                        state: button_state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        state.handle_mouse_button(button_state);
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(new_size);
                        scheduler.reset();
                        state.window().request_redraw();
                    }
                    WindowEvent::RedrawRequested => match state.render_frame() {
                        Ok(()) => scheduler.mark_rendered(Instant::now()),
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let size = state.gpu.size();
                            state.resize(size);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting preview");
                            state.visualizer.stop();
                            elwt.exit();
                        }
                        Err(other) => {
                            warn!("surface error: {other:?}; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                if !state.visualizer.is_running() {
                    elwt.exit();
                    return;
                }
                let now = Instant::now();
                if scheduler.ready_for_frame(now) {
                    state.window().request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = scheduler.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
