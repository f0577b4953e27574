use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec2;
use log::{error, info};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{WindowAttributes, WindowId};

use shadow_scene::assets::AssetLibrary;
use shadow_scene::render::headless::MAX_TEXTURE_DIMENSION;
use shadow_scene::render::shadow::ShadowMapTarget;
use shadow_scene::render::Viewport;
use shadow_scene::{
    CliOptions, FrameScheduler, GraphicsBackend, HeadlessBackend, InputCommand, InputState,
    KeyCode, NamedKey, RenderConfig, RenderState, Renderer, Scene, StartupError,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = options
        .resolve_config()
        .context("failed to load configuration")?;
    if options.headless {
        run_headless(config, &options)
    } else {
        run_interactive(config, options.commands)
    }
}

fn run_headless(config: RenderConfig, options: &CliOptions) -> Result<()> {
    let target = ShadowMapTarget::new(config.shadow_resolution, MAX_TEXTURE_DIMENSION)?;
    let mut backend = HeadlessBackend::new(
        Viewport {
            width: config.window.width,
            height: config.window.height,
        },
        target,
    );
    let assets = AssetLibrary::new(&config.asset_root);
    let scene = Scene::upload(&config.scene, &assets, &mut backend);
    info!("scene uploaded with {} object(s)", scene.objects.len());

    let mut scheduler = FrameScheduler::new(RenderState::new(&config, scene));
    let mut commands = options.commands.as_slice();
    for _ in 0..options.frames {
        if scheduler.should_close() {
            break;
        }
        scheduler.run_frame(&mut backend, commands)?;
        commands = &[];
    }

    print_summary(&scheduler, &backend);
    Ok(())
}

fn print_summary(scheduler: &FrameScheduler, backend: &HeadlessBackend) {
    let state = scheduler.state();
    let target = backend.shadow_target();
    println!(
        "Rendered {} frame(s) with a {}x{} shadow map",
        scheduler.frames(),
        target.width(),
        target.height()
    );
    println!("Scene objects:");
    for object in &state.scene.objects {
        println!(" - {}", object.name);
    }
    let position = state.camera.position();
    println!(
        "Camera pos=({:.2}, {:.2}, {:.2})",
        position.x, position.y, position.z
    );
    println!("Light angle={:.1}", state.light.angle());
    println!("View mode: {:?}", state.options.view);
    println!("Polygon mode: {:?}", state.options.polygon_mode);
}

fn run_interactive(config: RenderConfig, commands: Vec<InputCommand>) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| StartupError::WindowUnavailable(err.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        config,
        pending_commands: commands,
        input: InputState::new(),
        session: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct ViewerApp {
    config: RenderConfig,
    pending_commands: Vec<InputCommand>,
    input: InputState,
    session: Option<Session>,
    last_error: Option<anyhow::Error>,
}

/// GPU state that only exists while the window does.
struct Session {
    renderer: Renderer,
    scheduler: FrameScheduler,
}

impl ViewerApp {
    fn start_session(&self, event_loop: &ActiveEventLoop) -> Result<Session> {
        let window = &self.config.window;
        let attributes = WindowAttributes::default()
            .with_title(window.title.clone())
            .with_inner_size(LogicalSize::new(window.width, window.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| StartupError::WindowUnavailable(err.to_string()))?,
        );

        let mut renderer = block_on(Renderer::new(window, self.config.shadow_resolution))?;
        let assets = AssetLibrary::new(&self.config.asset_root);
        let scene = Scene::upload(&self.config.scene, &assets, &mut renderer);
        info!("scene uploaded with {} object(s)", scene.objects.len());

        let scheduler = FrameScheduler::new(RenderState::new(&self.config, scene));
        Ok(Session {
            renderer,
            scheduler,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:?}");
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = &self.session {
            session.renderer.window().request_redraw();
            return;
        }
        match self.start_session(event_loop) {
            Ok(session) => {
                session.renderer.window().request_redraw();
                self.session = Some(session);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if window_id != session.renderer.window_id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => session.renderer.resize(size),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => {
                let mut commands = std::mem::take(&mut self.pending_commands);
                commands.extend(self.input.drain_commands());
                if let Err(err) = session.scheduler.run_frame(&mut session.renderer, &commands) {
                    self.fail(event_loop, err);
                    return;
                }
                if session.scheduler.should_close() {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = &self.session {
            session.renderer.window().request_redraw();
        }
    }
}

fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    Some(match code {
        WinitKey::ArrowLeft => KeyCode::Named(NamedKey::Left),
        WinitKey::ArrowRight => KeyCode::Named(NamedKey::Right),
        WinitKey::ArrowUp => KeyCode::Named(NamedKey::Up),
        WinitKey::ArrowDown => KeyCode::Named(NamedKey::Down),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::KeyE => KeyCode::Character('E'),
        WinitKey::KeyF => KeyCode::Character('F'),
        WinitKey::KeyG => KeyCode::Character('G'),
        WinitKey::KeyI => KeyCode::Character('I'),
        WinitKey::KeyM => KeyCode::Character('M'),
        WinitKey::KeyN => KeyCode::Character('N'),
        WinitKey::KeyO => KeyCode::Character('O'),
        WinitKey::KeyP => KeyCode::Character('P'),
        WinitKey::KeyQ => KeyCode::Character('Q'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyW => KeyCode::Character('W'),
        WinitKey::KeyX => KeyCode::Character('X'),
        WinitKey::KeyZ => KeyCode::Character('Z'),
        _ => return None,
    })
}
