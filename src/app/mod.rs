mod controller;
mod input;

pub use controller::{Controller, InputEvent, Presenter};

use crate::defaults::{WINDOW_SIZE, WINDOW_TITLE};
use crate::options::{self, Configuration, LaunchOptions};
use crate::render::{SceneLoader, SettlementSink};
use crate::scene::SceneHandle;
use crate::scope::{BlobRegistry, ScopeTracker};
use crate::session::{SessionManager, Settlement, ViewerFactory};
use crate::validate::{ReportValidator, ValidationReport};
use input::DropZone;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::error::EventLoopError;
use winit::event::{ElementState, Modifiers, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Events posted to the loop from worker threads.
#[derive(Debug)]
pub enum AppEvent {
    LoadSettled(Settlement),
}

/// Presents controller state through the window title and native dialogs.
struct WindowPresenter {
    window: Arc<Window>,
    busy: bool,
    annotation: Option<String>,
    scene: Option<String>,
}

impl WindowPresenter {
    fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            busy: false,
            annotation: None,
            scene: None,
        }
    }

    fn refresh_title(&self) {
        let mut title = WINDOW_TITLE.to_string();
        if let Some(scene) = &self.scene {
            title.push_str(" - ");
            title.push_str(scene);
        }
        if let Some(annotation) = &self.annotation {
            title.push_str(&format!(" (by {})", annotation));
        }
        if self.busy {
            title.push_str(" [loading...]");
        }
        self.window.set_title(&title);
    }
}

impl Presenter for WindowPresenter {
    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        self.refresh_title();
    }

    fn alert(&mut self, message: &str) {
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title(WINDOW_TITLE)
            .set_description(message)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }

    fn hide_chrome(&mut self) {
        log::info!("Kiosk mode: hiding window decorations");
        self.window.set_decorations(false);
    }

    fn show_annotation(&mut self, text: &str) {
        log::info!("Model by {}", text);
        self.annotation = Some(text.to_string());
        self.refresh_title();
    }

    fn show_scene(&mut self, scene: &SceneHandle) {
        log::info!(
            "Showing {} center={:?} extent={:?} camera={:?} sha256={}",
            scene.label(),
            scene.center,
            scene.extent,
            scene.camera_position,
            scene.digest
        );
        self.scene = Some(scene.label());
        self.refresh_title();
    }
}

pub struct App {
    launch: LaunchOptions,
    proxy: EventLoopProxy<AppEvent>,
    window: Option<Arc<Window>>,
    registry: Rc<BlobRegistry>,
    controller: Option<Controller<SceneLoader>>,
    report: Option<Arc<Mutex<Option<ValidationReport>>>>,
    drops: DropZone,
    modifiers: Modifiers,
}

impl App {
    fn new(launch: LaunchOptions, proxy: EventLoopProxy<AppEvent>) -> Self {
        Self {
            launch,
            proxy,
            window: None,
            registry: Rc::new(BlobRegistry::new()),
            controller: None,
            report: None,
            drops: DropZone::default(),
            modifiers: Modifiers::default(),
        }
    }

    fn start_controller(&mut self, window: Arc<Window>) {
        let proxy = Mutex::new(self.proxy.clone());
        let sink: SettlementSink = Arc::new(move |settlement: Settlement| {
            let Ok(proxy) = proxy.lock() else {
                log::error!("Settlement proxy poisoned; dropping load #{}", settlement.id);
                return;
            };
            if let Err(err) = proxy.send_event(AppEvent::LoadSettled(settlement)) {
                log::warn!("Event loop closed before load settled: {}", err);
            }
        });

        let registry = Rc::clone(&self.registry);
        let factory: ViewerFactory<SceneLoader> = Box::new(move |config: &Configuration| {
            log::info!("Creating viewer (preset '{}')", config.preset());
            SceneLoader::new(Rc::clone(&registry), Arc::clone(&sink), config)
        });

        let validator = ReportValidator::new(Rc::clone(&self.registry));
        self.report = Some(validator.latest_report());

        let session = SessionManager::new(
            self.launch.config.clone(),
            ScopeTracker::new(self.registry.clone()),
            factory,
            Some(Box::new(validator)),
        );
        let presenter = WindowPresenter::new(window);
        self.controller = Some(Controller::new(
            self.launch.clone(),
            session,
            Box::new(presenter),
        ));
    }

    fn dispatch(&mut self, event: InputEvent) {
        match &mut self.controller {
            Some(controller) => controller.handle_input(event),
            None => log::warn!("Ignoring {:?} before the window exists", event),
        }
    }

    fn add_dropped(&mut self, path: PathBuf) {
        log::debug!("Dropped {}", path.display());
        if let Some(event) = self.drops.on_dropped_file(path) {
            self.dispatch(event);
        }
    }

    fn flush_drops(&mut self) {
        if let Some(event) = self.drops.flush() {
            self.dispatch(event);
        }
    }

    /// File-picker fallback for hosts without drag and drop.
    fn open_picker(&mut self, folder: bool) {
        let picked = if folder {
            rfd::FileDialog::new().pick_folder().map(|path| vec![path])
        } else {
            rfd::FileDialog::new()
                .add_filter(
                    "glTF",
                    &["gltf", "glb", "bin", "png", "jpg", "jpeg", "webp", "ktx2"],
                )
                .pick_files()
        };
        let Some(paths) = picked else {
            return;
        };
        for path in paths {
            self.add_dropped(path);
        }
        self.flush_drops();
    }

    fn log_diagnostics(&self) {
        let Some(controller) = &self.controller else {
            return;
        };
        let diagnostics = controller.diagnostics();
        log::info!("{:#?}", diagnostics);
        log::info!("Live object URLs: {}", self.registry.live_count());
        if let Some(report) = &self.report {
            match report.lock().map(|slot| slot.clone()) {
                Ok(Some(report)) => log::info!("Last validation: {}", report.summary()),
                Ok(None) => log::info!("No validation report yet"),
                Err(_) => log::warn!("Validation report unavailable"),
            }
        }
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(WINDOW_SIZE.0, WINDOW_SIZE.1))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        self.start_controller(Arc::clone(&window));
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }
            WindowEvent::HoveredFile(path) => {
                log::debug!("Hovering {}", path.display());
            }
            WindowEvent::HoveredFileCancelled => {
                log::debug!("Hover cancelled");
            }
            WindowEvent::DroppedFile(path) => self.add_dropped(path),
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let state = self.modifiers.state();
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => {
                        log::info!("Escape pressed, shutting down...");
                        event_loop.exit();
                    }
                    PhysicalKey::Code(KeyCode::KeyO) if state.control_key() => {
                        self.open_picker(state.shift_key());
                    }
                    PhysicalKey::Code(KeyCode::F12) => self.log_diagnostics(),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::LoadSettled(settlement) => match &mut self.controller {
                Some(controller) => controller.on_load_settled(settlement),
                None => log::warn!("Load #{} settled without a controller", settlement.id),
            },
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.drops.is_pending() {
            self.flush_drops();
        }
        event_loop.set_control_flow(ControlFlow::Wait);
    }
}

pub fn run() -> Result<(), EventLoopError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let href = std::env::args().nth(1).unwrap_or_default();
    let launch = options::parse(&href);
    log::info!(
        "Starting {} (kiosk={}, model={:?})",
        WINDOW_TITLE,
        launch.config.kiosk(),
        launch.config.model_source()
    );
    log::info!("   Drop a .gltf/.glb file or folder, Ctrl+O to browse, F12 for diagnostics, ESC to exit");

    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(launch, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye!");
    Ok(())
}
