use crate::assets::{self, Fileset};
use crate::classify::classify;
use crate::error::LoadError;
use crate::options::{Configuration, LaunchOptions};
use crate::scene::SceneHandle;
use crate::session::{LoadId, Outcome, SessionManager, Settlement, Viewer};

/// Events raised by the input adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    DropStart,
    Drop(Fileset),
    DropError(String),
}

/// User-facing surface the controller drives.
pub trait Presenter {
    fn set_busy(&mut self, busy: bool);
    /// Blocking notification with an already classified message.
    fn alert(&mut self, message: &str);
    fn hide_chrome(&mut self);
    fn show_annotation(&mut self, text: &str);
    fn show_scene(&mut self, scene: &SceneHandle);
}

/// Snapshot of controller state for debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub config: Configuration,
    pub annotation: Option<String>,
    pub busy: bool,
    pub viewer_ready: bool,
    pub active_load: Option<LoadId>,
    pub pending_loads: usize,
    pub scene: Option<SceneHandle>,
}

pub struct Controller<V: Viewer> {
    options: LaunchOptions,
    session: SessionManager<V>,
    presenter: Box<dyn Presenter>,
    busy: bool,
}

impl<V: Viewer> Controller<V> {
    pub fn new(
        options: LaunchOptions,
        session: SessionManager<V>,
        mut presenter: Box<dyn Presenter>,
    ) -> Self {
        if options.config.kiosk() {
            presenter.hide_chrome();
        }
        if let Some(annotation) = &options.annotation {
            presenter.show_annotation(annotation);
        }

        let mut controller = Self {
            options,
            session,
            presenter,
            busy: false,
        };
        let model = controller.options.config.model_source().to_string();
        if !model.is_empty() {
            controller.start_load(assets::resolve_from_reference(&model));
        }
        controller
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::DropStart => self.set_busy(true),
            InputEvent::Drop(fileset) => match assets::resolve(&fileset) {
                Ok(bundle) => self.start_load(bundle),
                Err(err) => {
                    self.set_busy(false);
                    log::error!("Drop of {} files rejected: {}", fileset.len(), err);
                    self.presenter.alert(&err.to_string());
                }
            },
            InputEvent::DropError(message) => {
                self.set_busy(false);
                self.report(&LoadError::Other(message));
            }
        }
    }

    pub fn on_load_settled(&mut self, settlement: Settlement) {
        match self.session.settle(settlement) {
            Outcome::Loaded(scene) => {
                self.set_busy(false);
                self.presenter.show_scene(&scene);
            }
            Outcome::Failed(err) => {
                self.set_busy(false);
                self.report(&err);
            }
            Outcome::Stale { id, error } => match error {
                Some(err) => log::warn!("Suppressed failure of superseded load #{}: {}", id, err),
                None => log::debug!("Discarded result of superseded load #{}", id),
            },
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let active = self.session.active();
        Diagnostics {
            config: self.session.config().clone(),
            annotation: self.options.annotation.clone(),
            busy: self.busy,
            viewer_ready: self.session.viewer().is_some(),
            active_load: active.map(|session| session.id),
            pending_loads: self.session.pending_count(),
            scene: active.and_then(|session| session.scene.clone()),
        }
    }

    fn start_load(&mut self, bundle: assets::ResolvedBundle) {
        self.set_busy(true);
        if let Err(err) = self.session.load(bundle) {
            self.set_busy(false);
            self.report(&err);
        }
    }

    fn report(&mut self, error: &LoadError) {
        log::error!("Load failed: {:?}", error);
        let category = classify(error);
        self.presenter.alert(&category.to_string());
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            self.presenter.set_busy(busy);
        }
    }
}
