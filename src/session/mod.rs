//! Owns the single active view session and the loads feeding it.

use crate::assets::{Fileset, ResolvedBundle};
use crate::error::{LoadError, ValidationError};
use crate::options::Configuration;
use crate::scene::SceneHandle;
use crate::scope::{LoadScope, ScopeTracker};
use std::collections::HashMap;

pub type LoadId = u64;

/// Arguments for one [`Viewer::load`] call.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub id: LoadId,
    pub reference: &'a str,
    pub base_path: &'a str,
    pub fileset: Option<&'a Fileset>,
}

/// Rendering collaborator.
///
/// `load` only starts the work. The outcome must be handed back later as a
/// [`Settlement`] with the same id, through whatever channel the host wired
/// into the viewer at construction.
pub trait Viewer {
    fn load(&mut self, request: LoadRequest<'_>);
    fn clear(&mut self);
}

/// Post-load validation collaborator. Failures are logged by the caller.
pub trait Validator {
    fn validate(
        &mut self,
        reference: &str,
        base_path: &str,
        fileset: Option<&Fileset>,
        scene: &SceneHandle,
    ) -> Result<(), ValidationError>;
}

/// Builds the viewer the first time a load needs one.
pub type ViewerFactory<V> = Box<dyn FnMut(&Configuration) -> Result<V, LoadError>>;

#[derive(Debug)]
pub struct Settlement {
    pub id: LoadId,
    pub result: Result<SceneHandle, LoadError>,
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Loaded(SceneHandle),
    Failed(LoadError),
    /// The load was superseded (or already settled); nothing was changed.
    Stale {
        id: LoadId,
        error: Option<LoadError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub id: LoadId,
    pub scene: Option<SceneHandle>,
}

struct PendingLoad {
    scope: LoadScope,
    base_path: String,
    fileset: Option<Fileset>,
}

pub struct SessionManager<V: Viewer> {
    config: Configuration,
    scopes: ScopeTracker,
    factory: ViewerFactory<V>,
    viewer: Option<V>,
    validator: Option<Box<dyn Validator>>,
    active: Option<ActiveSession>,
    pending: HashMap<LoadId, PendingLoad>,
    last_id: LoadId,
}

impl<V: Viewer> SessionManager<V> {
    pub fn new(
        config: Configuration,
        scopes: ScopeTracker,
        factory: ViewerFactory<V>,
        validator: Option<Box<dyn Validator>>,
    ) -> Self {
        Self {
            config,
            scopes,
            factory,
            viewer: None,
            validator,
            active: None,
            pending: HashMap::new(),
            last_id: 0,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn viewer(&self) -> Option<&V> {
        self.viewer.as_ref()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_current(&self, id: LoadId) -> bool {
        self.active.as_ref().is_some_and(|session| session.id == id)
    }

    /// Start loading `bundle`, replacing whatever session is active.
    pub fn load(&mut self, bundle: ResolvedBundle) -> Result<LoadId, LoadError> {
        self.clear();

        if self.viewer.is_none() {
            log::info!("Creating viewer");
            self.viewer = Some((self.factory)(&self.config)?);
        }

        self.last_id += 1;
        let id = self.last_id;
        let scope = self.scopes.acquire(&bundle.root);
        log::info!(
            "Load #{}: '{}' via {}",
            id,
            bundle.root_name,
            scope.reference()
        );

        self.active = Some(ActiveSession { id, scene: None });
        let pending = self.pending.entry(id).or_insert(PendingLoad {
            scope,
            base_path: bundle.base_path,
            fileset: bundle.fileset,
        });
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.load(LoadRequest {
                id,
                reference: pending.scope.reference(),
                base_path: &pending.base_path,
                fileset: pending.fileset.as_ref(),
            });
        }
        Ok(id)
    }

    /// Apply a viewer's outcome. The scope of the load is released on every
    /// path, after the validator (if any) has been dispatched.
    pub fn settle(&mut self, settlement: Settlement) -> Outcome {
        let Settlement { id, result } = settlement;
        let Some(pending) = self.pending.remove(&id) else {
            log::warn!("Ignoring settlement for unknown load #{}", id);
            return Outcome::Stale {
                id,
                error: result.err(),
            };
        };

        if !self.is_current(id) {
            pending.scope.release();
            log::debug!("Load #{} settled after being superseded", id);
            return Outcome::Stale {
                id,
                error: result.err(),
            };
        }

        match result {
            Ok(scene) => {
                if !self.config.kiosk() {
                    if let Some(validator) = self.validator.as_mut() {
                        if let Err(err) = validator.validate(
                            pending.scope.reference(),
                            &pending.base_path,
                            pending.fileset.as_ref(),
                            &scene,
                        ) {
                            log::warn!("Validation of load #{} failed: {}", id, err);
                        }
                    }
                }
                pending.scope.release();
                if let Some(session) = self.active.as_mut() {
                    session.scene = Some(scene.clone());
                }
                log::info!("Load #{} finished: {}", id, scene.label());
                Outcome::Loaded(scene)
            }
            Err(err) => {
                pending.scope.release();
                Outcome::Failed(err)
            }
        }
    }

    /// Tear down the active session. The viewer itself is kept for reuse.
    pub fn clear(&mut self) {
        if let Some(previous) = self.active.take() {
            if let Some(viewer) = self.viewer.as_mut() {
                viewer.clear();
            }
            log::debug!("Cleared session of load #{}", previous.id);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{
        LoadId, LoadRequest, Outcome, SessionManager, Settlement, Validator, Viewer,
        ViewerFactory,
    };
    use crate::assets::{resolve, resolve_from_reference, FileBlob, Fileset};
    use crate::error::{LoadError, ValidationError};
    use crate::options::{parse_with_host, Configuration};
    use crate::scene::SceneHandle;
    use crate::scope::tests::CountingUrls;
    use crate::scope::ScopeTracker;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub(crate) struct ViewerLog {
        pub loads: Vec<(LoadId, String, String, usize)>,
        pub clears: usize,
    }

    /// Records calls; settlements are fed back by the test.
    pub(crate) struct FakeViewer {
        pub log: Rc<RefCell<ViewerLog>>,
    }

    impl Viewer for FakeViewer {
        fn load(&mut self, request: LoadRequest<'_>) {
            self.log.borrow_mut().loads.push((
                request.id,
                request.reference.to_string(),
                request.base_path.to_string(),
                request.fileset.map(Fileset::len).unwrap_or(0),
            ));
        }

        fn clear(&mut self) {
            self.log.borrow_mut().clears += 1;
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingValidator {
        pub calls: Rc<RefCell<Vec<(String, String)>>>,
        pub fail: bool,
    }

    impl Validator for RecordingValidator {
        fn validate(
            &mut self,
            reference: &str,
            _base_path: &str,
            _fileset: Option<&Fileset>,
            scene: &SceneHandle,
        ) -> Result<(), ValidationError> {
            self.calls
                .borrow_mut()
                .push((reference.to_string(), scene.name.clone()));
            if self.fail {
                return Err(ValidationError::Revoked(reference.to_string()));
            }
            Ok(())
        }
    }

    pub(crate) fn scene(name: &str) -> SceneHandle {
        SceneHandle {
            name: name.to_string(),
            generator: None,
            node_count: 1,
            mesh_count: 1,
            image_count: 0,
            center: [0.0; 3],
            extent: [1.0; 3],
            camera_position: [1.0, 0.4, 1.0],
            digest: String::new(),
        }
    }

    pub(crate) fn dropped_fileset() -> Fileset {
        vec![
            ("duck/Duck.gltf", FileBlob::Path(PathBuf::from("/tmp/duck/Duck.gltf"))),
            ("duck/Duck0.bin", FileBlob::Path(PathBuf::from("/tmp/duck/Duck0.bin"))),
        ]
        .into_iter()
        .collect()
    }

    pub(crate) fn fake_factory(
        log: Rc<RefCell<ViewerLog>>,
        created: Rc<RefCell<usize>>,
    ) -> ViewerFactory<FakeViewer> {
        Box::new(move |_config: &Configuration| {
            *created.borrow_mut() += 1;
            Ok(FakeViewer { log: log.clone() })
        })
    }

    struct Harness {
        manager: SessionManager<FakeViewer>,
        urls: Rc<CountingUrls>,
        log: Rc<RefCell<ViewerLog>>,
        created: Rc<RefCell<usize>>,
        validations: Rc<RefCell<Vec<(String, String)>>>,
    }

    fn harness(href: &str, validator_fails: bool) -> Harness {
        let config = parse_with_host(href, "https://host").config;
        let urls = Rc::new(CountingUrls::default());
        let log = Rc::new(RefCell::new(ViewerLog::default()));
        let created = Rc::new(RefCell::new(0));
        let validations = Rc::new(RefCell::new(Vec::new()));
        let validator = RecordingValidator {
            calls: validations.clone(),
            fail: validator_fails,
        };
        let manager = SessionManager::new(
            config,
            ScopeTracker::new(urls.clone()),
            fake_factory(log.clone(), created.clone()),
            Some(Box::new(validator)),
        );
        Harness {
            manager,
            urls,
            log,
            created,
            validations,
        }
    }

    #[test]
    fn successful_local_load_validates_then_releases_once() {
        let mut h = harness("", false);
        let bundle = resolve(&dropped_fileset()).unwrap();
        let id = h.manager.load(bundle).unwrap();

        assert_eq!(
            h.log.borrow().loads,
            vec![(id, "blob:test/1".to_string(), "duck/".to_string(), 2)]
        );
        assert!(h.urls.revoked.borrow().is_empty());
        assert_eq!(h.manager.pending_count(), 1);

        let outcome = h.manager.settle(Settlement {
            id,
            result: Ok(scene("Duck")),
        });
        assert_eq!(outcome, Outcome::Loaded(scene("Duck")));
        assert_eq!(
            *h.validations.borrow(),
            vec![("blob:test/1".to_string(), "Duck".to_string())]
        );
        assert_eq!(*h.urls.revoked.borrow(), vec!["blob:test/1".to_string()]);
        assert_eq!(h.manager.pending_count(), 0);
        assert_eq!(
            h.manager.active().and_then(|session| session.scene.clone()),
            Some(scene("Duck"))
        );
    }

    #[test]
    fn failed_load_releases_once_and_keeps_session() {
        let mut h = harness("", false);
        let id = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let outcome = h.manager.settle(Settlement {
            id,
            result: Err(LoadError::Syntax("Unexpected token".to_string())),
        });
        assert_eq!(
            outcome,
            Outcome::Failed(LoadError::Syntax("Unexpected token".to_string()))
        );
        assert_eq!(h.urls.revoked.borrow().len(), 1);
        assert!(h.validations.borrow().is_empty());
        assert_eq!(h.manager.active().map(|session| session.id), Some(id));
        assert!(h.manager.viewer().is_some());
    }

    #[test]
    fn remote_load_acquires_no_transient_handle() {
        let mut h = harness("", false);
        let id = h
            .manager
            .load(resolve_from_reference("https://host/Fox.glb"))
            .unwrap();
        h.manager.settle(Settlement {
            id,
            result: Ok(scene("Fox")),
        });
        assert!(h.urls.created.borrow().is_empty());
        assert!(h.urls.revoked.borrow().is_empty());
        assert_eq!(h.log.borrow().loads[0].1, "https://host/Fox.glb");
        assert_eq!(h.log.borrow().loads[0].3, 0);
    }

    #[test]
    fn second_load_supersedes_first() {
        let mut h = harness("", false);
        let first = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let second = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        assert!(second > first);
        assert_eq!(h.log.borrow().clears, 1);
        assert_eq!(*h.created.borrow(), 1);

        let outcome = h.manager.settle(Settlement {
            id: second,
            result: Ok(scene("Second")),
        });
        assert_eq!(outcome, Outcome::Loaded(scene("Second")));

        let late = h.manager.settle(Settlement {
            id: first,
            result: Ok(scene("First")),
        });
        assert_eq!(
            late,
            Outcome::Stale {
                id: first,
                error: None
            }
        );

        let active = h.manager.active().unwrap();
        assert_eq!(active.id, second);
        assert_eq!(active.scene, Some(scene("Second")));
        assert_eq!(h.validations.borrow().len(), 1);
        assert_eq!(h.urls.created.borrow().len(), 2);
        assert_eq!(h.urls.revoked.borrow().len(), 2);
        assert_eq!(h.manager.pending_count(), 0);
    }

    #[test]
    fn late_failure_of_superseded_load_is_stale() {
        let mut h = harness("", false);
        let first = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let second = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let late = h.manager.settle(Settlement {
            id: first,
            result: Err(LoadError::Other("boom".to_string())),
        });
        assert_eq!(
            late,
            Outcome::Stale {
                id: first,
                error: Some(LoadError::Other("boom".to_string()))
            }
        );
        assert!(h.manager.is_current(second));
        assert_eq!(h.manager.active().unwrap().scene, None);
        assert_eq!(h.urls.revoked.borrow().len(), 1);
    }

    #[test]
    fn duplicate_settlement_does_not_release_twice() {
        let mut h = harness("", false);
        let id = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        h.manager.settle(Settlement {
            id,
            result: Ok(scene("Duck")),
        });
        let again = h.manager.settle(Settlement {
            id,
            result: Ok(scene("Duck")),
        });
        assert!(matches!(again, Outcome::Stale { .. }));
        assert_eq!(h.urls.revoked.borrow().len(), 1);
    }

    #[test]
    fn kiosk_mode_skips_validation() {
        let mut h = harness("?kiosk=1", false);
        let id = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let outcome = h.manager.settle(Settlement {
            id,
            result: Ok(scene("Duck")),
        });
        assert!(matches!(outcome, Outcome::Loaded(_)));
        assert!(h.validations.borrow().is_empty());
        assert_eq!(h.urls.revoked.borrow().len(), 1);
    }

    #[test]
    fn validator_failure_is_not_propagated() {
        let mut h = harness("", true);
        let id = h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let outcome = h.manager.settle(Settlement {
            id,
            result: Ok(scene("Duck")),
        });
        assert_eq!(outcome, Outcome::Loaded(scene("Duck")));
        assert_eq!(h.validations.borrow().len(), 1);
        assert_eq!(h.urls.revoked.borrow().len(), 1);
    }

    #[test]
    fn factory_failure_acquires_nothing() {
        let urls = Rc::new(CountingUrls::default());
        let factory: ViewerFactory<FakeViewer> =
            Box::new(|_| Err(LoadError::Unsupported("no GPU".to_string())));
        let mut manager = SessionManager::new(
            Configuration::default(),
            ScopeTracker::new(urls.clone()),
            factory,
            None,
        );
        let err = manager.load(resolve(&dropped_fileset()).unwrap()).unwrap_err();
        assert_eq!(err, LoadError::Unsupported("no GPU".to_string()));
        assert!(urls.created.borrow().is_empty());
        assert!(manager.active().is_none());
    }

    #[test]
    fn dropping_manager_releases_in_flight_scopes() {
        let mut h = harness("", false);
        h.manager.load(resolve(&dropped_fileset()).unwrap()).unwrap();
        let urls = h.urls.clone();
        drop(h);
        assert_eq!(urls.revoked.borrow().len(), 1);
    }
}
