//! Transient references for local blobs, scoped to one load attempt.

use crate::assets::{FileBlob, RootReference};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub const OBJECT_URL_PREFIX: &str = "blob:dropview/";

/// Allocates and revokes process-local references to blobs.
pub trait ObjectUrls {
    fn create(&self, blob: &FileBlob) -> String;
    fn revoke(&self, reference: &str);
}

#[derive(Default)]
pub struct BlobRegistry {
    next_id: Cell<u64>,
    live: RefCell<HashMap<String, FileBlob>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, reference: &str) -> Option<FileBlob> {
        self.live.borrow().get(reference).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }
}

impl ObjectUrls for BlobRegistry {
    fn create(&self, blob: &FileBlob) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let reference = format!("{}{}", OBJECT_URL_PREFIX, id);
        self.live
            .borrow_mut()
            .insert(reference.clone(), blob.clone());
        reference
    }

    fn revoke(&self, reference: &str) {
        if self.live.borrow_mut().remove(reference).is_none() {
            log::warn!("Revoked unknown object reference {}", reference);
        }
    }
}

/// Reference held for one load attempt. Released exactly once: either by
/// [`LoadScope::release`] or when dropped.
pub struct LoadScope {
    reference: String,
    release: Option<Box<dyn FnOnce()>>,
}

impl LoadScope {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_transient(&self) -> bool {
        self.release.is_some()
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            log::trace!("Releasing {}", self.reference);
            release();
        }
    }
}

impl Drop for LoadScope {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for LoadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadScope")
            .field("reference", &self.reference)
            .field("transient", &self.is_transient())
            .finish()
    }
}

pub struct ScopeTracker {
    urls: Rc<dyn ObjectUrls>,
}

impl ScopeTracker {
    pub fn new(urls: Rc<dyn ObjectUrls>) -> Self {
        Self { urls }
    }

    pub fn acquire(&self, root: &RootReference) -> LoadScope {
        match root {
            RootReference::Remote(url) => LoadScope {
                reference: url.clone(),
                release: None,
            },
            RootReference::Local(blob) => {
                let reference = self.urls.create(blob);
                let urls = Rc::clone(&self.urls);
                let revoked = reference.clone();
                LoadScope {
                    reference,
                    release: Some(Box::new(move || urls.revoke(&revoked))),
                }
            }
        }
    }
}
