//! Installation onto a global object
//!
//! Hosts expose their global object under different bindings (`globalThis`,
//! `window`, `global`, `self`). The installer resolves the first one bound,
//! and sets `browser.storage` on it only when no storage is there yet, so a
//! genuine implementation is never replaced. With no global bound at all,
//! installation is skipped without error.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::BrowserStorage;

/// A host global object, reduced to its `browser` property
#[derive(Default)]
pub struct GlobalObject {
    browser: RwLock<Option<Arc<BrowserNamespace>>>,
}

impl GlobalObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// A global that already carries a `browser` namespace
    pub fn with_browser(browser: BrowserNamespace) -> Self {
        Self {
            browser: RwLock::new(Some(Arc::new(browser))),
        }
    }

    pub fn browser(&self) -> Option<Arc<BrowserNamespace>> {
        self.browser.read().clone()
    }
}

/// The `browser` namespace, reduced to its `storage` property
#[derive(Default)]
pub struct BrowserNamespace {
    storage: RwLock<Option<Arc<BrowserStorage>>>,
}

impl BrowserNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(storage: Arc<BrowserStorage>) -> Self {
        Self {
            storage: RwLock::new(Some(storage)),
        }
    }

    pub fn storage(&self) -> Option<Arc<BrowserStorage>> {
        self.storage.read().clone()
    }
}

/// Global bindings a host may provide, any of which may be unbound
#[derive(Default, Clone)]
pub struct GlobalBindings {
    pub global_this: Option<Arc<GlobalObject>>,
    pub window: Option<Arc<GlobalObject>>,
    pub global: Option<Arc<GlobalObject>>,
    pub self_scope: Option<Arc<GlobalObject>>,
}

impl GlobalBindings {
    /// Bindings of a host exposing only `globalThis`
    pub fn global_this(global: Arc<GlobalObject>) -> Self {
        Self {
            global_this: Some(global),
            ..Self::default()
        }
    }

    /// The global object: first bound of globalThis, window, global, self
    pub fn resolve(&self) -> Option<&Arc<GlobalObject>> {
        self.global_this
            .as_ref()
            .or(self.window.as_ref())
            .or(self.global.as_ref())
            .or(self.self_scope.as_ref())
    }
}

/// What `install` did
pub enum Installation {
    /// The shim was installed
    Installed(Arc<BrowserStorage>),

    /// A storage implementation was already present and left in place
    AlreadyPresent(Arc<BrowserStorage>),

    /// No global object is bound; nothing was done
    NoGlobal,
}

impl Installation {
    /// The storage reachable through the global after installation
    pub fn storage(&self) -> Option<&Arc<BrowserStorage>> {
        match self {
            Installation::Installed(storage) | Installation::AlreadyPresent(storage) => {
                Some(storage)
            }
            Installation::NoGlobal => None,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Installation::Installed(_))
    }
}

/// Install `browser.storage` built by `build` unless one is already present
///
/// Detection and installation happen under the global's lock, so concurrent
/// installers agree on a single winner. `build` runs only when installing.
pub fn install(
    bindings: &GlobalBindings,
    build: impl FnOnce() -> Result<BrowserStorage>,
) -> Result<Installation> {
    let Some(global) = bindings.resolve() else {
        tracing::debug!("No global object bound; skipping storage installation");
        return Ok(Installation::NoGlobal);
    };

    let mut browser_slot = global.browser.write();
    let browser = Arc::clone(browser_slot.get_or_insert_with(|| Arc::new(BrowserNamespace::new())));

    let mut storage_slot = browser.storage.write();
    if let Some(existing) = storage_slot.as_ref() {
        tracing::debug!("browser.storage already present; leaving it in place");
        return Ok(Installation::AlreadyPresent(Arc::clone(existing)));
    }

    let storage = Arc::new(build()?);
    *storage_slot = Some(Arc::clone(&storage));
    tracing::info!("Installed browser.storage shim");

    Ok(Installation::Installed(storage))
}
