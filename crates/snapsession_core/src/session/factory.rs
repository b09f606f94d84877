//! Session construction over a shared connection source.

use crate::db::ConnectionSource;
use crate::mapping::descriptor::EntityRegistry;
use crate::session::context::Session;
use std::sync::Arc;

/// Creates sessions bound to one connection source and entity registry.
///
/// The factory is `Send + Sync`; the sessions it creates are not.
#[derive(Clone)]
pub struct SessionFactory {
    source: Arc<dyn ConnectionSource>,
    registry: Arc<EntityRegistry>,
}

impl SessionFactory {
    pub fn new(source: impl ConnectionSource + 'static, registry: EntityRegistry) -> Self {
        Self::from_shared(Arc::new(source), Arc::new(registry))
    }

    pub fn from_shared(source: Arc<dyn ConnectionSource>, registry: Arc<EntityRegistry>) -> Self {
        Self { source, registry }
    }

    /// Opens a new session with an empty identity map.
    pub fn create_session(&self) -> Session {
        Session::new(Arc::clone(&self.source), Arc::clone(&self.registry))
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }
}
