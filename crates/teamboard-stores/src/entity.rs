//! Documents a store can mirror.

use serde::Serialize;
use serde::de::DeserializeOwned;
use teamboard_core::{Collection, Project, Task, User};

/// A document type bound to one remote collection.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Remote collection holding this type.
    const COLLECTION: Collection;

    /// Document id.
    fn key(&self) -> &str;
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn key(&self) -> &str {
        self.id.as_str()
    }
}
