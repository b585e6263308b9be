use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::{ObjectLocation, QueryStatus};

/// Failure reported by an external service (object store, query service).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServiceError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
    Private,
    PublicRead,
}

/// Metadata returned after an object write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub location: ObjectLocation,
    pub size: u64,
    pub etag: String,
    pub acl: ObjectAcl,
}

/// Minimal object store contract used by the uploader.
pub trait ObjectStore {
    /// Uploads a local file, replacing any object at `location`.
    fn put_file(&self, location: &ObjectLocation, path: &Path) -> Result<ObjectMeta, ServiceError>;

    /// Reads an object. `Ok(None)` when it does not exist.
    fn get(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>, ServiceError>;

    /// Server-side copy; the destination is overwritten.
    fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        acl: ObjectAcl,
    ) -> Result<ObjectMeta, ServiceError>;
}

/// Asynchronous analytical query service: submit, then poll by id.
pub trait QueryService {
    fn submit(&self, query: &str, database: &str, workgroup: &str) -> Result<String, ServiceError>;

    fn get_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn put_file(&self, location: &ObjectLocation, path: &Path) -> Result<ObjectMeta, ServiceError> {
        (**self).put_file(location, path)
    }

    fn get(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>, ServiceError> {
        (**self).get(location)
    }

    fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        acl: ObjectAcl,
    ) -> Result<ObjectMeta, ServiceError> {
        (**self).copy(source, destination, acl)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn put_file(&self, location: &ObjectLocation, path: &Path) -> Result<ObjectMeta, ServiceError> {
        (**self).put_file(location, path)
    }

    fn get(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>, ServiceError> {
        (**self).get(location)
    }

    fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        acl: ObjectAcl,
    ) -> Result<ObjectMeta, ServiceError> {
        (**self).copy(source, destination, acl)
    }
}

impl<T: QueryService + ?Sized> QueryService for &T {
    fn submit(&self, query: &str, database: &str, workgroup: &str) -> Result<String, ServiceError> {
        (**self).submit(query, database, workgroup)
    }

    fn get_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError> {
        (**self).get_status(execution_id)
    }
}

impl<T: QueryService + ?Sized> QueryService for Arc<T> {
    fn submit(&self, query: &str, database: &str, workgroup: &str) -> Result<String, ServiceError> {
        (**self).submit(query, database, workgroup)
    }

    fn get_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError> {
        (**self).get_status(execution_id)
    }
}
