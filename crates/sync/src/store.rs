use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use honey_core::{ObjectAcl, ObjectLocation, ObjectMeta, ObjectStore, ServiceError};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

/// Object store backed by a local directory tree: `{root}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, location: &ObjectLocation) -> PathBuf {
        location.to_path(&self.root)
    }

    fn write_object(
        &self,
        location: &ObjectLocation,
        bytes: &[u8],
        acl: ObjectAcl,
    ) -> io::Result<ObjectMeta> {
        if location.key.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("object key is empty for {location}"),
            ));
        }
        let path = self.path_for(location);
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        set_acl(temp.path(), acl)?;
        temp.persist(&path).map_err(|err| err.error)?;
        debug!(location = %location, size = bytes.len(), "stored object");
        Ok(ObjectMeta {
            location: location.clone(),
            size: bytes.len() as u64,
            etag: etag(bytes),
            acl,
        })
    }
}

impl ObjectStore for FsObjectStore {
    fn put_file(&self, location: &ObjectLocation, path: &Path) -> Result<ObjectMeta, ServiceError> {
        let bytes = fs::read(path)
            .map_err(|err| ServiceError::new(format!("read {}: {}", path.display(), err)))?;
        self.write_object(location, &bytes, ObjectAcl::Private)
            .map_err(|err| ServiceError::new(format!("put {}: {}", location, err)))
    }

    fn get(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>, ServiceError> {
        match fs::read(self.path_for(location)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ServiceError::new(format!("get {}: {}", location, err))),
        }
    }

    fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        acl: ObjectAcl,
    ) -> Result<ObjectMeta, ServiceError> {
        let Some(bytes) = self.get(source)? else {
            return Err(ServiceError::new(format!("no such object {}", source)));
        };
        self.write_object(destination, &bytes, acl)
            .map_err(|err| ServiceError::new(format!("copy {} to {}: {}", source, destination, err)))
    }
}

#[cfg(unix)]
fn set_acl(path: &Path, acl: ObjectAcl) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match acl {
        ObjectAcl::PublicRead => 0o644,
        ObjectAcl::Private => 0o600,
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_acl(_path: &Path, _acl: ObjectAcl) -> io::Result<()> {
    Ok(())
}

fn etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

/// In-process object store. `set_unavailable(true)` makes every call fail.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectLocation, (Vec<u8>, ObjectAcl)>>,
    unavailable: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn insert(&self, location: ObjectLocation, bytes: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location, (bytes.into(), ObjectAcl::Private));
    }

    pub fn acl(&self, location: &ObjectLocation) -> Option<ObjectAcl> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .map(|(_, acl)| *acl)
    }

    /// Stored locations, sorted.
    pub fn locations(&self) -> Vec<ObjectLocation> {
        let mut locations: Vec<ObjectLocation> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        locations.sort();
        locations
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::new("object store unavailable"));
        }
        Ok(())
    }

    fn store(&self, location: &ObjectLocation, bytes: Vec<u8>, acl: ObjectAcl) -> ObjectMeta {
        let meta = ObjectMeta {
            location: location.clone(),
            size: bytes.len() as u64,
            etag: etag(&bytes),
            acl,
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.clone(), (bytes, acl));
        meta
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_file(&self, location: &ObjectLocation, path: &Path) -> Result<ObjectMeta, ServiceError> {
        self.check_available()?;
        let bytes = fs::read(path)
            .map_err(|err| ServiceError::new(format!("read {}: {}", path.display(), err)))?;
        Ok(self.store(location, bytes, ObjectAcl::Private))
    }

    fn get(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>, ServiceError> {
        self.check_available()?;
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .map(|(bytes, _)| bytes.clone()))
    }

    fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        acl: ObjectAcl,
    ) -> Result<ObjectMeta, ServiceError> {
        let Some(bytes) = self.get(source)? else {
            return Err(ServiceError::new(format!("no such object {}", source)));
        };
        Ok(self.store(destination, bytes, acl))
    }
}
