use honey_core::{ObjectAcl, ObjectLocation, ObjectMeta, ObjectStore, ServiceError};
use tracing::info;

/// Copies `{results_location}/{execution_id}.csv` to `destination` as a
/// publicly readable object. Re-publishing overwrites the destination.
pub fn publish_result<S: ObjectStore>(
    store: &S,
    results_location: &ObjectLocation,
    execution_id: &str,
    destination: &ObjectLocation,
) -> Result<ObjectMeta, ServiceError> {
    let source = results_location.join(&format!("{execution_id}.csv"));
    let meta = store.copy(&source, destination, ObjectAcl::PublicRead)?;
    info!(%execution_id, destination = %destination, size = meta.size, "published query result");
    Ok(meta)
}
