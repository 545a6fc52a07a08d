//! Upload-before-write: the first stage of every mutation.

use tracing::{debug, warn};
use trellis_assets::{AssetUploader, UploadedAsset};
use trellis_types::{AssetRef, Node};

use crate::entity::{Change, EntitySpec};
use crate::error::{RecordError, RecordResult};

/// Upload the pending asset of `change`, if any, and replace it with the
/// returned URLs.
///
/// Must run before any store write so an upload failure leaves the store
/// untouched. Resolved URLs pass through unchanged.
pub(crate) async fn resolve_asset(
    uploader: &dyn AssetUploader,
    spec: &EntitySpec,
    change: &mut Change,
) -> RecordResult<Option<UploadedAsset>> {
    let payload = match change.asset.take() {
        Some(payload) => payload,
        None => match AssetRef::classify(change.fields.get(spec.asset_field)) {
            Some(AssetRef::Pending(payload)) => payload,
            Some(AssetRef::Resolved(_)) => return Ok(None),
            None => {
                if let Some(Node::String(text)) = change.fields.get(spec.asset_field) {
                    if !text.trim().is_empty() {
                        return Err(RecordError::invalid(format!(
                            "{}: {} is neither a URL nor an image payload",
                            spec.name, spec.asset_field
                        )));
                    }
                }
                return Ok(None);
            }
        },
    };

    let uploaded = uploader.upload(&payload).await.map_err(|e| {
        warn!(entity = spec.name, field = spec.asset_field, error = %e, "asset upload failed; nothing written");
        RecordError::AssetUploadFailed(e)
    })?;
    change
        .fields
        .insert(spec.asset_field.to_string(), Node::String(uploaded.url.clone()));
    change.fields.insert(
        spec.thumb_field.to_string(),
        Node::String(uploaded.thumbnail_url.clone()),
    );
    debug!(entity = spec.name, url = %uploaded.url, "asset resolved");
    Ok(Some(uploaded))
}
