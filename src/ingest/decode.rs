//! Image decoding: read natural dimensions and compute the display size.

use std::io::Cursor;

use image::{ImageError, ImageReader};
use tracing::{debug, warn};

use super::{AssetSource, ImageAsset, IngestError};
use crate::geometry::{Point, Size, fit_display_size};

/// Natural pixel size of an encoded image. Only the header is read.
///
/// # Errors
///
/// Returns an [`ImageError`] if the format is unrecognized or the header
/// is malformed.
pub fn measure(payload: &[u8]) -> Result<Size, ImageError> {
    let (width, height) = ImageReader::new(Cursor::new(payload)).with_guessed_format()?.into_dimensions()?;
    Ok(Size::new(f64::from(width), f64::from(height)))
}

/// Decode one source off the async runtime and size it for `viewport`.
///
/// # Errors
///
/// Returns `IngestError::Decode` when the payload is not a readable image.
pub async fn decode_asset(source: AssetSource, drop_point: Point, viewport: Size) -> Result<ImageAsset, IngestError> {
    let payload = source.payload.clone();
    let natural = tokio::task::spawn_blocking(move || measure(&payload))
        .await?
        .map_err(|e| IngestError::Decode { file: source.file_name.clone(), reason: e.to_string() })?;

    let shown = fit_display_size(natural, viewport);
    debug!(file = %source.file_name, %natural, display = %shown, "image decoded");
    Ok(ImageAsset { source, natural, display: shown, drop_point })
}

/// Decode every source concurrently, keeping input order.
///
/// Files that fail to decode are logged and left out; they never fail the
/// batch.
pub async fn decode_all(sources: Vec<AssetSource>, drop_point: Point, viewport: Size) -> Vec<ImageAsset> {
    let decoded = futures::future::join_all(
        sources.into_iter().map(|source| decode_asset(source, drop_point, viewport)),
    )
    .await;

    decoded
        .into_iter()
        .filter_map(|result| match result {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(error = %e, "skipping undecodable file");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "decode_test.rs"]
mod tests;
