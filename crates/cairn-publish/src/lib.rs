//! Asset publishing: MIME sniffing, the asset-store upload boundary, and
//! the markdown rewrite pipeline that replaces local references with
//! durably hosted URIs.

pub mod asset_publish;
pub mod asset_store;
pub mod mime_sniff;

pub use asset_publish::{publish_assets, AssetPublishError, AssetPublishOptions};
pub use asset_store::{AssetStoreError, AssetUploader, HttpAssetStore, UploadRequest};
pub use mime_sniff::{detect_buffer, detect_path, SniffError};
