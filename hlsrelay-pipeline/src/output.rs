// Writes into the public HLS tree

use crate::gateway::{mirrored_file_name, GatewayMirror};
use hlsrelay_core::{Error, Result};
use std::path::Path;
use tokio::fs;

/// Write a playlist, creating parent directories as needed
pub async fn write_playlist(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, content)
        .await
        .map_err(|e| Error::io(path, e))
}

/// Write the playlist plus one host-swapped copy per alternate gateway.
///
/// A failed mirror is logged and does not fail the primary write.
pub async fn write_with_mirrors(
    dir: &Path,
    file_name: &str,
    content: &str,
    gateways: &GatewayMirror,
) -> Result<()> {
    write_playlist(&dir.join(file_name), content).await?;

    for alternate in gateways.alternates() {
        let path = dir.join(mirrored_file_name(alternate, file_name));
        if let Err(e) = write_playlist(&path, &gateways.mirror_playlist(content, alternate)).await {
            tracing::error!(gateway = %alternate, "Failed to write mirrored playlist: {}", e);
        }
    }
    Ok(())
}

/// Copy a master playlist into `dest_dir` and mirror it per alternate gateway
pub async fn copy_master(
    source: &Path,
    dest_dir: &Path,
    master_file_name: &str,
    variant_file_name: &str,
    gateways: &GatewayMirror,
) -> Result<()> {
    let master = fs::read_to_string(source)
        .await
        .map_err(|e| Error::io(source, e))?;
    write_playlist(&dest_dir.join(master_file_name), &master).await?;

    for alternate in gateways.alternates() {
        let mirrored = GatewayMirror::mirror_master(&master, alternate, variant_file_name);
        let path = dest_dir.join(mirrored_file_name(alternate, master_file_name));
        if let Err(e) = write_playlist(&path, &mirrored).await {
            tracing::error!(gateway = %alternate, "Failed to write mirrored master: {}", e);
        }
    }
    Ok(())
}
