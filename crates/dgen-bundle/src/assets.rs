//! Placing resolved media where a bundle can reference it.
//!
//! Media downloaded into the shared `DraftAssets` folder of the output root
//! stays there and is referenced in place. Anything else is staged into the
//! bundle's own `Assets/` folder.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use dgen_models::MediaResource;

use crate::content::{slash_path, ASSETS_DIR};
use crate::error::{BundleError, BundleResult, IoContext};
use crate::storage::TRANSFER_ASSETS_DIR;

/// Place `src` at `dst`, preferring a hard link.
///
/// Links fail across filesystems (EXDEV) and on some mounts; any link
/// failure falls back to copying through a temporary file so that `dst`
/// only ever appears complete.
pub fn link_or_copy(src: &Path, dst: &Path) -> BundleResult<()> {
    match std::fs::hard_link(src, dst) {
        Ok(()) => return Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device link, falling back to copy"
            );
        }
        Err(e) => {
            debug!(src = %src.display(), error = %e, "Hard link failed, copying");
        }
    }

    let tmp = dst.with_extension("tmp");
    std::fs::copy(src, &tmp).map_err(|source| BundleError::AssetCopy {
        path: src.to_path_buf(),
        source,
    })?;
    if let Err(e) = std::fs::rename(&tmp, dst) {
        let _ = std::fs::remove_file(&tmp);
        return Err(BundleError::io(dst, e));
    }
    Ok(())
}

/// EXDEV is 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

/// Place every distinct resource for the bundle at `bundle_dir`, a direct
/// child of `root`.
///
/// Returns URL → bundle-relative path. Files under `<root>/DraftAssets` map
/// to `../DraftAssets/<...>` without being copied. The rest are linked into
/// `Assets/`; two different URLs whose local files share a name get
/// distinct names (`a.mp4`, `a_1.mp4`).
pub fn stage_assets(
    root: &Path,
    bundle_dir: &Path,
    media: &[&MediaResource],
) -> BundleResult<HashMap<String, String>> {
    let assets_dir = bundle_dir.join(ASSETS_DIR);
    let shared_dir = root.join(TRANSFER_ASSETS_DIR);

    let mut taken = HashSet::new();
    let mut paths = HashMap::with_capacity(media.len());
    let mut staged = 0usize;

    for resource in media {
        if !resource.local_path.is_file() {
            warn!(url = %resource.url, path = %resource.local_path.display(), "Resolved media file is missing");
            return Err(BundleError::AssetCopy {
                path: resource.local_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "resolved media file is missing"),
            });
        }

        if let Ok(rel) = resource.local_path.strip_prefix(&shared_dir) {
            paths.insert(
                resource.url.clone(),
                format!("../{TRANSFER_ASSETS_DIR}/{}", slash_path(rel)),
            );
            continue;
        }

        if staged == 0 {
            std::fs::create_dir_all(&assets_dir).at(&assets_dir)?;
        }
        let base = resource.file_name().unwrap_or("material");
        let name = unique_name(base, &mut taken);
        let dst = assets_dir.join(&name);
        if dst.exists() {
            std::fs::remove_file(&dst).at(&dst)?;
        }
        link_or_copy(&resource.local_path, &dst)?;
        paths.insert(resource.url.clone(), format!("{ASSETS_DIR}/{name}"));
        staged += 1;
    }

    debug!(
        bundle = %bundle_dir.display(),
        staged,
        shared = paths.len() - staged,
        "Placed assets"
    );
    Ok(paths)
}

fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (base, String::new()),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
