//! Recursively chowns the output directory to whoever owns its parent,
//! so a `bob` invocation run as root doesn't leave the invoking user's own
//! workspace full of root-owned files it can no longer touch afterwards.
//! Failures are logged and skipped rather than aborting the whole build
//! over one unreadable entry.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub fn fix_out_path_owner(out_dir: &Path) {
    if !nix::unistd::Uid::effective().is_root() {
        return;
    }

    let parent = out_dir.parent().unwrap_or(out_dir);
    let (uid, gid) = match fs_err::metadata(parent) {
        Ok(meta) => (meta.uid(), meta.gid()),
        Err(e) => {
            log::warn!("couldn't determine owner of '{}': {e}", parent.display());
            return;
        }
    };

    chown_recursive(out_dir, uid, gid);
}

fn chown_recursive(path: &Path, uid: u32, gid: u32) {
    if let Err(e) = std::os::unix::fs::chown(path, Some(uid), Some(gid)) {
        log::warn!("chown('{}', {uid}, {gid}): {e}", path.display());
    }

    if path.is_dir() {
        let entries = match fs_err::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("couldn't read '{}': {e}", path.display());
                return;
            }
        };

        for entry in entries {
            let Ok(entry) = entry else { continue };
            chown_recursive(&entry.path(), uid, gid);
        }
    }
}
