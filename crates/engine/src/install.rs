use std::path::Path;

use fs_err as fs;
use script::Value;

use crate::frugal::frugal_mtime;
use crate::Error;

/// The validated `install` map declared at the top level of a `build.fl`
/// script: project-relative source path -> destination path under the
/// install prefix. Order is preserved for diagnostics.
pub struct InstallMap {
    entries: Vec<(String, String)>,
}

impl InstallMap {
    /// `None` when the script never declared an `install` map, or declared
    /// an empty one; both are warnings, not errors.
    pub fn from_value(value: Option<&Value>) -> Result<Option<Self>, Error> {
        let Some(value) = value else {
            log::warn!("install map was never declared; nothing to install");
            return Ok(None);
        };

        let map = match value {
            Value::None => {
                log::warn!("install map not set; nothing to install");
                return Ok(None);
            }
            Value::Map(m) => m,
            other => {
                return Err(Error::InstallMapType(other.type_name()));
            }
        };

        if map.is_empty() {
            log::warn!("install map is empty; nothing to install");
            return Ok(None);
        }

        let mut entries = Vec::new();

        for (k, v) in map.iter() {
            let (k, v) = (k.borrow(), v.borrow());
            let (Value::Str(k), Value::Str(v)) = (&*k, &*v) else {
                return Err(Error::InstallMapEntryType);
            };
            entries.push((
                String::from_utf8_lossy(k).into_owned(),
                String::from_utf8_lossy(v).into_owned(),
            ));
        }

        Ok(Some(InstallMap { entries }))
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Installs every entry in `map` under `prefix`.
pub fn install_all(map: &InstallMap, prefix: &Path) -> Result<(), Error> {
    for (src, dest) in map.entries() {
        install_one(src, dest, prefix, false)?;
    }
    Ok(())
}

/// Installs only the entry matching `cookie`, used when a build step hands
/// off a freshly-built artifact straight to the install phase. Runs quietly
/// since the build step already logged its own completion.
pub fn install_cookie(map: &InstallMap, cookie: &str, prefix: &Path) -> Result<(), Error> {
    if let Some((src, dest)) = map.entries().iter().find(|(src, _)| src == cookie) {
        install_one(src, dest, prefix, true)?;
    }
    Ok(())
}

fn install_one(src: &str, dest_rel: &str, prefix: &Path, quiet: bool) -> Result<(), Error> {
    let abs_src = fs::canonicalize(src).map_err(|_| Error::InstallSourceMissing(src.to_string()))?;

    let dest = prefix.join(dest_rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    if !frugal_mtime(&[&abs_src], &dest)? {
        if !quiet {
            log::info!("{dest_rel}: already (pre-)installed");
        }
        return Ok(());
    }

    if !quiet {
        log::info!("{dest_rel}: installing from '{src}'");
    }

    fs::copy(&abs_src, &dest)?;

    if !quiet {
        log::info!("{dest_rel}: successfully installed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, MapValue};
    use tempfile::tempdir;

    fn map_of(entries: &[(&str, &str)]) -> Value {
        let mut m = MapValue::new();
        for (k, v) in entries {
            let key = new_ref(Value::Str(k.as_bytes().to_vec()));
            let val = new_ref(Value::Str(v.as_bytes().to_vec()));
            m.insert(format!("\"{k}\""), key, val);
        }
        Value::Map(m)
    }

    #[test]
    fn empty_map_is_none() {
        let v = map_of(&[]);
        assert!(InstallMap::from_value(Some(&v)).unwrap().is_none());
    }

    #[test]
    fn rejects_non_string_values() {
        let mut m = MapValue::new();
        m.insert(
            "\"a\"".into(),
            new_ref(Value::Str(b"a".to_vec())),
            new_ref(Value::Int(1)),
        );
        let err = InstallMap::from_value(Some(&Value::Map(m))).unwrap_err();
        assert!(matches!(err, Error::InstallMapEntryType));
    }

    #[test]
    fn installs_file_to_prefix() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("out.bin");
        fs::write(&src, b"hello").unwrap();

        let prefix = dir.path().join("prefix");
        fs::create_dir_all(&prefix).unwrap();

        let v = map_of(&[(src.to_str().unwrap(), "bin/out")]);
        let map = InstallMap::from_value(Some(&v)).unwrap().unwrap();
        install_all(&map, &prefix).unwrap();

        assert_eq!(fs::read_to_string(prefix.join("bin/out")).unwrap(), "hello");
    }
}
