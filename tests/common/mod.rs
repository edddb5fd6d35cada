// tests/common/mod.rs

//! Shared fixtures for integration tests: archive writer, counting manifest
//! reader and an extraction engine that writes real files.

#![allow(dead_code)]

use esa_install::acquire::LockProbe;
use esa_install::descriptor::Descriptor;
use esa_install::transaction::{ExtractionEngine, InstallContext};
use esa_install::{
    Director, EngineConfig, Error, FeatureDescriptor, FixDescriptor, ManifestReader,
    ResolvedAsset, Result, TomlManifestReader, UninstallTarget, Visibility,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Public feature with no constituents
pub fn feature(name: &str) -> FeatureDescriptor {
    FeatureDescriptor::new(name).with_visibility(Visibility::Public)
}

pub fn fix(id: &str, problems: &[&str], files: &[&str]) -> FixDescriptor {
    FixDescriptor::new(id)
        .with_problems(problems.iter().copied())
        .with_files(files.iter().copied())
}

/// Write `<dir>/<file_name>` as a manifest plus a `[files]` payload table
pub fn write_archive(
    dir: &Path,
    file_name: &str,
    descriptor: &Descriptor,
    files: &[(&str, &str)],
) -> PathBuf {
    let mut table = toml::Table::try_from(descriptor).unwrap();
    table.insert("manifest-version".to_string(), toml::Value::Integer(1));
    let payload: toml::Table = files
        .iter()
        .map(|(path, content)| (path.to_string(), toml::Value::String(content.to_string())))
        .collect();
    table.insert("files".to_string(), toml::Value::Table(payload));

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(file_name);
    std::fs::write(&path, toml::to_string(&table).unwrap()).unwrap();
    path
}

pub fn write_feature(dir: &Path, descriptor: &FeatureDescriptor, files: &[(&str, &str)]) -> PathBuf {
    let file_name = format!("{}.esa", descriptor.symbolic_name());
    write_archive(dir, &file_name, &Descriptor::Feature(descriptor.clone()), files)
}

pub fn write_fix(dir: &Path, descriptor: &FixDescriptor, files: &[(&str, &str)]) -> PathBuf {
    let file_name = format!("{}.esa", descriptor.id());
    write_archive(dir, &file_name, &Descriptor::Fix(descriptor.clone()), files)
}

/// Manifest reader that counts how often an archive is opened
#[derive(Clone, Default)]
pub struct CountingReader {
    inner: TomlManifestReader,
    parses: Arc<AtomicUsize>,
}

impl CountingReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}

impl ManifestReader for CountingReader {
    fn parse(&self, path: &Path) -> Result<Descriptor> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(path)
    }
}

/// Engine events, shared with the test after the engine moves into a Director
pub type EngineLog = Arc<Mutex<Vec<String>>>;

/// Extracts the `[files]` table of an archive below the install root
///
/// Files ending in `.sh` are marked executable. Fixes back up the content
/// they overwrite and restore it on uninstall by recreating the file, which
/// drops its mode until the permission fix-up runs.
#[derive(Default)]
pub struct FileEngine {
    log: EngineLog,
    fail_on: Option<String>,
    fail_uninstall_on: Option<String>,
    backups: HashMap<(String, PathBuf), Vec<u8>>,
}

impl FileEngine {
    pub fn new() -> (Self, EngineLog) {
        let engine = Self::default();
        let log = Arc::clone(&engine.log);
        (engine, log)
    }

    /// Fail after writing the first file of `asset`
    pub fn failing_on(mut self, asset: &str) -> Self {
        self.fail_on = Some(asset.to_string());
        self
    }

    /// Fail before touching any file when asked to remove `target`
    pub fn failing_uninstall_on(mut self, target: &str) -> Self {
        self.fail_uninstall_on = Some(target.to_string());
        self
    }

    fn payload(artifact: &Path) -> Result<toml::Table> {
        let content = std::fs::read_to_string(artifact)?;
        let mut table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| Error::RuntimeError(e.to_string()))?;
        match table.remove("files") {
            Some(toml::Value::Table(files)) => Ok(files),
            _ => Ok(toml::Table::new()),
        }
    }
}

impl ExtractionEngine for FileEngine {
    fn install(
        &mut self,
        asset: &ResolvedAsset,
        artifact: &Path,
        ctx: &mut InstallContext,
    ) -> Result<Vec<PathBuf>> {
        self.log.lock().unwrap().push(format!("install:{}", asset.id()));
        let is_fix = asset.fix_descriptor().is_some();

        let mut written = Vec::new();
        for (relative, content) in Self::payload(artifact)? {
            let target = ctx.install_root().join(&relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if is_fix && let Ok(previous) = std::fs::read(&target) {
                self.backups
                    .insert((asset.id().to_string(), target.clone()), previous);
            }
            std::fs::write(&target, content.as_str().unwrap_or_default())?;
            ctx.track([target.clone()]);
            if relative.ends_with(".sh") {
                ctx.mark_executable(&target);
            }
            written.push(target);

            if self.fail_on.as_deref() == Some(asset.id()) {
                return Err(Error::RuntimeError(format!("injected failure in {}", asset.id())));
            }
        }
        Ok(written)
    }

    fn uninstall(
        &mut self,
        target: &UninstallTarget,
        recorded: &[PathBuf],
        ctx: &mut InstallContext,
    ) -> Result<Vec<PathBuf>> {
        self.log.lock().unwrap().push(format!("uninstall:{}", target.id()));
        if self.fail_uninstall_on.as_deref() == Some(target.id()) {
            return Err(Error::RuntimeError(format!("injected failure removing {}", target.id())));
        }

        let mut restored = Vec::new();
        for path in recorded {
            match self.backups.remove(&(target.id().to_string(), path.clone())) {
                Some(previous) => {
                    std::fs::remove_file(path)?;
                    std::fs::write(path, previous)?;
                    if path.extension().is_some_and(|e| e == "sh") {
                        ctx.mark_executable(path);
                    }
                    restored.push(path.clone());
                }
                None => match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                },
            }
        }
        Ok(restored)
    }
}

pub fn test_config(root: &Path) -> EngineConfig {
    EngineConfig::for_root(root)
}

/// Director over `root` with a fast lock probe
pub fn director<R: ManifestReader>(root: &Path, reader: R, engine: FileEngine) -> Director<R> {
    Director::new(test_config(root), reader, Box::new(engine))
        .unwrap()
        .with_lock_probe(LockProbe::new(1, Duration::from_millis(1)))
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
