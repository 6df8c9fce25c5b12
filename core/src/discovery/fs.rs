//! Filesystem realization of [`Discovery`]: scans a root directory for
//! `test_*` case-declaration files.
//!
//! Grounded in the framework's general shape of "scan a root, build a
//! descriptor per match, parse lazily" — no single framework file owns this
//! exact walk, since the framework's own test discovery is a language
//! built-in; this module is the plugin-interface realization §9 calls for.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{CaseSpec, TestDescriptor};
use crate::error::DiscoveryError;

use super::parser::{CaseParser, DefaultCaseParser};
use super::{Discovery, DiscoveryResult};

/// Scans `root` for files named `test_*.<ext>` (any extension the configured
/// [`CaseParser`] recognizes) and exposes them as [`TestDescriptor`]s.
///
/// `module` is the `::`-joined path of directories between `root` and the
/// file, or `"root"` for files directly under it; `name` is the file stem
/// with its `test_` prefix and extension stripped.
pub struct FsDiscovery {
    root: PathBuf,
    parser: Box<dyn CaseParser>,
    reload_exclude: Vec<PathBuf>,
    paths: RwLock<HashMap<String, PathBuf>>,
}

impl FsDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_parser(root, Box::new(DefaultCaseParser))
    }

    pub fn with_parser(root: impl Into<PathBuf>, parser: Box<dyn CaseParser>) -> Self {
        Self {
            root: root.into(),
            parser,
            reload_exclude: Vec::new(),
            paths: RwLock::new(HashMap::new()),
        }
    }

    /// Paths under these directories are not invalidated by [`Discovery::reload`].
    pub fn with_reload_exclusions(mut self, excluded: Vec<PathBuf>) -> Self {
        self.reload_exclude = excluded;
        self
    }

    fn module_for(&self, file: &Path) -> String {
        let parent = file.parent().unwrap_or(&self.root);
        let rel = parent.strip_prefix(&self.root).unwrap_or(parent);
        let joined: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if joined.is_empty() {
            "root".to_string()
        } else {
            joined.join("::")
        }
    }

    fn name_for(&self, file: &Path) -> Option<String> {
        let stem = file.file_stem()?.to_string_lossy().into_owned();
        stem.strip_prefix("test_").map(|s| s.to_string())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.reload_exclude.iter().any(|ex| path.starts_with(ex))
    }

    /// Re-walks `root` and rebuilds the qualified-name → path index without
    /// parsing docstrings (`load_case`'s fallback, not a full `list_tests`).
    async fn rescan_paths(&self) -> Result<HashMap<String, PathBuf>, DiscoveryError> {
        let candidates = walk(
            &self.root,
            self.parser.as_ref(),
            |p| self.module_for(p),
            |p| self.name_for(p),
        )?;
        let mut paths = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            let qualified_name = format!("{}::{}", candidate.module, candidate.name);
            paths.insert(qualified_name, candidate.path);
        }
        Ok(paths)
    }
}

/// One matched case file before the docstring has been parsed out of it.
struct Candidate {
    path: PathBuf,
    module: String,
    name: String,
}

fn walk(root: &Path, parser: &dyn CaseParser, module_of: impl Fn(&Path) -> String, name_of: impl Fn(&Path) -> Option<String>) -> Result<Vec<Candidate>, DiscoveryError> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.starts_with("test_") || !parser.recognizes(&file_name) {
            continue;
        }
        let Some(name) = name_of(path) else { continue };
        let module = module_of(path);
        out.push(Candidate {
            path: path.to_path_buf(),
            module,
            name,
        });
    }
    Ok(out)
}

#[async_trait]
impl Discovery for FsDiscovery {
    async fn list_tests(&self) -> DiscoveryResult {
        if !self.root.exists() {
            return DiscoveryResult {
                tests: Vec::new(),
                error: Some(format!("discovery root does not exist: {}", self.root.display())),
            };
        }

        let candidates = match walk(
            &self.root,
            self.parser.as_ref(),
            |p| self.module_for(p),
            |p| self.name_for(p),
        ) {
            Ok(c) => c,
            Err(e) => {
                return DiscoveryResult {
                    tests: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        let mut tests = Vec::with_capacity(candidates.len());
        let mut errors = Vec::new();
        let mut paths = HashMap::new();

        for candidate in candidates {
            let contents = match std::fs::read_to_string(&candidate.path) {
                Ok(c) => c,
                Err(e) => {
                    errors.push(format!("{}: {}", candidate.path.display(), e));
                    continue;
                }
            };
            let file_name = candidate
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let docstring = match self.parser.parse(&file_name, &contents) {
                Ok(parsed) => parsed.docstring,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };
            let mut descriptor = TestDescriptor::new(candidate.module, candidate.name);
            descriptor.docstring = docstring;
            paths.insert(descriptor.qualified_name.clone(), candidate.path);
            tests.push(descriptor);
        }

        tests.sort_by(|a, b| (&a.module, &a.name).cmp(&(&b.module, &b.name)));
        *self.paths.write().await = paths;

        DiscoveryResult {
            tests,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    async fn reload(&self) {
        let mut paths = self.paths.write().await;
        paths.retain(|_, path| self.is_excluded(path));
        tracing::debug!(root = %self.root.display(), "discovery reload invalidated path index");
    }

    async fn load_case(&self, descriptor: &TestDescriptor) -> Result<Vec<CaseSpec>, DiscoveryError> {
        let path = {
            let paths = self.paths.read().await;
            paths.get(&descriptor.qualified_name).cloned()
        };
        // A miss here is expected right after `reload()` clears the index
        // (§4.D "hot reload" runs before every job's first task), and also
        // covers a caller that never ran `list_tests()`. Rebuild the index
        // from disk before giving up, so `reload()` only needs to invalidate
        // rather than own staying-populated.
        let path = match path {
            Some(path) => path,
            None => {
                tracing::debug!(
                    qualified_name = %descriptor.qualified_name,
                    "path index miss, rescanning discovery root"
                );
                let rescanned = self.rescan_paths().await?;
                let found = rescanned.get(&descriptor.qualified_name).cloned();
                *self.paths.write().await = rescanned;
                found.ok_or_else(|| DiscoveryError::CaseParse {
                    file: descriptor.qualified_name.clone(),
                    message: "test not found; run discovery first".to_string(),
                })?
            }
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| DiscoveryError::CaseParse {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = self.parser.parse(&file_name, &contents)?;
        Ok(parsed.cases)
    }
}
