//! The per-prompt export pipeline
//!
//! 1. Resolve the active chain for the current and previous directory.
//! 2. Unset names from directories that left the chain.
//! 3. Serve definitions from the cache if the hierarchy hash still matches.
//! 4. Otherwise load, merge, gate and evaluate `sh` variables, render and
//!    populate the cache.
//!
//! Cleanup code always comes first in the emitted script so a name that is
//! both unset and redefined ends up with its new value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::auth::AuthStore;
use crate::cache::{Cache, CacheEntry};
use crate::chain::{ActiveChain, active_chain};
use crate::cleanup::{calculate_cleanup, cleanup_names};
use crate::config::{
    ConfigDocument, DefinedNames, HIERARCHY_SEPARATOR, Loader, MergedConfig, hash_file, load,
};
use crate::error::Result;
use crate::paths::{Paths, Settings};
use crate::render::{Definitions, Shell, render, render_cleanup, render_prev_dir};
use crate::shell::{Approver, CommandRunner, ensure_approved, evaluate};

/// One export invocation
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    pub current: &'a Path,
    pub previous: Option<&'a Path>,
    pub shell: Shell,
}

/// What the shell should evaluate
#[derive(Debug, Clone, Default)]
pub struct Export {
    /// Names unset for vacated directories
    pub cleanup: DefinedNames,
    /// Cleanup, then definitions, then the previous-directory marker
    pub script: String,
    /// Active chain of the current directory
    pub chain: Vec<PathBuf>,
    pub cache_hit: bool,
    /// Message for the user (stderr), e.g. an unauthorized config
    pub hint: Option<String>,
}

/// Owns the stores for one invocation
#[derive(Debug)]
pub struct Engine {
    loader: Loader,
    auth: AuthStore,
    cache: Cache,
    settings: Settings,
}

impl Engine {
    pub fn new(loader: Loader, auth: AuthStore, cache: Cache, settings: Settings) -> Self {
        Self {
            loader,
            auth,
            cache,
            settings,
        }
    }

    /// Open the stores at their default locations
    pub fn open(paths: &Paths, settings: Settings) -> Result<Self> {
        let loader = Loader::new(paths.global_config());
        let auth = AuthStore::open(paths.auth_file(), &paths.legacy_auth_file())?;
        let cache = Cache::load(paths.cache_file())?;
        Ok(Self::new(loader, auth, cache, settings))
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn active_chain(&self, dir: &Path) -> ActiveChain {
        active_chain(&self.loader, &self.auth, dir)
    }

    /// Trust `dir`
    pub fn allow(&mut self, dir: &Path) -> Result<()> {
        self.auth.allow(dir)?;
        Ok(())
    }

    /// Stop trusting `dir` and drop merged results that may have inherited from it.
    ///
    /// Its own cleanup list stays cached, so the next export in any shell
    /// below it unsets what it defined.
    pub fn revoke(&mut self, dir: &Path) -> Result<bool> {
        let was_allowed = self.auth.revoke(dir)?;
        self.cache.clear_hierarchy(dir)?;
        Ok(was_allowed)
    }

    /// Merged config of the active chain for `dir`, bypassing the cache
    pub fn merged_for(&self, dir: &Path) -> Result<MergedConfig> {
        let chain = self.active_chain(dir);
        if chain.is_empty() {
            return Ok(MergedConfig::default());
        }
        Ok(self.loader.load_files(&chain.files())?.merged)
    }

    pub fn export(
        &mut self,
        request: &ExportRequest<'_>,
        approver: &dyn Approver,
        runner: &dyn CommandRunner,
    ) -> Result<Export> {
        let current = request.current;
        let shell = request.shell;

        let chain = self.active_chain(current);
        let prev_chain = match request.previous {
            Some(prev) if prev != current => self.active_chain(prev),
            _ => ActiveChain::default(),
        };
        let curr_dirs = chain.dirs();
        let prev_dirs = prev_chain.dirs();

        let mut vacated = calculate_cleanup(&prev_dirs, &curr_dirs);
        let starts: Vec<&Path> = std::iter::once(current).chain(request.previous).collect();
        let known: Vec<PathBuf> = curr_dirs.iter().chain(&prev_dirs).cloned().collect();
        vacated.extend(self.orphaned_owners(&starts, &known));
        let mut cleanup = cleanup_names(&self.cache, &vacated);

        let global_now = self.global_applies(&chain);
        let left_global = request.previous.is_some_and(|prev| prev != current)
            && !global_now
            && self.global_applies(&prev_chain);
        if left_global {
            if let Some(names) = self
                .loader
                .global_path()
                .and_then(|path| self.cache.get(path))
                .and_then(|entry| entry.cleanup_names())
            {
                cleanup.extend(names);
            }
        }

        let mut export = Export {
            script: render_cleanup(shell, &cleanup),
            cleanup,
            chain: curr_dirs,
            hint: unauthorized_hint(&chain),
            cache_hit: false,
        };

        if !chain.is_empty() {
            let (code, hit) = self.definitions(current, &chain, shell, approver, runner)?;
            export.script.push_str(&code);
            export.cache_hit = hit;
        } else if global_now {
            let code = self.global_definitions(shell)?;
            export.script.push_str(&code);
        }

        export.script.push_str(&render_prev_dir(shell, current));
        Ok(export)
    }

    /// Ancestors of `starts` that still have a cleanup list cached but are in
    /// neither chain: revoked since they were loaded, or their file was removed.
    fn orphaned_owners(&self, starts: &[&Path], known: &[PathBuf]) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = Vec::new();
        for start in starts {
            for dir in start.ancestors() {
                if known.iter().any(|k| k == dir) || found.iter().any(|f| f == dir) {
                    continue;
                }
                if self.cache.get(dir).is_some_and(|e| e.has_local_config()) {
                    debug!("Unloading {} which left the chain in place", dir.display());
                    found.push(dir.to_path_buf());
                }
            }
        }
        found
    }

    /// Whether the global layer is part of the merged result for `chain`
    fn global_applies(&self, chain: &ActiveChain) -> bool {
        if !self.loader.global_path().is_some_and(Path::is_file) {
            return false;
        }
        match chain.links.first() {
            None => true,
            Some(root) => load(&root.file).map_or(true, |doc| !doc.ignore_global),
        }
    }

    /// Definitions of the global layer alone, outside every chain.
    ///
    /// There is no authorized directory to key an approval on here, so `sh`
    /// variables of the global config are only evaluated inside a chain.
    fn global_definitions(&self, shell: Shell) -> Result<String> {
        let loaded = self.loader.load_files(&[])?;
        let Some((path, doc)) = &loaded.global else {
            return Ok(String::new());
        };
        self.record_file(path, &hash_file(path)?, doc)?;

        let skipped = doc.shell_commands().len();
        if skipped > 0 {
            debug!("Skipping {} global sh variable(s) outside an authorized directory", skipped);
        }
        Ok(render(shell, &Definitions::from_merged(&loaded.merged, BTreeMap::new())))
    }

    /// File-level entry for `key` unless an up-to-date one exists
    fn record_file(&self, key: &Path, hash: &str, doc: &ConfigDocument) -> Result<()> {
        let fresh = self.cache.get(key).is_some_and(|e| e.is_file_valid(hash));
        if !fresh {
            self.cache
                .set(CacheEntry::for_file(key, hash.to_string(), doc))?;
        }
        Ok(())
    }

    /// Rendered definitions for `current` and whether they came from the cache
    fn definitions(
        &mut self,
        current: &Path,
        chain: &ActiveChain,
        shell: Shell,
        approver: &dyn Approver,
        runner: &dyn CommandRunner,
    ) -> Result<(String, bool)> {
        let files = chain.files();
        let file_hashes = files
            .iter()
            .map(|f| hash_file(f))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let hierarchy_hash = file_hashes.join(HIERARCHY_SEPARATOR);
        let global_hash = self
            .loader
            .global_path()
            .filter(|p| p.is_file())
            .and_then(|p| hash_file(p).ok());

        if let Some(entry) = self.cache.get(current) {
            if entry.is_hierarchy_valid(&hierarchy_hash, global_hash.as_deref())
                && entry.shell.as_deref() == Some(shell.name())
            {
                if let Some(code) = entry.shell_code {
                    debug!("Cache hit for {}", current.display());
                    return Ok((code, true));
                }
            }
        }
        debug!("Cache miss for {}", current.display());

        let loaded = self.loader.load_files(&files)?;
        let merged = loaded.merged;

        let commands = merged.shell_commands();
        let (shell_env, approved) = self.shell_env(current, chain, &commands, approver, runner);

        let code = render(shell, &Definitions::from_merged(&merged, shell_env));

        // File-level entries for every ancestor in the chain and for the global
        // layer, so leaving them later can unset what they defined
        for ((link, doc), hash) in chain.links.iter().zip(&loaded.documents).zip(&file_hashes) {
            if link.dir != current {
                self.record_file(&link.dir, hash, doc)?;
            }
        }
        if let (Some((path, doc)), Some(hash)) = (&loaded.global, &global_hash) {
            self.record_file(path, hash, doc)?;
        }

        let mut leaf = match chain.leaf() {
            Some(link) if link.dir == current => {
                let doc = loaded.documents.last().cloned().unwrap_or_default();
                let hash = file_hashes.last().cloned().unwrap_or_default();
                CacheEntry::for_file(current, hash, &doc)
            }
            _ => CacheEntry::inherited(current),
        };
        if approved {
            leaf = leaf
                .with_hierarchy(hierarchy_hash, chain.dirs(), global_hash, &merged)
                .with_shell_code(shell.name(), code.clone());
        }
        self.cache.set(leaf)?;

        Ok((code, false))
    }

    /// Evaluate `sh` variables if approved; returns the values and whether approval held
    fn shell_env(
        &mut self,
        current: &Path,
        chain: &ActiveChain,
        commands: &BTreeMap<String, String>,
        approver: &dyn Approver,
        runner: &dyn CommandRunner,
    ) -> (BTreeMap<String, String>, bool) {
        if commands.is_empty() {
            return (BTreeMap::new(), true);
        }
        // The deepest chain directory is always an allowed one
        let Some(owner) = chain.leaf().map(|l| l.dir.clone()) else {
            return (BTreeMap::new(), true);
        };

        match ensure_approved(&mut self.auth, &owner, commands, approver) {
            Ok(()) => (
                evaluate(commands, current, runner, self.settings.shell_timeout),
                true,
            ),
            Err(e) => {
                warn!("Skipping shell env for {}: {}", owner.display(), e);
                (BTreeMap::new(), false)
            }
        }
    }
}

fn unauthorized_hint(chain: &ActiveChain) -> Option<String> {
    let dir = chain.skipped.last()?;
    // Only hint about configs deeper than anything active
    if let Some(leaf) = chain.leaf() {
        if !dir.starts_with(&leaf.dir) {
            return None;
        }
    }
    Some(format!(
        "dirvana: {} has a config that is not authorized. Run `dirvana allow {}` to trust it.",
        dir.display(),
        dir.display()
    ))
}
