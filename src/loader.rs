//! Discover the newest input file in a directory and load it, at most once per source.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::{Dataset, LoadError};

/// Where datasets are looked up when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "data/synthetic_bim";

/// File name patterns, most specific first. Every match competes on recency.
pub const PRIORITY_PATTERNS: [&str; 4] = ["*ready*.csv", "*phase3*.csv", "*enriched*.csv", "*.csv"];

type LoadResult<T> = Result<T, LoadError>;

/// The identity of a source file: a changed path, modification time or size means new content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub len: u64,
}

impl SourceId {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A parsed dataset together with the source it came from.
#[derive(Clone, Debug)]
pub struct Loaded {
    pub source: SourceId,
    pub dataset: Rc<Dataset>,
}

impl Loaded {
    /// The one-line success notice shown to the user.
    pub fn notice(&self) -> String {
        format!(
            "Loaded: {} ({} elements)",
            self.source.file_name(),
            self.dataset.len()
        )
    }
}

/// Select the file in `dir` matching any of the [PRIORITY_PATTERNS] with the most recent
/// modification time. Ties go to the lexicographically first file name.
pub fn find_latest_source(dir: &Path) -> LoadResult<SourceId> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDirectory(dir.to_path_buf()));
    }
    let patterns = PRIORITY_PATTERNS
        .iter()
        .map(|pattern| glob::Pattern::new(pattern))
        .collect::<Result<Vec<_>, _>>()?;
    let io_error = |source: std::io::Error| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut contents = Vec::new();
    let mut latest: Option<(String, SourceId)> = None;
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(name) => {
                warn!("skipping non UTF-8 entry {:?}", name);
                continue;
            }
        };
        contents.push(name.clone());

        if !patterns.iter().any(|pattern| pattern.matches(&name)) {
            continue;
        }
        // Follows symlinks, unlike the entry's own metadata.
        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("skipping unreadable entry {}: {}", name, err);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let candidate = SourceId {
            path,
            modified: metadata.modified().map_err(io_error)?,
            len: metadata.len(),
        };
        debug!("candidate source {} ({:?})", name, candidate.modified);

        let newer = match &latest {
            None => true,
            Some((best_name, best)) => {
                candidate.modified > best.modified
                    || (candidate.modified == best.modified && name < *best_name)
            }
        };
        if newer {
            latest = Some((name, candidate));
        }
    }

    match latest {
        Some((_, source)) => Ok(source),
        None => {
            contents.sort();
            Err(LoadError::NoSource {
                dir: dir.to_path_buf(),
                contents,
            })
        }
    }
}

/// Reads datasets out of a single directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loader {
    dir: PathBuf,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl Loader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identify the current source without reading it.
    pub fn locate(&self) -> LoadResult<SourceId> {
        find_latest_source(&self.dir)
    }

    /// Locate then parse the current source.
    pub fn load(&self) -> LoadResult<Loaded> {
        let source = self.locate()?;
        self.load_source(source)
    }

    /// Parse a previously located source.
    pub fn load_source(&self, source: SourceId) -> LoadResult<Loaded> {
        let mut reader = Dataset::configured_csv_reader_builder().from_path(&source.path)?;
        let dataset = Dataset::from_csv(&mut reader)?;
        let loaded = Loaded {
            source,
            dataset: Rc::new(dataset),
        };
        info!("{}", loaded.notice());
        Ok(loaded)
    }
}

/// Session-scoped cache of the loaded dataset, keyed by [SourceId].
#[derive(Debug, Default)]
pub struct Session {
    loader: Loader,
    cached: Option<Loaded>,
}

impl Session {
    pub fn new(loader: Loader) -> Self {
        Self {
            loader,
            cached: None,
        }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// The cached load, if any happened yet.
    pub fn loaded(&self) -> Option<&Loaded> {
        self.cached.as_ref()
    }

    /// The session's dataset, loading it on first use only.
    pub fn dataset(&mut self) -> LoadResult<Rc<Dataset>> {
        if let Some(loaded) = &self.cached {
            return Ok(Rc::clone(&loaded.dataset));
        }
        let loaded = self.loader.load()?;
        let dataset = Rc::clone(&loaded.dataset);
        self.cached = Some(loaded);
        Ok(dataset)
    }

    /// Rescan the directory and reload if the newest source differs from the cached one. Returns
    /// whether a (re)load happened.
    pub fn refresh(&mut self) -> LoadResult<bool> {
        let source = self.loader.locate()?;
        if matches!(&self.cached, Some(loaded) if loaded.source == source) {
            debug!("source {} unchanged", source.file_name());
            return Ok(false);
        }
        self.cached = Some(self.loader.load_source(source)?);
        Ok(true)
    }

    /// Drop the cached dataset; the next [Session::dataset] call reloads.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn write_file(dir: &Path, name: &str, contents: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 - age_secs);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
        path
    }

    #[test]
    fn newest_priority_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a_ready.csv", "ElementType\nWall\n", 100);
        let newer = write_file(dir.path(), "b_phase3.csv", "ElementType\nDoor\n", 10);
        assert_eq!(find_latest_source(dir.path()).unwrap().path, newer);
    }

    #[test]
    fn newest_catch_all_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ready_old.csv", "x\n", 100);
        let newer = write_file(dir.path(), "plain.csv", "x\n", 1);
        write_file(dir.path(), "newest.txt", "x\n", 0);
        assert_eq!(find_latest_source(dir.path()).unwrap().path, newer);
    }

    #[test]
    fn ties_pick_first_name() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "c.csv", "x\n", 5);
        let first = write_file(dir.path(), "a.csv", "x\n", 5);
        write_file(dir.path(), "b.csv", "x\n", 5);
        assert_eq!(find_latest_source(dir.path()).unwrap().path, first);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_source_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = write_file(elsewhere.path(), "export.csv", "ElementType\nWall\n", 0);
        write_file(dir.path(), "old.csv", "ElementType\nDoor\n", 100);
        let link = dir.path().join("bim_ready.csv");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let source = find_latest_source(dir.path()).unwrap();
        assert_eq!(source.path, link);
        assert_eq!(source.len, "ElementType\nWall\n".len() as u64);
        let loaded = Loader::new(dir.path()).load().unwrap();
        assert_eq!(loaded.notice(), "Loaded: bim_ready.csv (1 elements)");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let real = write_file(dir.path(), "real.csv", "ElementType\nWall\n", 100);
        std::os::unix::fs::symlink(dir.path().join("gone.csv"), dir.path().join("new_ready.csv"))
            .unwrap();
        assert_eq!(find_latest_source(dir.path()).unwrap().path, real);
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let error = find_latest_source(&missing).unwrap_err();
        assert!(matches!(error, LoadError::MissingDirectory(path) if path == missing));
    }

    #[test]
    fn no_source_reports_contents() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "notes.txt", "x\n", 0);
        std::fs::create_dir(dir.path().join("archive.csv")).unwrap();
        match find_latest_source(dir.path()).unwrap_err() {
            LoadError::NoSource { contents, .. } => {
                assert_eq!(contents, ["archive.csv", "notes.txt"])
            }
            error => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn load_notice() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "bim_enriched.csv",
            "ElementType,TotalCost_ETB\nWall,100\nDoor,50\n",
            0,
        );
        let loaded = Loader::new(dir.path()).load().unwrap();
        assert_eq!(loaded.dataset.len(), 2);
        assert_eq!(loaded.notice(), "Loaded: bim_enriched.csv (2 elements)");
    }

    #[test]
    fn session_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "data.csv", "ElementType\nWall\n", 10);
        let mut session = Session::new(Loader::new(dir.path()));
        let first = session.dataset().unwrap();
        // The cached dataset outlives its source until the next refresh.
        std::fs::remove_file(&path).unwrap();
        let second = session.dataset().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn session_refresh_reloads_on_new_source() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.csv", "ElementType\nWall\n", 10);
        let mut session = Session::new(Loader::new(dir.path()));
        let first = session.dataset().unwrap();
        assert!(!session.refresh().unwrap());
        assert!(Rc::ptr_eq(&first, &session.dataset().unwrap()));

        write_file(dir.path(), "data_ready.csv", "ElementType\nWall\nDoor\n", 0);
        assert!(session.refresh().unwrap());
        let second = session.dataset().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(
            session.loaded().unwrap().source.file_name(),
            "data_ready.csv"
        );
    }

    #[test]
    fn session_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.csv", "ElementType\nWall\n", 10);
        let mut session = Session::new(Loader::new(dir.path()));
        let first = session.dataset().unwrap();
        session.invalidate();
        assert!(session.loaded().is_none());
        let second = session.dataset().unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }
}
