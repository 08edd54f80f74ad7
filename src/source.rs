//! Where dictionary text comes from
//!
//! The engine only sees strings. Everything touching the filesystem
//! (existence, path containment, extension and size checks) lives here.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::category::Category;
use crate::config::{Config, WatchConfig};
use crate::error::SourceError;

/// Supplies raw dictionary content per category
#[cfg_attr(test, mockall::automock)]
pub trait DictionarySource: Send + Sync {
    /// Content for `category`, or `None` if there is no source for it
    ///
    /// # Errors
    /// Returns error when a source exists but cannot be read
    fn read(&self, category: Category) -> Result<Option<String>, SourceError>;
}

/// Dictionary files on disk, one per category
#[derive(Debug, Clone)]
pub struct FileSource {
    paths: HashMap<Category, PathBuf>,
    base_dir: Option<PathBuf>,
    allowed_extensions: Vec<String>,
    max_file_bytes: u64,
}

impl FileSource {
    /// Creates a source over `paths` using the limits in `watch`
    #[must_use]
    pub fn new(paths: HashMap<Category, PathBuf>, watch: &WatchConfig) -> Self {
        Self {
            paths,
            base_dir: None,
            allowed_extensions: watch.allowed_extensions.clone(),
            max_file_bytes: watch.max_file_bytes,
        }
    }

    /// Builds a source from the `[dictionaries]` and `[watch]` sections
    ///
    /// # Errors
    /// Returns error if a `~/` path cannot be expanded
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut paths = HashMap::new();
        for category in Category::LOADABLE {
            if let Some(path) = config.dictionaries.path_for(category) {
                paths.insert(category, Config::expand_path(path)?);
            }
        }

        let mut source = Self::new(paths, &config.watch);
        if let Some(dir) = &config.dictionaries.base_dir {
            source = source.with_base_dir(Config::expand_path(dir)?);
        }
        Ok(source)
    }

    /// Requires every file to resolve inside `dir`
    #[must_use]
    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }

    /// Configured path for `category`
    #[must_use]
    pub fn path(&self, category: Category) -> Option<&Path> {
        self.paths.get(&category).map(PathBuf::as_path)
    }

    fn check_extension(&self, path: &Path) -> Result<(), SourceError> {
        let allowed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(ext))
            });
        if allowed {
            Ok(())
        } else {
            Err(SourceError::DisallowedExtension(path.display().to_string()))
        }
    }

    fn check_containment(&self, path: &Path) -> Result<(), SourceError> {
        let Some(base) = &self.base_dir else {
            return Ok(());
        };
        let base = base.canonicalize()?;
        let resolved = path.canonicalize()?;
        if resolved.starts_with(&base) {
            Ok(())
        } else {
            Err(SourceError::OutsideBaseDir(path.display().to_string()))
        }
    }
}

impl DictionarySource for FileSource {
    fn read(&self, category: Category) -> Result<Option<String>, SourceError> {
        let Some(path) = self.paths.get(&category) else {
            return Ok(None);
        };

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "dictionary file absent");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.check_extension(path)?;
        self.check_containment(path)?;

        if metadata.len() > self.max_file_bytes {
            return Err(SourceError::TooLarge {
                path: path.display().to_string(),
                size: metadata.len(),
                max: self.max_file_bytes,
            });
        }

        let bytes = fs::read(path)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| SourceError::Encoding(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn create_test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hotword_source_{tag}_{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn source_for(category: Category, path: PathBuf) -> FileSource {
        FileSource::new(HashMap::from([(category, path)]), &WatchConfig::default())
    }

    #[test]
    fn test_reads_existing_file() {
        let dir = create_test_dir("read");
        let path = dir.join("hot-zh.txt");
        fs::write(&path, "你好\thello\n").unwrap();

        let source = source_for(Category::Primary, path);
        assert_eq!(
            source.read(Category::Primary).unwrap().as_deref(),
            Some("你好\thello\n")
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_and_unconfigured_category_are_absent() {
        let dir = create_test_dir("missing");
        let source = source_for(Category::Primary, dir.join("nope.txt"));

        assert!(source.read(Category::Primary).unwrap().is_none());
        assert!(source.read(Category::Secondary).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_disallowed_extension() {
        let dir = create_test_dir("ext");
        let path = dir.join("hot.exe");
        fs::write(&path, "a=b").unwrap();

        let source = source_for(Category::Primary, path);
        assert!(matches!(
            source.read(Category::Primary),
            Err(SourceError::DisallowedExtension(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_too_large() {
        let dir = create_test_dir("large");
        let path = dir.join("hot.txt");
        fs::write(&path, "a=b\n".repeat(100)).unwrap();

        let watch = WatchConfig {
            max_file_bytes: 16,
            ..WatchConfig::default()
        };
        let source = FileSource::new(HashMap::from([(Category::Primary, path)]), &watch);
        assert!(matches!(
            source.read(Category::Primary),
            Err(SourceError::TooLarge { size: 400, max: 16, .. })
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_utf8() {
        let dir = create_test_dir("utf8");
        let path = dir.join("hot.txt");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let source = source_for(Category::Primary, path);
        assert!(matches!(
            source.read(Category::Primary),
            Err(SourceError::Encoding(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_path_outside_base_dir() {
        let base = create_test_dir("base");
        let other = create_test_dir("other");
        let inside = base.join("hot.txt");
        let outside = other.join("hot.txt");
        fs::write(&inside, "a=b").unwrap();
        fs::write(&outside, "a=b").unwrap();

        let source = FileSource::new(
            HashMap::from([
                (Category::Primary, inside),
                (Category::Secondary, base.join("..").join(other.file_name().unwrap()).join("hot.txt")),
            ]),
            &WatchConfig::default(),
        )
        .with_base_dir(base.clone());

        assert!(source.read(Category::Primary).unwrap().is_some());
        assert!(matches!(
            source.read(Category::Secondary),
            Err(SourceError::OutsideBaseDir(_))
        ));

        let _ = fs::remove_dir_all(&base);
        let _ = fs::remove_dir_all(&other);
    }

    #[test]
    fn test_from_config() {
        let config = Config::parse(
            r#"
[dictionaries]
primary = "/tmp/hot-zh.txt"
"#,
        )
        .unwrap();
        let source = FileSource::from_config(&config).unwrap();
        assert_eq!(
            source.path(Category::Primary),
            Some(Path::new("/tmp/hot-zh.txt"))
        );
        assert!(source.path(Category::Rule).is_none());
    }
}
