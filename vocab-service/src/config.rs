use crate::db::{Db, MEMORY_PATH};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

const APP_DIR: &str = ".vocab";
const DB_FILE: &str = "vocab.db";

#[derive(Clone, Debug)]
pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    /// Uses `db_path` when given, otherwise `~/.vocab/vocab.db`.
    pub fn resolve(db_path: Option<PathBuf>) -> io::Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => default_db_path()?,
        };
        Ok(Self { db_path })
    }

    /// Opens (and if needed creates) the database and its directory.
    pub fn open_db(&self) -> Result<Db, crate::CliError> {
        if self.db_path != Path::new(MEMORY_PATH) {
            ensure_parent_dir(&self.db_path)?;
        }
        log::info!("Opening database at: {}", self.db_path.display());
        Ok(Db::open(&self.db_path)?)
    }
}

pub fn default_db_path() -> io::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory not found"))?;
    Ok(home.join(APP_DIR).join(DB_FILE))
}

/// Creates the directory holding `path`, owner-only on Unix.
fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let config = Config::resolve(Some(PathBuf::from("/tmp/x/vocab.db"))).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x/vocab.db"));
    }

    #[test]
    fn test_open_db_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("vocab.db");
        let config = Config::resolve(Some(db_path.clone())).unwrap();

        config.open_db().unwrap();
        assert!(db_path.parent().unwrap().is_dir());
        assert!(db_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_db_keeps_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join(OsStr::from_bytes(b"vocab-\xff.db"));
        let config = Config::resolve(Some(db_path.clone())).unwrap();

        config.open_db().unwrap();
        assert!(db_path.exists());
        assert!(!tmp.path().join("vocab-\u{FFFD}.db").exists());
    }

    #[test]
    fn test_memory_path_skips_directory() {
        let config = Config::resolve(Some(PathBuf::from(MEMORY_PATH))).unwrap();
        let db = config.open_db().unwrap();
        assert_eq!(db.count(&crate::db::VocabFilter::default()).unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("app");
        ensure_parent_dir(&dir.join("vocab.db")).unwrap();

        let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
