use std::fs::{create_dir_all, read_dir, remove_file};
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Captures, Regex};


pub const BUILD_DIR_NAME: &str = "build";

lazy_static! {
    static ref PATH_VARIABLE: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Expands `${test_dir}`, `${common_dir}`, `${root_dir}` and `${build_dir}` in
/// commands, arguments and file references of a test case.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root_dir: PathBuf,
    common_dir: PathBuf,
}

impl PathResolver {
    pub fn new(root_dir: PathBuf, common_dir: PathBuf) -> Self {
        PathResolver {
            root_dir,
            common_dir,
        }
    }

    pub fn build_dir(test_dir: &Path) -> PathBuf {
        test_dir.join(BUILD_DIR_NAME)
    }

    /// Substitutes every known variable in `path`. Unknown `${...}` tokens stay as they are.
    ///
    /// The build directory of `test_dir` exists once this returns, whether or not
    /// `${build_dir}` appears in `path`.
    pub fn resolve(&self, path: &str, test_dir: &Path) -> io::Result<String> {
        let build_dir = Self::build_dir(test_dir);
        create_dir_all(&build_dir)?;

        let resolved = PATH_VARIABLE.replace_all(path, |caps: &Captures| {
            match &caps[1] {
                "test_dir" => test_dir.display().to_string(),
                "common_dir" => self.common_dir.display().to_string(),
                "root_dir" => self.root_dir.display().to_string(),
                "build_dir" => build_dir.display().to_string(),
                _ => caps[0].to_owned(),
            }
        });
        Ok(resolved.into_owned())
    }

    /// Like [`resolve`](Self::resolve), but relative results are anchored at `test_dir`.
    pub fn resolve_in(&self, path: &str, test_dir: &Path) -> io::Result<PathBuf> {
        Ok(test_dir.join(self.resolve(path, test_dir)?))
    }
}

/// Removes the regular files left in the build directory of `test_dir` by an earlier run
/// and makes sure the directory exists.
pub fn clear_build_dir(test_dir: &Path) -> io::Result<()> {
    let build_dir = PathResolver::build_dir(test_dir);
    if build_dir.is_dir() {
        for entry in read_dir(&build_dir)? {
            let path = entry?.path();
            if path.is_file() {
                remove_file(&path)?;
            }
        }
    }
    create_dir_all(&build_dir)
}
