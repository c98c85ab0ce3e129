//! Program image loading
//!
//! An image is a text file of whitespace-separated decimal integers, with no
//! header or length prefix.
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vm::{ParseError, Program};

/// Error raised before execution, when the program image can't be loaded
#[derive(Debug, Error)]
pub enum ImageLoadError {
    /// The file could not be read
    #[error("failed to read {path:?}")]
    Io {
        /// Path to the image
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not a list of integers
    #[error("failed to parse {path:?}")]
    Parse {
        /// Path to the image
        path: PathBuf,
        /// Underlying error
        source: ParseError,
    },
}

/// Loads a program image from the given path
pub fn load(path: impl AsRef<Path>) -> Result<Program, ImageLoadError> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).map_err(|source| ImageLoadError::Io {
            path: path.to_owned(),
            source,
        })?;
    let prog = Program::parse(&text).map_err(|source| {
        ImageLoadError::Parse {
            path: path.to_owned(),
            source,
        }
    })?;
    debug!("loaded {} integers from {path:?}", prog.len());
    for (i, v) in prog.as_slice().iter().enumerate() {
        debug!("  {i:04}: {v}");
    }
    Ok(prog)
}

#[cfg(test)]
mod test {
    use super::*;

    fn scratch_file(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("kiln-image-{}-{name}", std::process::id()));
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn load_ok() {
        let path = scratch_file("ok", "9 0 7\n10 0\n0\n");
        let prog = load(&path).unwrap();
        assert_eq!(prog.as_slice(), &[9, 0, 7, 10, 0, 0]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_missing() {
        let path = std::env::temp_dir().join("kiln-image-does-not-exist");
        let e = load(&path).unwrap_err();
        assert!(matches!(e, ImageLoadError::Io { .. }), "{e:?}");
    }

    #[test]
    fn load_garbage() {
        let path = scratch_file("garbage", "1 2\nthree\n");
        let e = load(&path).unwrap_err();
        match e {
            ImageLoadError::Parse { source, .. } => assert_eq!(
                source,
                ParseError::InvalidToken {
                    line: 2,
                    token: "three".to_owned()
                }
            ),
            e => panic!("unexpected error {e:?}"),
        }
        std::fs::remove_file(path).unwrap();
    }
}
