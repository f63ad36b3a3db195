use std::path::{Path, PathBuf};

use crate::error::{Error, Pos};

pub type BinaryId = usize;

/// An externally included binary blob placed inside a section.
///
/// The on-disk size is resolved eagerly at construction so that layout can
/// proceed; the bytes themselves are read from disk only when emission needs
/// them.
#[derive(Debug, Clone)]
pub struct Binary {
    pub src: PathBuf,
    pub size: usize,
    pub offset: usize,
    pub pos: Pos,
}

impl Binary {
    /// Paths beginning with `/` resolve against the toolchain base
    /// directory, all others against the including file's directory.
    pub fn new(base: &Path, including: &Path, src: &str, pos: Pos) -> Result<Self, Error> {
        let src = match src.strip_prefix('/') {
            Some(rest) => base.join(rest),
            None => including.parent().unwrap_or(Path::new("")).join(src),
        };

        let size = std::fs::metadata(&src)
            .map_err(|source| Error::Include {
                path: src.clone(),
                source,
                pos: pos.clone(),
            })?
            .len() as usize;

        Ok(Binary {
            src,
            size,
            offset: 0,
            pos,
        })
    }

    /// Read the blob's bytes. Deliberately uncached, emission happens once.
    pub fn read(&self) -> Result<Vec<u8>, Error> {
        std::fs::read(&self.src).map_err(|source| Error::Include {
            path: self.src.clone(),
            source,
            pos: self.pos.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn stat_eager_read_lazy() {
        let dir = std::env::temp_dir();
        let blob = dir.join("gblink_binary_test.bin");
        std::fs::write(&blob, [0xDEu8, 0xAD, 0xBE, 0xEF]).unwrap();

        let including = dir.join("main.gbs");
        let binary = Binary::new(&dir, &including, "gblink_binary_test.bin", Pos::default())
            .expect("stat should succeed");
        assert_eq!(binary.size, 4);
        assert_eq!(binary.read().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);

        std::fs::remove_file(&blob).unwrap();
    }

    #[test]
    fn base_relative_path() {
        let dir = std::env::temp_dir();
        let blob = dir.join("gblink_binary_base.bin");
        std::fs::write(&blob, [1u8, 2, 3]).unwrap();

        // Leading slash resolves against the base directory, not the
        // including file's directory.
        let including = dir.join("nested").join("main.gbs");
        let binary = Binary::new(&dir, &including, "/gblink_binary_base.bin", Pos::default())
            .expect("stat should succeed");
        assert_eq!(binary.size, 3);

        std::fs::remove_file(&blob).unwrap();
    }

    #[test]
    fn missing_file_is_include_error() {
        let dir = std::env::temp_dir();
        let err = Binary::new(&dir, &dir.join("main.gbs"), "no_such_file.bin", Pos::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Include);
    }
}
