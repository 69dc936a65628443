use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::fsck::fsck_backend::FsckBackend;
use crate::fsck::fsck_types::FsckError;
use crate::record::render_free_segment;

// -----------------------------------------------------------------------------
// Constantes del formato en disco
// -----------------------------------------------------------------------------

pub const BLOCK_SIZE: usize = 4096;
pub const MAX_BLOCKS: u32 = 10_000;
pub const DEVICE_ID: i64 = 20;

pub const SUPERBLOCK: u32 = 0;
pub const FREE_START: u32 = 1;
pub const FREE_END: u32 = 25;
pub const ROOT_BLOCK: u32 = 26;

pub const FREE_SEGMENTS: u32 = FREE_END - FREE_START + 1;
pub const SLOTS_PER_SEGMENT: u32 = MAX_BLOCKS / FREE_SEGMENTS;

/// Carácter con el que el driver rellena los bloques libres.
pub const ZERO_FILL: u8 = b'0';

pub const DEFAULT_FOLDER: &str = "/fusedata";
const BLOCK_PREFIX: &str = "fusedata.";

/// Un bloque está libre si tiene exactamente BLOCK_SIZE bytes de relleno.
pub fn is_zero_filled(raw: &[u8]) -> bool {
    raw.len() == BLOCK_SIZE && raw.iter().all(|&b| b == ZERO_FILL || b == 0)
}

pub fn zero_block() -> Vec<u8> {
    vec![ZERO_FILL; BLOCK_SIZE]
}

/// Bloque de la lista libre que lleva la cuenta de `block`.
pub fn segment_of(block: u32) -> u32 {
    block / SLOTS_PER_SEGMENT
}

// -----------------------------------------------------------------------------
// Almacén de bloques sobre una carpeta: un archivo por bloque
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FolderStore {
    folder: PathBuf,
}

impl FolderStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn block_path(&self, block: u32) -> PathBuf {
        self.folder.join(format!("{BLOCK_PREFIX}{block}"))
    }
}

impl FsckBackend for FolderStore {
    fn read_block(&self, block: u32) -> Result<Vec<u8>, FsckError> {
        if block >= MAX_BLOCKS {
            return Err(FsckError::BlockOutOfRange(block));
        }
        let path = self.block_path(block);
        trace!(block, path = %path.display(), "leyendo bloque");
        fs::read(&path).map_err(|source| FsckError::Io { block, source })
    }

    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<(), FsckError> {
        if block >= MAX_BLOCKS {
            return Err(FsckError::BlockOutOfRange(block));
        }
        let path = self.block_path(block);
        trace!(block, len = data.len(), "escribiendo bloque");
        fs::write(&path, data).map_err(|source| FsckError::Io { block, source })
    }
}

// -----------------------------------------------------------------------------
// Formateo de un volumen nuevo
// -----------------------------------------------------------------------------

/// Rellena un registro con ceros hasta ocupar el bloque, como lo deja el driver.
fn padded(record: &str) -> Vec<u8> {
    let mut data = record.as_bytes().to_vec();
    if data.len() < BLOCK_SIZE {
        data.resize(BLOCK_SIZE, ZERO_FILL);
    }
    data
}

/// Ajusta un registro reescrito al largo que tenía el bloque original. Si el
/// bloque venía relleno hasta BLOCK_SIZE, el relleno final se recorta o se
/// extiende para que siga midiendo exactamente eso.
pub fn fit_to_block(record: &str, original_len: usize) -> Vec<u8> {
    if original_len != BLOCK_SIZE {
        return record.as_bytes().to_vec();
    }
    let body = record.trim_end_matches(|c: char| c == ZERO_FILL as char || c == '\0');
    padded(body)
}

pub fn superblock_text(creation_time: i64) -> String {
    format!(
        "{{creationTime:{}, mounted:50, devId:{}, freeStart:{}, freeEnd:{}, root:{}, maxBlocks:{}}}",
        creation_time, DEVICE_ID, FREE_START, FREE_END, ROOT_BLOCK, MAX_BLOCKS
    )
}

pub fn root_directory_text(now: i64) -> String {
    format!(
        "{{size:{}, uid:1, gid:1, mode:16877, atime:{now}, ctime:{now}, mtime:{now}, linkcount:2, filename_to_inode_dict: {{d:.:{root}, d:..:{root}}}}}",
        BLOCK_SIZE,
        root = ROOT_BLOCK
    )
}

/// Escribe un volumen vacío: todos los bloques en cero, superblock, lista libre y raíz.
pub fn format_volume<B: FsckBackend>(backend: &mut B, now: i64) -> Result<(), FsckError> {
    let zero = zero_block();
    for block in 0..MAX_BLOCKS {
        backend.write_block(block, &zero)?;
    }

    // Todo lo que está después de la raíz empieza libre.
    for segment in 0..FREE_SEGMENTS {
        let first = segment * SLOTS_PER_SEGMENT;
        let free: Vec<u32> = (first..first + SLOTS_PER_SEGMENT)
            .filter(|&b| b > ROOT_BLOCK)
            .collect();
        backend.write_block(FREE_START + segment, render_free_segment(&free).as_bytes())?;
    }

    backend.write_block(SUPERBLOCK, &padded(&superblock_text(now)))?;
    backend.write_block(ROOT_BLOCK, &padded(&root_directory_text(now)))?;

    Ok(())
}

/// Verifica que la carpeta exista antes de tocar bloques.
pub fn ensure_folder(folder: &Path) -> Result<(), FsckError> {
    match fs::metadata(folder) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(FsckError::Io {
            block: SUPERBLOCK,
            source: std::io::Error::new(ErrorKind::InvalidInput, folder.display().to_string()),
        }),
        Err(source) => Err(FsckError::Io {
            block: SUPERBLOCK,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fill_detection() {
        assert!(is_zero_filled(&zero_block()));
        assert!(is_zero_filled(&vec![0u8; BLOCK_SIZE]));
        assert!(!is_zero_filled(&vec![ZERO_FILL; BLOCK_SIZE - 1]));
        let mut almost = zero_block();
        almost[100] = b'1';
        assert!(!is_zero_filled(&almost));
    }

    #[test]
    fn segments_cover_four_hundred_blocks() {
        assert_eq!(FREE_SEGMENTS, 25);
        assert_eq!(SLOTS_PER_SEGMENT, 400);
        assert_eq!(segment_of(399), 0);
        assert_eq!(segment_of(400), 1);
        assert_eq!(segment_of(9_999), 24);
    }

    #[test]
    fn folder_store_round_trips_blocks() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FolderStore::new(tmp.path());
        store.write_block(7, b"hola").unwrap();
        assert_eq!(store.read_block(7).unwrap(), b"hola");
        assert!(store.block_path(7).ends_with("fusedata.7"));
        assert!(matches!(
            store.read_block(8),
            Err(FsckError::Io { block: 8, .. })
        ));
        assert!(matches!(
            store.read_block(MAX_BLOCKS),
            Err(FsckError::BlockOutOfRange(_))
        ));
    }

    #[test]
    fn fitting_keeps_padded_blocks_at_block_size() {
        let grown = format!("{{a:1}}{}", "0".repeat(BLOCK_SIZE - 3));
        assert_eq!(grown.len(), BLOCK_SIZE + 2);
        let fitted = fit_to_block(&grown, BLOCK_SIZE);
        assert_eq!(fitted.len(), BLOCK_SIZE);
        assert!(fitted.starts_with(b"{a:1}0"));

        let shrunk = format!("{{a:1}}{}", "0".repeat(100));
        assert_eq!(fit_to_block(&shrunk, BLOCK_SIZE).len(), BLOCK_SIZE);

        // Un bloque que no venía relleno se escribe tal cual.
        assert_eq!(fit_to_block("{a:10}", 5), b"{a:10}");
    }

    #[test]
    fn ensure_folder_rejects_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ensure_folder(tmp.path()).is_ok());
        assert!(ensure_folder(&tmp.path().join("no-existe")).is_err());
    }
}
