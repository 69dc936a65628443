/*Interfaz entre el fsck y el medio donde viven los bloques.
Hay dos implementaciones: FolderStore (un archivo por bloque) y MockBackend
(en memoria, para pruebas). */

use super::fsck_types::FsckError;
use crate::fs::zero_block;

pub trait FsckBackend {
    fn read_block(&self, block: u32) -> Result<Vec<u8>, FsckError>;
    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<(), FsckError>;

    /// Devuelve el bloque al estado libre (relleno completo de ceros).
    fn zero_block(&mut self, block: u32) -> Result<(), FsckError> {
        self.write_block(block, &zero_block())
    }
}
