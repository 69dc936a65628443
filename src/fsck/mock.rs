/*Backend en memoria. Los bloques que nunca se escribieron se leen como bloques
libres, así las pruebas solo tienen que poner los registros que les importan.
Guarda la lista de escrituras para poder verificar qué tocó el fsck. */

use std::collections::HashMap;

use super::{fsck_backend::FsckBackend, fsck_types::FsckError};
use crate::fs::{zero_block, MAX_BLOCKS};

#[derive(Debug, Default, Clone)]
pub struct MockBackend {
    pub blocks: HashMap<u32, Vec<u8>>,
    pub writes: Vec<u32>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pone contenido sin contarlo como escritura del fsck.
    pub fn put(&mut self, block: u32, content: impl AsRef<[u8]>) {
        self.blocks.insert(block, content.as_ref().to_vec());
    }

    pub fn text(&self, block: u32) -> String {
        match self.blocks.get(&block) {
            Some(data) => String::from_utf8_lossy(data).into_owned(),
            None => String::from_utf8_lossy(&zero_block()).into_owned(),
        }
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl FsckBackend for MockBackend {
    fn read_block(&self, block: u32) -> Result<Vec<u8>, FsckError> {
        if block >= MAX_BLOCKS {
            return Err(FsckError::BlockOutOfRange(block));
        }
        Ok(self.blocks.get(&block).cloned().unwrap_or_else(zero_block))
    }

    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<(), FsckError> {
        if block >= MAX_BLOCKS {
            return Err(FsckError::BlockOutOfRange(block));
        }
        self.writes.push(block);
        // Un bloque libre no ocupa memoria.
        if data == zero_block().as_slice() {
            self.blocks.remove(&block);
        } else {
            self.blocks.insert(block, data.to_vec());
        }
        Ok(())
    }
}
