/*Validación de los descriptores de archivo: marcas de tiempo, bandera de
indirección, location y tamaño contra lo que realmente ocupan los datos. */

use tracing::trace;

use super::{fsck::Checker, fsck_backend::FsckBackend, fsck_types::*};
use crate::fs::{BLOCK_SIZE, MAX_BLOCKS};
use crate::record::{ChainDescriptor, FileRecord};

const BLOCK: i64 = BLOCK_SIZE as i64;

impl<B: FsckBackend> Checker<'_, B> {
    /// Bytes que tiene guardados un bloque de datos.
    fn content_len(&self, block: u32) -> Result<i64, FsckError> {
        Ok(self.backend.read_block(block)?.len() as i64)
    }

    pub(crate) fn validate_file(&mut self, block: u32) -> Result<(), FsckError> {
        let Some((mut file, original_len)) =
            self.load(Phase::Tree, block, "el archivo", FileRecord::parse)?
        else {
            return Ok(());
        };

        let mut dirty = self.fix_timestamps(block, "este archivo", &mut file);

        if file.location() >= MAX_BLOCKS {
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::OutOfRange,
                format!("location ({}) está fuera del volumen", file.location()),
            );
            if dirty {
                self.rewrite(block, original_len, &file.render())?;
            }
            return Ok(());
        }

        let chain = ChainDescriptor::parse(&self.backend.read_block(file.location())?);
        let occupied = chain.occupied() as i64;
        trace!(block, location = file.location(), ?chain, "descriptor de datos");

        if occupied == 0 && file.indirect() {
            // Un único número en el bloque de índice: los datos están en otro bloque.
            if let ChainDescriptor::Single(data) = chain {
                if data != file.location() {
                    let index = file.location();
                    self.backend.zero_block(index)?;
                    file.set_location(data);
                    self.report.record(
                        Phase::Tree,
                        Some(block),
                        FindingKind::Location,
                        format!(
                            "location de este archivo es incorrecto, se corrige a {data} y se libera el bloque {index}"
                        ),
                    );
                }
            }
            file.set_indirect(false);
            dirty = true;
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::Indirect,
                "indirect de este archivo es incorrecto, se corrige a 0",
            );
        }

        if occupied > 0 && !file.indirect() {
            file.set_indirect(true);
            dirty = true;
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::Indirect,
                "indirect de este archivo es incorrecto, se corrige a 1",
            );
        }

        let size = file.size();
        let corrected = if occupied == 0 {
            if size > BLOCK || size < 0 {
                Some(self.content_len(file.location())?)
            } else {
                None
            }
        } else if size > BLOCK * occupied || size < BLOCK * (occupied - 1) {
            // Solo el último bloque puede estar incompleto.
            match chain.last() {
                Some(last) => Some(BLOCK * (occupied - 1) + self.content_len(last)?),
                None => None,
            }
        } else {
            None
        };

        if let Some(new_size) = corrected {
            file.set_size(new_size);
            dirty = true;
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::Size,
                format!("size de este archivo es incorrecto, se corrige a {new_size}"),
            );
        }

        if dirty {
            self.rewrite(block, original_len, &file.render())?;
        } else {
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::Correct,
                "este archivo está correcto.",
            );
        }
        Ok(())
    }
}
