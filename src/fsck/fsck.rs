/*EL ARCHIVO PRINCIPAL DE FSCK. Aquí está la función principal y la validación
del superblock. El recorrido del árbol vive en tree.rs, la validación de archivos
en file.rs y la reconciliación de la lista libre en freelist.rs. */

use tracing::info_span;

use super::{fsck_backend::FsckBackend, fsck_types::*};
use crate::fs::{fit_to_block, DEVICE_ID, SUPERBLOCK};
use crate::record::{block_text, RecordError, Superblock, Timestamp, Timestamped};

/// Estado compartido por los validadores durante una pasada.
pub(crate) struct Checker<'a, B: FsckBackend> {
    pub backend: &'a mut B,
    pub now: i64,
    pub report: &'a mut FsckReport,
}

impl<B: FsckBackend> Checker<'_, B> {
    /// Lee un bloque y lo interpreta con `parse`; junto al registro devuelve el
    /// largo original del bloque. Un registro ilegible queda como hallazgo no
    /// corregible y devuelve None; los errores de E/S sí cortan la pasada.
    pub fn load<T>(
        &mut self,
        phase: Phase,
        block: u32,
        what: &str,
        parse: impl FnOnce(&str) -> Result<T, RecordError>,
    ) -> Result<Option<(T, usize)>, FsckError> {
        let raw = self.backend.read_block(block)?;
        match block_text(&raw).and_then(parse) {
            Ok(record) => Ok(Some((record, raw.len()))),
            Err(err) => {
                self.report.record(
                    phase,
                    Some(block),
                    FindingKind::Unparseable,
                    format!("no se pudo leer {what} ({err}), se deja sin tocar"),
                );
                Ok(None)
            }
        }
    }

    /// Escribe un registro corregido sin cambiar el largo de un bloque relleno.
    pub fn rewrite(&mut self, block: u32, original_len: usize, record: &str) -> Result<(), FsckError> {
        self.backend
            .write_block(block, &fit_to_block(record, original_len))
    }

    /// Corrige atime/ctime/mtime que estén en el futuro. Devuelve true si cambió algo.
    pub fn fix_timestamps<R: Timestamped>(&mut self, block: u32, what: &str, record: &mut R) -> bool {
        let mut changed = false;
        for which in Timestamp::ALL {
            if record.time(which) > self.now {
                record.set_time(which, self.now);
                changed = true;
                let kind = match which {
                    Timestamp::Atime => FindingKind::Atime,
                    Timestamp::Ctime => FindingKind::Ctime,
                    Timestamp::Mtime => FindingKind::Mtime,
                };
                self.report.record(
                    Phase::Tree,
                    Some(block),
                    kind,
                    format!(
                        "{} de {what} está en el futuro, se corrige a ahora ({})",
                        which.label(),
                        self.now
                    ),
                );
            }
        }
        changed
    }

    fn check_superblock(&mut self) -> Result<(), FsckError> {
        let raw = self.backend.read_block(SUPERBLOCK)?;
        let mut sb = block_text(&raw)
            .and_then(Superblock::parse)
            .map_err(|source| FsckError::Record {
                block: SUPERBLOCK,
                source,
            })?;

        // Si no es nuestro dispositivo no se toca nada más.
        if sb.dev_id() != DEVICE_ID {
            return Err(FsckError::WrongDevice { found: sb.dev_id() });
        }

        if sb.creation_time() > self.now {
            sb.set_creation_time(self.now);
            self.rewrite(SUPERBLOCK, raw.len(), &sb.render())?;
            self.report.record(
                Phase::Superblock,
                None,
                FindingKind::CreationTime,
                format!(
                    "creationTime está en el futuro, se corrige a ahora ({})",
                    self.now
                ),
            );
        } else {
            self.report.record(
                Phase::Superblock,
                None,
                FindingKind::Correct,
                "El superblock está correcto.",
            );
        }
        Ok(())
    }
}

/// Una pasada completa: superblock, árbol desde la raíz y lista libre.
///
/// Los hallazgos se van acumulando en `report` incluso si la pasada se corta
/// con un error, para que quien llama pueda mostrar lo que alcanzó a hacer.
pub fn run_fsck<B: FsckBackend>(
    backend: &mut B,
    options: &FsckOptions,
    report: &mut FsckReport,
) -> Result<(), FsckError> {
    let mut checker = Checker {
        backend,
        now: options.now,
        report,
    };

    // --- Paso 1: superblock ---
    {
        let _span = info_span!("superblock").entered();
        checker.check_superblock()?;
    }

    // --- Paso 2: directorios y archivos ---
    {
        let _span = info_span!("tree").entered();
        checker.check_tree()?;
    }

    // --- Paso 3: lista libre ---
    {
        let _span = info_span!("freelist").entered();
        checker.check_free_list()?;
    }

    Ok(())
}
