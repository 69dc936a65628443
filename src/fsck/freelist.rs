/*Reconciliación de la lista libre.
Se arma la tabla 25 x 400 a partir de los bloques 1..=25, se lee físicamente
cada bloque del volumen y se reescriben solo los segmentos que no coinciden
con lo que hay en disco. */

use super::{fsck::Checker, fsck_backend::FsckBackend, fsck_types::*};
use crate::fs::{is_zero_filled, segment_of, FREE_SEGMENTS, FREE_START, SLOTS_PER_SEGMENT};
use crate::record::{parse_free_segment, render_free_segment, SegmentToken};

/// Tabla lógica: `free[segmento][slot]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeTable {
    free: Vec<Vec<bool>>,
}

impl FreeTable {
    pub fn new() -> Self {
        Self {
            free: vec![vec![false; SLOTS_PER_SEGMENT as usize]; FREE_SEGMENTS as usize],
        }
    }

    fn slot(block: u32) -> (usize, usize) {
        (
            segment_of(block) as usize,
            (block % SLOTS_PER_SEGMENT) as usize,
        )
    }

    pub fn is_free(&self, block: u32) -> bool {
        let (seg, slot) = Self::slot(block);
        self.free[seg][slot]
    }

    pub fn set(&mut self, block: u32, free: bool) {
        let (seg, slot) = Self::slot(block);
        self.free[seg][slot] = free;
    }

    /// Direcciones libres de un segmento, en orden ascendente.
    pub fn segment(&self, segment: u32) -> Vec<u32> {
        let first = segment * SLOTS_PER_SEGMENT;
        self.free[segment as usize]
            .iter()
            .enumerate()
            .filter(|&(_, &free)| free)
            .map(|(slot, _)| first + slot as u32)
            .collect()
    }
}

impl Default for FreeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: FsckBackend> Checker<'_, B> {
    /// Lee los 25 segmentos. Devuelve la tabla y qué segmentos ya traen basura.
    fn load_free_table(&mut self) -> Result<(FreeTable, Vec<bool>), FsckError> {
        let mut table = FreeTable::new();
        let mut dirty = vec![false; FREE_SEGMENTS as usize];

        for segment in 0..FREE_SEGMENTS {
            let holder = FREE_START + segment;
            let raw = self.backend.read_block(holder)?;

            for token in parse_free_segment(&raw) {
                match token {
                    SegmentToken::Address(addr) if segment_of(addr) == segment => {
                        table.set(addr, true);
                    }
                    SegmentToken::Address(addr) => {
                        dirty[segment as usize] = true;
                        self.report.record(
                            Phase::FreeList,
                            Some(holder),
                            FindingKind::MisplacedFree,
                            format!("el bloque {addr} no pertenece a este segmento, se elimina"),
                        );
                    }
                    SegmentToken::Garbage(token) => {
                        dirty[segment as usize] = true;
                        self.report.record(
                            Phase::FreeList,
                            Some(holder),
                            FindingKind::MisplacedFree,
                            format!("entrada inválida {token:?} en la lista libre, se elimina"),
                        );
                    }
                }
            }
        }

        Ok((table, dirty))
    }

    pub(crate) fn check_free_list(&mut self) -> Result<FreeTable, FsckError> {
        let (mut table, mut dirty) = self.load_free_table()?;

        for segment in 0..FREE_SEGMENTS {
            let first = segment * SLOTS_PER_SEGMENT;
            for block in first..first + SLOTS_PER_SEGMENT {
                let zero = is_zero_filled(&self.backend.read_block(block)?);
                let listed = table.is_free(block);

                if zero && !listed {
                    table.set(block, true);
                    dirty[segment as usize] = true;
                    self.report.record(
                        Phase::FreeList,
                        Some(block),
                        FindingKind::FalselyTaken,
                        "está vacío pero no figura como libre, se agrega a la lista libre",
                    );
                } else if !zero && listed {
                    table.set(block, false);
                    dirty[segment as usize] = true;
                    self.report.record(
                        Phase::FreeList,
                        Some(block),
                        FindingKind::FalselyFree,
                        "tiene datos pero figura como libre, se elimina de la lista libre",
                    );
                }
            }
        }

        for segment in 0..FREE_SEGMENTS {
            if dirty[segment as usize] {
                let content = render_free_segment(&table.segment(segment));
                self.backend
                    .write_block(FREE_START + segment, content.as_bytes())?;
            }
        }

        if !dirty.contains(&true) {
            self.report.record(
                Phase::FreeList,
                None,
                FindingKind::Correct,
                "La lista libre está correcta.",
            );
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{format_volume, MAX_BLOCKS};
    use crate::fsck::mock::MockBackend;

    const NOW: i64 = 1_700_000_000;

    fn volume() -> MockBackend {
        let mut backend = MockBackend::new();
        format_volume(&mut backend, NOW).unwrap();
        backend.clear_writes();
        backend
    }

    fn reconcile(backend: &mut MockBackend) -> (FsckReport, FreeTable) {
        let mut report = FsckReport::new();
        let table = Checker {
            backend,
            now: NOW,
            report: &mut report,
        }
        .check_free_list()
        .unwrap();
        (report, table)
    }

    #[test]
    fn formatted_volume_agrees_with_disk() {
        let mut backend = volume();
        let (report, table) = reconcile(&mut backend);
        assert!(report.freelist_ok);
        assert!(backend.writes.is_empty());
        assert!(!table.is_free(26));
        assert!(table.is_free(27));
        assert!(table.is_free(MAX_BLOCKS - 1));
    }

    #[test]
    fn zero_block_missing_from_list_is_added() {
        let mut backend = volume();
        // Segmento 2 (bloque 3) cubre 800..1200; se "olvida" el 805.
        let listed: Vec<u32> = (800..1200).filter(|&b| b != 805).collect();
        backend.put(3, render_free_segment(&listed));

        let (report, table) = reconcile(&mut backend);
        assert_eq!(report.of_kind(FindingKind::FalselyTaken).count(), 1);
        assert!(table.is_free(805));
        assert_eq!(backend.writes, vec![3]);
        assert!(backend.text(3).contains("804, 805, 806"));
    }

    #[test]
    fn used_block_listed_as_free_is_removed() {
        let mut backend = volume();
        backend.put(450, "datos");

        let (report, _) = reconcile(&mut backend);
        assert_eq!(report.of_kind(FindingKind::FalselyFree).count(), 1);
        assert_eq!(backend.writes, vec![2]);
        assert!(!backend.text(2).contains("450"));
        assert!(backend.text(2).starts_with("400, 401"));
    }

    #[test]
    fn misplaced_and_garbage_entries_dirty_their_segment() {
        let mut backend = volume();
        let mut first: Vec<u32> = (27..400).collect();
        first.push(5000);
        backend.put(1, format!("{}, basura", render_free_segment(&first)));

        let (report, table) = reconcile(&mut backend);
        assert_eq!(report.of_kind(FindingKind::MisplacedFree).count(), 2);
        assert!(table.is_free(5000));
        assert_eq!(backend.writes, vec![1]);
        assert_eq!(
            backend.text(1),
            render_free_segment(&(27..400).collect::<Vec<_>>())
        );
    }

    #[test]
    fn empty_segment_serializes_empty() {
        let mut backend = volume();
        for block in 9_600..10_000 {
            backend.put(block, "ocupado");
        }

        let (report, _) = reconcile(&mut backend);
        assert_eq!(report.of_kind(FindingKind::FalselyFree).count(), 400);
        assert_eq!(backend.text(25), "");
    }
}
