/*Recorrido del árbol de directorios desde la raíz.
Cada directorio se valida, se reescribe si hizo falta y después se bajan
primero sus archivos y luego sus subdirectorios. La tabla de padres y el
conjunto de visitados viven en TraversalContext, solo durante una pasada. */

use std::collections::{HashMap, HashSet};

use super::{fsck::Checker, fsck_backend::FsckBackend, fsck_types::*};
use crate::dir::{DirEntry, DirectoryRecord, EntryKind};
use crate::fs::{MAX_BLOCKS, ROOT_BLOCK};

#[derive(Debug)]
pub struct TraversalContext {
    parent: HashMap<u32, u32>,
    visited: HashSet<u32>,
}

impl TraversalContext {
    pub fn new(root: u32) -> Self {
        let mut parent = HashMap::new();
        parent.insert(root, root);
        Self {
            parent,
            visited: HashSet::new(),
        }
    }

    pub fn parent_of(&self, block: u32) -> Option<u32> {
        self.parent.get(&block).copied()
    }

    /// True si `target` es `block` o alguno de sus ancestros ya descubiertos.
    fn is_ancestor(&self, target: u32, block: u32) -> bool {
        let mut current = block;
        loop {
            if current == target {
                return true;
            }
            match self.parent_of(current) {
                Some(up) if up != current => current = up,
                _ => return false,
            }
        }
    }

    fn is_reached(&self, block: u32) -> bool {
        self.visited.contains(&block) || self.parent.contains_key(&block)
    }
}

/// Lo que queda por validar debajo de un directorio.
struct Children {
    files: Vec<u32>,
    dirs: Vec<u32>,
}

impl<B: FsckBackend> Checker<'_, B> {
    pub(crate) fn check_tree(&mut self) -> Result<TraversalContext, FsckError> {
        let mut ctx = TraversalContext::new(ROOT_BLOCK);
        self.validate_directory(&mut ctx, ROOT_BLOCK)?;
        Ok(ctx)
    }

    pub(crate) fn validate_directory(
        &mut self,
        ctx: &mut TraversalContext,
        block: u32,
    ) -> Result<(), FsckError> {
        ctx.visited.insert(block);

        let Some((mut dir, original_len)) =
            self.load(Phase::Tree, block, "el directorio", DirectoryRecord::parse)?
        else {
            return Ok(());
        };

        let mut dirty = self.fix_timestamps(block, "este directorio", &mut dir);

        // La raíz siempre tiene padre; el resto lo recibe al ser descubierto.
        let parent = ctx.parent_of(block).unwrap_or(block);
        let (entries, children, entries_changed) = self.check_entries(ctx, block, parent, dir.entries());
        if entries_changed {
            dir.set_entries(entries);
            dirty = true;
        }

        let expected = dir
            .entries()
            .iter()
            .filter(|e| !e.is_dot() && !e.is_dotdot())
            .count() as i64
            + 2;
        if dir.linkcount() != expected {
            dir.set_linkcount(expected);
            dirty = true;
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::LinkCount,
                format!("linkcount de este directorio es incorrecto, se corrige a {expected}"),
            );
        }

        if dirty {
            self.rewrite(block, original_len, &dir.render())?;
        } else {
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::Correct,
                "este directorio está correcto.",
            );
        }

        for file in children.files {
            self.validate_file(file)?;
        }
        for child in children.dirs {
            self.validate_directory(ctx, child)?;
        }
        Ok(())
    }

    /// Revisa `.` y `..`, agrega los que falten y separa los hijos a validar.
    fn check_entries(
        &mut self,
        ctx: &mut TraversalContext,
        block: u32,
        parent: u32,
        original: &[DirEntry],
    ) -> (Vec<DirEntry>, Children, bool) {
        let mut entries = Vec::with_capacity(original.len() + 2);
        let mut children = Children {
            files: Vec::new(),
            dirs: Vec::new(),
        };
        let mut changed = false;
        let mut seen_dot = false;
        let mut seen_dotdot = false;

        for entry in original {
            let mut entry = entry.clone();

            if entry.is_dot() || entry.is_dotdot() {
                let (seen, target, kind) = if entry.is_dot() {
                    (&mut seen_dot, block, FindingKind::DotEntry)
                } else {
                    (&mut seen_dotdot, parent, FindingKind::DotDotEntry)
                };

                if *seen {
                    changed = true;
                    self.report.record(
                        Phase::Tree,
                        Some(block),
                        FindingKind::DuplicateDot,
                        format!("entrada '{}' repetida, se elimina", entry.name),
                    );
                    continue;
                }
                *seen = true;

                if entry.block != target || entry.kind != EntryKind::Directory {
                    entry.block = target;
                    entry.kind = EntryKind::Directory;
                    changed = true;
                    self.report.record(
                        Phase::Tree,
                        Some(block),
                        kind,
                        format!(
                            "el bloque del directorio '{}' es incorrecto, se corrige a {target}",
                            entry.name
                        ),
                    );
                }
                entries.push(entry);
                continue;
            }

            if entry.block >= MAX_BLOCKS {
                self.report.record(
                    Phase::Tree,
                    Some(block),
                    FindingKind::OutOfRange,
                    format!(
                        "la entrada '{}' apunta fuera del volumen ({})",
                        entry.name, entry.block
                    ),
                );
                entries.push(entry);
                continue;
            }

            match entry.kind {
                EntryKind::File => children.files.push(entry.block),
                EntryKind::Directory => {
                    if ctx.is_ancestor(entry.block, block) {
                        self.report.record(
                            Phase::Tree,
                            Some(block),
                            FindingKind::Cycle,
                            format!(
                                "el directorio '{}' ({}) contiene a este directorio, forma un ciclo y no se recorre",
                                entry.name, entry.block
                            ),
                        );
                    } else if ctx.is_reached(entry.block) {
                        self.report.record(
                            Phase::Tree,
                            Some(block),
                            FindingKind::Reentrant,
                            format!(
                                "el directorio '{}' ({}) ya tiene otro padre, no se recorre de nuevo",
                                entry.name, entry.block
                            ),
                        );
                    } else {
                        ctx.parent.insert(entry.block, block);
                        children.dirs.push(entry.block);
                    }
                }
            }
            entries.push(entry);
        }

        // Los que faltan van al principio, en el orden "." y "..".
        let mut makeup = Vec::new();
        if !seen_dot {
            makeup.push(DirEntry::dir(".", block));
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::MissingDot,
                "este directorio no tiene '.', se agrega a filename_to_inode_dict",
            );
        }
        if !seen_dotdot {
            makeup.push(DirEntry::dir("..", parent));
            self.report.record(
                Phase::Tree,
                Some(block),
                FindingKind::MissingDotDot,
                "este directorio no tiene '..', se agrega a filename_to_inode_dict",
            );
        }
        if !makeup.is_empty() {
            changed = true;
            makeup.extend(entries);
            entries = makeup;
        }

        (entries, children, changed)
    }
}
