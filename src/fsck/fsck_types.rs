/*Tipos del fsck:
FsckOptions (configuración de una pasada)
FsckError (errores que detienen la pasada)
Finding / FsckReport (lo que se encontró y se corrigió) */

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fs::DEVICE_ID;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum FsckError {
    #[error("devId = {found} (esperado {}), no es el sistema de archivos esperado", DEVICE_ID)]
    WrongDevice { found: i64 },
    #[error("bloque {block}: registro inválido: {source}")]
    Record {
        block: u32,
        #[source]
        source: RecordError,
    },
    #[error("bloque {block}: error de E/S")]
    Io {
        block: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("bloque {0} fuera de rango")]
    BlockOutOfRange(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct FsckOptions {
    /// Hora de referencia: ninguna marca de tiempo puede quedar después de esta.
    pub now: i64,
}

impl FsckOptions {
    pub fn at(now: i64) -> Self {
        Self { now }
    }

    pub fn from_clock() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        Self { now }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Superblock,
    Tree,
    FreeList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Corrected,
    Uncorrectable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    Correct,
    CreationTime,
    Atime,
    Ctime,
    Mtime,
    DotEntry,
    DotDotEntry,
    MissingDot,
    MissingDotDot,
    DuplicateDot,
    LinkCount,
    Indirect,
    Location,
    Size,
    FalselyTaken,
    FalselyFree,
    MisplacedFree,
    Unparseable,
    OutOfRange,
    Cycle,
    Reentrant,
}

impl FindingKind {
    pub fn severity(self) -> Severity {
        match self {
            FindingKind::Correct => Severity::Ok,
            FindingKind::Unparseable
            | FindingKind::OutOfRange
            | FindingKind::Cycle
            | FindingKind::Reentrant => Severity::Uncorrectable,
            _ => Severity::Corrected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub phase: Phase,
    pub block: Option<u32>,
    pub kind: FindingKind,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(block) => write!(f, "Bloque {}: {}", block, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug)]
pub struct FsckReport {
    pub superblock_ok: bool,
    pub tree_ok: bool,
    pub freelist_ok: bool,
    pub findings: Vec<Finding>,
}

impl Default for FsckReport {
    fn default() -> Self {
        Self::new()
    }
}

impl FsckReport {
    pub fn new() -> Self {
        Self {
            superblock_ok: true,
            tree_ok: true,
            freelist_ok: true,
            findings: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        phase: Phase,
        block: Option<u32>,
        kind: FindingKind,
        message: impl Into<String>,
    ) {
        let finding = Finding {
            phase,
            block,
            kind,
            message: message.into(),
        };

        match kind.severity() {
            Severity::Ok => debug!(?phase, block, "{finding}"),
            Severity::Corrected => info!(?phase, block, ?kind, "{finding}"),
            Severity::Uncorrectable => warn!(?phase, block, ?kind, "{finding}"),
        }

        if kind.severity() != Severity::Ok {
            match phase {
                Phase::Superblock => self.superblock_ok = false,
                Phase::Tree => self.tree_ok = false,
                Phase::FreeList => self.freelist_ok = false,
            }
        }

        self.findings.push(finding);
    }

    pub fn corrections(&self) -> usize {
        self.count(Severity::Corrected)
    }

    pub fn uncorrectable(&self) -> usize {
        self.count(Severity::Uncorrectable)
    }

    pub fn is_clean(&self) -> bool {
        self.superblock_ok && self.tree_ok && self.freelist_ok
    }

    /// Hallazgos de un tipo dado, en el orden en que aparecieron.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    pub fn in_phase(&self, phase: Phase) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.phase == phase)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.kind.severity() == severity)
            .count()
    }
}
