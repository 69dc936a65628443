// src/dir.rs
use thiserror::Error;

use crate::record::{FieldList, RecordError, Timestamp, Timestamped};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirError {
    #[error("entrada de directorio mal formada: {0:?}")]
    MalformedEntry(String),
    #[error("tipo de entrada desconocido: {0:?}")]
    UnknownKind(String),
    #[error("bloque inválido en la entrada {0:?}")]
    BadBlock(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn code(self) -> char {
        match self {
            EntryKind::File => 'f',
            EntryKind::Directory => 'd',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub name: String,
    pub block: u32,
}

impl DirEntry {
    pub fn dir(name: &str, block: u32) -> Self {
        Self {
            kind: EntryKind::Directory,
            name: name.to_string(),
            block,
        }
    }

    pub fn is_dot(&self) -> bool {
        self.name == "."
    }

    pub fn is_dotdot(&self) -> bool {
        self.name == ".."
    }

    /// Formato `tipo:nombre:bloque`. El nombre puede contener ':'.
    pub fn parse(token: &str) -> Result<Self, DirError> {
        let token = token.trim();
        let (kind, rest) = token
            .split_once(':')
            .ok_or_else(|| DirError::MalformedEntry(token.to_string()))?;
        let (name, block) = rest
            .rsplit_once(':')
            .ok_or_else(|| DirError::MalformedEntry(token.to_string()))?;

        let kind = match kind {
            "f" => EntryKind::File,
            "d" => EntryKind::Directory,
            other => return Err(DirError::UnknownKind(other.to_string())),
        };
        if name.is_empty() {
            return Err(DirError::MalformedEntry(token.to_string()));
        }
        let block = block
            .parse::<u32>()
            .map_err(|_| DirError::BadBlock(token.to_string()))?;

        Ok(Self {
            kind,
            name: name.to_string(),
            block,
        })
    }

    pub fn render(&self) -> String {
        format!("{}:{}:{}", self.kind.code(), self.name, self.block)
    }
}

pub fn parse_entries(dict: &str) -> Result<Vec<DirEntry>, DirError> {
    let inner = dict
        .strip_prefix('{')
        .and_then(|d| d.strip_suffix('}'))
        .ok_or_else(|| DirError::MalformedEntry(dict.to_string()))?;

    inner
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .map(DirEntry::parse)
        .collect()
}

pub fn render_entries(entries: &[DirEntry]) -> String {
    let body = entries
        .iter()
        .map(DirEntry::render)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

// --------- Registro de directorio ---------

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    fields: FieldList,
    times: [i64; 3],
    linkcount: i64,
    entries: Vec<DirEntry>,
}

impl DirectoryRecord {
    const LINKCOUNT: &'static str = "linkcount";
    const DICT: &'static str = "filename_to_inode_dict";

    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let fields = FieldList::parse(text)?;
        let times = [
            fields.int("atime")?,
            fields.int("ctime")?,
            fields.int("mtime")?,
        ];
        let linkcount = fields.int(Self::LINKCOUNT)?;
        let dict = fields
            .get(Self::DICT)
            .ok_or(RecordError::MissingField(Self::DICT))?;
        let entries = parse_entries(dict)?;

        Ok(Self {
            fields,
            times,
            linkcount,
            entries,
        })
    }

    pub fn linkcount(&self) -> i64 {
        self.linkcount
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn set_linkcount(&mut self, linkcount: i64) {
        self.linkcount = linkcount;
        self.fields.set(Self::LINKCOUNT, linkcount.to_string());
    }

    /// Reemplaza el diccionario completo; solo se llama cuando alguna entrada cambió.
    pub fn set_entries(&mut self, entries: Vec<DirEntry>) {
        self.fields.set(Self::DICT, render_entries(&entries));
        self.entries = entries;
    }

    pub fn render(&self) -> String {
        self.fields.render()
    }
}

impl Timestamped for DirectoryRecord {
    fn time(&self, which: Timestamp) -> i64 {
        self.times[which as usize]
    }

    fn set_time(&mut self, which: Timestamp, value: i64) {
        self.times[which as usize] = value;
        self.fields.set(which.label(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "{size:4096, uid:1, gid:1, mode:16877, atime:100, ctime:100, mtime:100, linkcount:3, filename_to_inode_dict: {d:.:26, d:..:26, f:notas.txt:27}}0000";

    #[test]
    fn parses_entries_in_order() {
        let dir = DirectoryRecord::parse(ROOT).unwrap();
        assert_eq!(dir.linkcount(), 3);
        let names: Vec<_> = dir.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "notas.txt"]);
        assert_eq!(dir.entries()[2].kind, EntryKind::File);
        assert_eq!(dir.entries()[2].block, 27);
    }

    #[test]
    fn entry_names_may_contain_colons() {
        let e = DirEntry::parse(" f:a:b:40").unwrap();
        assert_eq!(e.name, "a:b");
        assert_eq!(e.block, 40);
        assert_eq!(e.render(), "f:a:b:40");
    }

    #[test]
    fn bad_entries_are_rejected() {
        assert_eq!(
            DirEntry::parse("x:foo:3").unwrap_err(),
            DirError::UnknownKind("x".into())
        );
        assert!(matches!(
            DirEntry::parse("d:foo:tres").unwrap_err(),
            DirError::BadBlock(_)
        ));
        assert!(matches!(
            DirEntry::parse("d").unwrap_err(),
            DirError::MalformedEntry(_)
        ));
    }

    #[test]
    fn empty_dictionary_is_valid() {
        assert!(parse_entries("{}").unwrap().is_empty());
        assert_eq!(render_entries(&[]), "{}");
    }

    #[test]
    fn untouched_directory_renders_verbatim() {
        let dir = DirectoryRecord::parse(ROOT).unwrap();
        assert_eq!(dir.render(), ROOT);
    }

    #[test]
    fn set_entries_rewrites_only_the_dictionary() {
        let mut dir = DirectoryRecord::parse(ROOT).unwrap();
        let mut entries = dir.entries().to_vec();
        entries.remove(1);
        dir.set_entries(entries);
        dir.set_linkcount(2);
        assert_eq!(
            dir.render(),
            "{size:4096, uid:1, gid:1, mode:16877, atime:100, ctime:100, mtime:100, linkcount:2, filename_to_inode_dict: {d:.:26, f:notas.txt:27}}0000"
        );
    }
}
