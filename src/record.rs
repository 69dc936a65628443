// src/record.rs
//! Códec de los registros de texto que viven en cada bloque.
//!
//! Un registro tiene la forma `{label:valor, label:valor ...}` seguida de relleno
//! opcional. `FieldList` guarda cada campo con sus separadores originales, de modo que
//! al serializar los campos que no se tocaron salen byte a byte como se leyeron.

use thiserror::Error;

use crate::dir::DirError;
use crate::fs::MAX_BLOCKS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("el contenido no es texto")]
    NotText,
    #[error("el registro no empieza con '{{'")]
    MissingOpenBrace,
    #[error("el registro no está cerrado")]
    Unterminated,
    #[error("campo mal formado en la posición {0}")]
    MalformedField(usize),
    #[error("falta el campo '{0}'")]
    MissingField(&'static str),
    #[error("el campo '{field}' tiene un valor inválido: {value:?}")]
    BadValue { field: &'static str, value: String },
    #[error(transparent)]
    Dir(#[from] DirError),
}

// -----------------------------------------------------------------------------
// Tokenizador genérico
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    lead: String,
    label: String,
    sep: String,
    value: String,
}

/// Lista de campos de un registro, con todo el texto que los rodea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList {
    head: String,
    fields: Vec<Field>,
    trail: String,
    tail: String,
}

fn is_sep(b: u8) -> bool {
    b == b',' || b.is_ascii_whitespace()
}

impl FieldList {
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let open = text.find('{').ok_or(RecordError::MissingOpenBrace)?;
        if !text[..open].trim().is_empty() {
            return Err(RecordError::MissingOpenBrace);
        }

        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut pos = open + 1;
        let mut fields = Vec::new();

        // Solo se corta en bytes ASCII, así que todos los índices son límites de char.
        loop {
            let lead_start = pos;
            while pos < len && is_sep(bytes[pos]) {
                pos += 1;
            }
            if pos >= len {
                return Err(RecordError::Unterminated);
            }
            if bytes[pos] == b'}' {
                return Ok(Self {
                    head: text[..=open].to_string(),
                    fields,
                    trail: text[lead_start..pos].to_string(),
                    tail: text[pos..].to_string(),
                });
            }

            let label_start = pos;
            while pos < len
                && bytes[pos] != b':'
                && bytes[pos] != b'{'
                && bytes[pos] != b'}'
                && !is_sep(bytes[pos])
            {
                pos += 1;
            }
            if pos >= len || bytes[pos] != b':' || pos == label_start {
                return Err(RecordError::MalformedField(label_start));
            }

            let sep_start = pos;
            pos += 1;
            while pos < len && bytes[pos] == b' ' {
                pos += 1;
            }

            let value_start = pos;
            if pos < len && bytes[pos] == b'{' {
                let mut depth = 0usize;
                loop {
                    if pos >= len {
                        return Err(RecordError::Unterminated);
                    }
                    match bytes[pos] {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                pos += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    pos += 1;
                }
            } else {
                while pos < len && bytes[pos] != b'}' && !is_sep(bytes[pos]) {
                    pos += 1;
                }
            }

            fields.push(Field {
                lead: text[lead_start..label_start].to_string(),
                label: text[label_start..sep_start].to_string(),
                sep: text[sep_start..value_start].to_string(),
                value: text[value_start..pos].to_string(),
            });
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }

    pub fn int(&self, label: &'static str) -> Result<i64, RecordError> {
        let value = self.get(label).ok_or(RecordError::MissingField(label))?;
        value.parse::<i64>().map_err(|_| RecordError::BadValue {
            field: label,
            value: value.to_string(),
        })
    }

    /// Reemplaza el valor de un campo existente. Los demás campos no se tocan.
    pub fn set(&mut self, label: &str, value: String) {
        if let Some(f) = self.fields.iter_mut().find(|f| f.label == label) {
            f.value = value;
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.head.clone();
        for f in &self.fields {
            out.push_str(&f.lead);
            out.push_str(&f.label);
            out.push_str(&f.sep);
            out.push_str(&f.value);
        }
        out.push_str(&self.trail);
        out.push_str(&self.tail);
        out
    }
}

pub fn block_text(raw: &[u8]) -> Result<&str, RecordError> {
    std::str::from_utf8(raw).map_err(|_| RecordError::NotText)
}

// -----------------------------------------------------------------------------
// Marcas de tiempo compartidas por directorios y archivos
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Atime,
    Ctime,
    Mtime,
}

impl Timestamp {
    pub const ALL: [Timestamp; 3] = [Timestamp::Atime, Timestamp::Ctime, Timestamp::Mtime];

    pub fn label(self) -> &'static str {
        match self {
            Timestamp::Atime => "atime",
            Timestamp::Ctime => "ctime",
            Timestamp::Mtime => "mtime",
        }
    }
}

pub trait Timestamped {
    fn time(&self, which: Timestamp) -> i64;
    fn set_time(&mut self, which: Timestamp, value: i64);
}

// -----------------------------------------------------------------------------
// Superblock
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Superblock {
    fields: FieldList,
    creation_time: i64,
    dev_id: i64,
}

impl Superblock {
    pub const CREATION_TIME: &'static str = "creationTime";
    pub const DEV_ID: &'static str = "devId";

    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let fields = FieldList::parse(text)?;
        let creation_time = fields.int(Self::CREATION_TIME)?;
        let dev_id = fields.int(Self::DEV_ID)?;
        Ok(Self {
            fields,
            creation_time,
            dev_id,
        })
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn dev_id(&self) -> i64 {
        self.dev_id
    }

    pub fn set_creation_time(&mut self, value: i64) {
        self.creation_time = value;
        self.fields.set(Self::CREATION_TIME, value.to_string());
    }

    pub fn render(&self) -> String {
        self.fields.render()
    }
}

// -----------------------------------------------------------------------------
// Descriptor de archivo
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileRecord {
    fields: FieldList,
    size: i64,
    linkcount: i64,
    times: [i64; 3],
    indirect: bool,
    location: u32,
}

impl FileRecord {
    const SIZE: &'static str = "size";
    const LINKCOUNT: &'static str = "linkcount";
    const INDIRECT: &'static str = "indirect";
    const LOCATION: &'static str = "location";

    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let fields = FieldList::parse(text)?;

        let size = fields.int(Self::SIZE)?;
        let linkcount = fields.int(Self::LINKCOUNT)?;
        let times = [
            fields.int("atime")?,
            fields.int("ctime")?,
            fields.int("mtime")?,
        ];

        let indirect = match fields.int(Self::INDIRECT)? {
            0 => false,
            1 => true,
            other => {
                return Err(RecordError::BadValue {
                    field: Self::INDIRECT,
                    value: other.to_string(),
                })
            }
        };

        let raw_location = fields.int(Self::LOCATION)?;
        let location = u32::try_from(raw_location).map_err(|_| RecordError::BadValue {
            field: Self::LOCATION,
            value: raw_location.to_string(),
        })?;

        Ok(Self {
            fields,
            size,
            linkcount,
            times,
            indirect,
            location,
        })
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn linkcount(&self) -> i64 {
        self.linkcount
    }

    pub fn indirect(&self) -> bool {
        self.indirect
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn set_size(&mut self, size: i64) {
        self.size = size;
        self.fields.set(Self::SIZE, size.to_string());
    }

    pub fn set_indirect(&mut self, indirect: bool) {
        self.indirect = indirect;
        self.fields
            .set(Self::INDIRECT, if indirect { "1" } else { "0" }.to_string());
    }

    pub fn set_location(&mut self, location: u32) {
        self.location = location;
        self.fields.set(Self::LOCATION, location.to_string());
    }

    pub fn render(&self) -> String {
        self.fields.render()
    }
}

impl Timestamped for FileRecord {
    fn time(&self, which: Timestamp) -> i64 {
        self.times[which as usize]
    }

    fn set_time(&mut self, which: Timestamp, value: i64) {
        self.times[which as usize] = value;
        self.fields.set(which.label(), value.to_string());
    }
}

// -----------------------------------------------------------------------------
// Descriptor de cadena (bloque apuntado por `location`)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainDescriptor {
    /// Un único número sin comas: nombra el bloque de datos.
    Single(u32),
    /// Lista de bloques de datos; el último tiene el final del archivo.
    List(Vec<u32>),
    /// Datos crudos o contenido que no se puede interpretar.
    Undetermined,
}

fn parse_address(token: &str) -> Option<u32> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = token.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    let addr = digits.parse::<u32>().ok()?;
    (addr < MAX_BLOCKS).then_some(addr)
}

impl ChainDescriptor {
    pub fn parse(raw: &[u8]) -> Self {
        let Ok(text) = block_text(raw) else {
            return Self::Undetermined;
        };
        let text = text.trim();
        if text.is_empty() {
            return Self::Undetermined;
        }

        if !text.contains(',') {
            return parse_address(text).map_or(Self::Undetermined, Self::Single);
        }

        let body = text.strip_suffix(',').unwrap_or(text);
        let addrs: Option<Vec<u32>> = body.split(',').map(parse_address).collect();
        // El driver nunca deja un índice con menos de dos bloques.
        match addrs {
            Some(addrs) if addrs.len() >= 2 => Self::List(addrs),
            _ => Self::Undetermined,
        }
    }

    /// Bloques ocupados según el descriptor; 0 significa "cabe en un bloque".
    pub fn occupied(&self) -> usize {
        match self {
            Self::List(addrs) => addrs.len(),
            _ => 0,
        }
    }

    pub fn last(&self) -> Option<u32> {
        match self {
            Self::Single(addr) => Some(*addr),
            Self::List(addrs) => addrs.last().copied(),
            Self::Undetermined => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Segmentos de la lista libre
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentToken {
    Address(u32),
    Garbage(String),
}

/// Separa un segmento de la lista libre en direcciones. Un token formado solo por
/// ceros es relleno y se descarta.
pub fn parse_free_segment(raw: &[u8]) -> Vec<SegmentToken> {
    let text = String::from_utf8_lossy(raw);
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(|t| {
            if t.bytes().all(|b| b == b'0') {
                return None;
            }
            Some(match parse_address(t) {
                Some(addr) => SegmentToken::Address(addr),
                None => SegmentToken::Garbage(t.to_string()),
            })
        })
        .collect()
}

pub fn render_free_segment(addrs: &[u32]) -> String {
    addrs
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "{size:10, uid:1, gid:1, mode:33261, linkcount:1, atime:100, ctime:100, mtime:100, indirect:0 location:30}";

    #[test]
    fn field_list_renders_untouched_text_verbatim() {
        let text = "{creationTime:  5,mounted:50 , devId:20}0000";
        let fields = FieldList::parse(text).unwrap();
        assert_eq!(fields.render(), text);
        assert_eq!(fields.int("devId").unwrap(), 20);
        assert_eq!(fields.get("mounted"), Some("50"));
    }

    #[test]
    fn nested_dictionary_is_one_value() {
        let text = "{linkcount:3, filename_to_inode_dict: {d:.:26, d:..:26, f:a:27}}";
        let fields = FieldList::parse(text).unwrap();
        assert_eq!(
            fields.get("filename_to_inode_dict"),
            Some("{d:.:26, d:..:26, f:a:27}")
        );
        assert_eq!(fields.render(), text);
    }

    #[test]
    fn unterminated_and_garbage_records_fail() {
        assert_eq!(
            FieldList::parse("{size:1, uid:2").unwrap_err(),
            RecordError::Unterminated
        );
        assert_eq!(
            FieldList::parse("hola mundo").unwrap_err(),
            RecordError::MissingOpenBrace
        );
        assert!(matches!(
            FieldList::parse("{size 1}").unwrap_err(),
            RecordError::MalformedField(_)
        ));
    }

    #[test]
    fn file_record_accepts_space_or_comma_before_location() {
        let a = FileRecord::parse(FILE).unwrap();
        assert_eq!(a.location(), 30);
        assert!(!a.indirect());

        let b = FileRecord::parse(
            "{size:10, uid:1, gid:1, mode:1, linkcount:1, atime:1, ctime:1, mtime:1, indirect:1, location:31}",
        )
        .unwrap();
        assert_eq!(b.location(), 31);
        assert!(b.indirect());
    }

    #[test]
    fn file_record_setters_only_touch_their_field() {
        let mut rec = FileRecord::parse(FILE).unwrap();
        rec.set_indirect(true);
        rec.set_size(8200);
        rec.set_time(Timestamp::Mtime, 50);
        assert_eq!(
            rec.render(),
            "{size:8200, uid:1, gid:1, mode:33261, linkcount:1, atime:100, ctime:100, mtime:50, indirect:1 location:30}"
        );
    }

    #[test]
    fn file_record_rejects_bad_indirect() {
        let err = FileRecord::parse(&FILE.replace("indirect:0", "indirect:7")).unwrap_err();
        assert!(matches!(err, RecordError::BadValue { field: "indirect", .. }));
    }

    #[test]
    fn superblock_rewrites_only_creation_time() {
        let text = "{creationTime:9999999999, mounted:50, devId:20, freeStart:1, freeEnd:25, root:26, maxBlocks:10000}";
        let mut sb = Superblock::parse(text).unwrap();
        assert_eq!(sb.dev_id(), 20);
        sb.set_creation_time(1000);
        assert_eq!(sb.render(), text.replace("9999999999", "1000"));
    }

    #[test]
    fn chain_descriptor_shapes() {
        assert_eq!(ChainDescriptor::parse(b"42"), ChainDescriptor::Single(42));
        assert_eq!(
            ChainDescriptor::parse(b"30, 31, 32,"),
            ChainDescriptor::List(vec![30, 31, 32])
        );
        assert_eq!(
            ChainDescriptor::parse(b"30,31"),
            ChainDescriptor::List(vec![30, 31])
        );
        assert_eq!(ChainDescriptor::parse(b"5,"), ChainDescriptor::Undetermined);
        assert_eq!(ChainDescriptor::parse(b"5, "), ChainDescriptor::Undetermined);
        assert_eq!(ChainDescriptor::parse(b"hola, mundo"), ChainDescriptor::Undetermined);
        assert_eq!(ChainDescriptor::parse(b""), ChainDescriptor::Undetermined);
        assert_eq!(
            ChainDescriptor::parse("0".repeat(4096).as_bytes()),
            ChainDescriptor::Undetermined
        );
        assert_eq!(ChainDescriptor::parse(b"30, , 31"), ChainDescriptor::Undetermined);
        assert_eq!(ChainDescriptor::parse(b"123456"), ChainDescriptor::Undetermined);
    }

    #[test]
    fn free_segment_tokens() {
        let tokens = parse_free_segment(b"27, 28, 00, abc, 99999, ");
        assert_eq!(
            tokens,
            vec![
                SegmentToken::Address(27),
                SegmentToken::Address(28),
                SegmentToken::Garbage("abc".into()),
                SegmentToken::Garbage("99999".into()),
            ]
        );
        assert_eq!(render_free_segment(&[27, 28, 30]), "27, 28, 30");
        assert_eq!(render_free_segment(&[]), "");
    }
}
