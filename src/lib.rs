mod dir;
mod fs;
pub mod fsck;
pub mod record;

pub use crate::dir::{DirEntry, DirError, DirectoryRecord, EntryKind};
pub use crate::fs::{
    ensure_folder,
    format_volume,
    is_zero_filled,
    root_directory_text,
    superblock_text,
    zero_block,
    FolderStore,
    BLOCK_SIZE,
    DEFAULT_FOLDER,
    DEVICE_ID,
    FREE_END,
    FREE_START,
    MAX_BLOCKS,
    ROOT_BLOCK,
    SLOTS_PER_SEGMENT,
};
pub use crate::fsck::fsck::run_fsck;
pub use crate::fsck::fsck_backend::FsckBackend;
pub use crate::fsck::fsck_types::{
    Finding,
    FindingKind,
    FsckError,
    FsckOptions,
    FsckReport,
    Phase,
    Severity,
};
