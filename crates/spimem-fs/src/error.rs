//! Filesystem errors

use core::fmt;

/// Errors reported by [`SimpleFs`](crate::SimpleFs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Device error from the driver or the bus
    Device(spimem_core::Error),
    /// Device is too small to hold the directory and any data
    Unmountable,
    /// No free record left in the directory log
    DirectoryFull,
    /// Write would run past the end of the device
    NoSpace,
    /// No live file with that name
    NotFound,
    /// A live file with that name exists
    AlreadyExists,
    /// Name is empty or longer than 16 bytes
    InvalidName,
    /// The file table has no room for another name
    TooManyFiles,
    /// Payload does not fit in the file's slot
    SlotTooSmall,
    /// File is not aligned to erase units at both ends
    SlotUnsafe,
    /// Initial data is larger than the requested reservation
    InitTooLarge,
    /// Directory bytes at the target are already programmed
    DirectoryNotErased,
    /// File is larger than a record can describe
    FileTooLarge,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "device error: {}", e),
            Self::Unmountable => write!(f, "device too small for a filesystem"),
            Self::DirectoryFull => write!(f, "directory is full"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::NotFound => write!(f, "file not found"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::InvalidName => write!(f, "invalid file name"),
            Self::TooManyFiles => write!(f, "too many files"),
            Self::SlotTooSmall => write!(f, "data does not fit in the slot"),
            Self::SlotUnsafe => write!(f, "file is not an erase-aligned slot"),
            Self::InitTooLarge => write!(f, "initial data exceeds the reservation"),
            Self::DirectoryNotErased => {
                write!(f, "refusing to overwrite programmed directory bytes")
            }
            Self::FileTooLarge => write!(f, "file too large"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<spimem_core::Error> for FsError {
    fn from(e: spimem_core::Error) -> Self {
        Self::Device(e)
    }
}

/// Result type alias for filesystem operations
pub type Result<T> = core::result::Result<T, FsError>;
