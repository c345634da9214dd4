//! spimem-fs - Flat filesystem for serial memory
//!
//! The filesystem keeps an append-only directory log at the start of the
//! device and file data after it. Every record names a file, its location
//! and a sequence number; on mount the highest sequence per name wins.
//!
//! Two allocation styles share one erase-aware write primitive:
//!
//! - **append** ([`SimpleFs::write_file`]) always writes at the data head.
//!   A replaced file's old bytes stay on the device until the next format.
//! - **slot** ([`SimpleFs::create_slot`] and [`SimpleFs::write_in_place`])
//!   reserves an erase-unit aligned region once and rewrites it in place.
//!
//! # Example
//!
//! ```ignore
//! use spimem_fs::{SimpleFs, WriteMode};
//!
//! let mut fs = SimpleFs::new(handle);
//! fs.mount(true)?;
//! fs.create_slot("cfg", 4096, &[0xAA; 10])?;
//! fs.write_in_place("cfg", &[0xBB; 20], false)?;
//! let handle = fs.into_inner();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

mod error;
mod fs;
pub mod policy;
pub mod record;

pub use error::{FsError, Result};
pub use fs::{
    FileInfo, FsConfig, FsProgress, NoProgress, SimpleFs, Usage, WriteMode, MAX_FILES, MAX_FILE_SIZE,
};
pub use policy::Layout;
pub use record::{FileName, RecordFlags, MAX_NAME_LEN, RECORD_SIZE};
