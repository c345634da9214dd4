//! The filesystem proper

use spimem_core::device::{align_up, MemDevice, ERASED_VALUE};

use crate::error::{FsError, Result};
use crate::policy::{self, Layout, DEFAULT_ALIGNMENT, DEFAULT_DIR_SIZE};
use crate::record::{parse_name, Decoded, FileName, Record, RECORD_SIZE};

/// Most names the file table tracks, deleted ones included
pub const MAX_FILES: usize = 64;

/// Largest file a record can describe
pub const MAX_FILE_SIZE: u32 = 0x00FF_FFFF;

/// Chunk used by [`SimpleFs::wipe`]
const WIPE_CHUNK: u32 = 64 * 1024;

/// What [`SimpleFs::write_file`] does when the name exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write a new copy; the old one becomes unreachable
    #[default]
    ReplaceIfExists,
    /// Refuse with [`FsError::AlreadyExists`]
    FailIfExists,
}

/// Filesystem tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// Minimum directory region size
    pub dir_size: u32,
    /// Slot alignment on devices without an erase unit
    pub alignment: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            dir_size: DEFAULT_DIR_SIZE,
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

/// Public view of one live file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File name
    pub name: FileName,
    /// Start address
    pub addr: u32,
    /// Size in bytes
    pub size: u32,
    /// Bytes available before the next file (or the aligned data head)
    pub capacity: u32,
    /// Start and end of the reserved region are erase-unit aligned
    pub slot_safe: bool,
    /// Sequence number of the authoritative record
    pub seq: u32,
}

impl FileInfo {
    /// Names ending in `/` with no data are listed as folders
    pub fn is_folder(&self) -> bool {
        self.name.ends_with('/') && self.size == 0
    }
}

/// Space accounting for both regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// Bytes of directory log in use
    pub dir_used: u32,
    /// Size of the directory region
    pub dir_size: u32,
    /// Bytes between the data region start and the data head
    pub data_used: u32,
    /// Size of the data region
    pub data_size: u32,
}

impl Usage {
    /// Unused directory bytes
    pub fn dir_free(&self) -> u32 {
        self.dir_size.saturating_sub(self.dir_used)
    }

    /// Unused data bytes
    pub fn data_free(&self) -> u32 {
        self.data_size.saturating_sub(self.data_used)
    }
}

/// Progress callback for [`SimpleFs::wipe_with_progress`]
pub trait FsProgress {
    /// Called once before the first chunk
    fn erasing(&mut self, total_bytes: u64);

    /// Called after each chunk with the running total
    fn erase_progress(&mut self, bytes_erased: u64);

    /// Called when the wipe is done
    fn complete(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl FsProgress for NoProgress {
    fn erasing(&mut self, _total_bytes: u64) {}
    fn erase_progress(&mut self, _bytes_erased: u64) {}
    fn complete(&mut self) {}
}

#[derive(Debug, Clone)]
struct Entry {
    name: FileName,
    addr: u32,
    size: u32,
    seq: u32,
    deleted: bool,
    cap_end: u32,
    slot_safe: bool,
}

impl Entry {
    fn capacity(&self) -> u32 {
        self.cap_end.saturating_sub(self.addr)
    }

    fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            addr: self.addr,
            size: self.size,
            capacity: self.capacity(),
            slot_safe: self.slot_safe,
            seq: self.seq,
        }
    }
}

/// Flat filesystem over one [`MemDevice`]
///
/// The instance owns the device and the directory and data cursors. Call
/// [`mount`](Self::mount) before anything else and
/// [`into_inner`](Self::into_inner) to get the device back.
pub struct SimpleFs<D> {
    dev: D,
    layout: Layout,
    files: heapless::Vec<Entry, MAX_FILES>,
    dir_offset: u32,
    data_head: u32,
    next_seq: u32,
}

impl<D: MemDevice> SimpleFs<D> {
    /// Wrap a device with the default layout
    pub fn new(dev: D) -> Self {
        Self::with_config(dev, FsConfig::default())
    }

    /// Wrap a device with an explicit configuration
    pub fn with_config(dev: D, config: FsConfig) -> Self {
        let layout = Layout::for_device(&dev, config.dir_size, config.alignment);
        Self {
            dev,
            layout,
            files: heapless::Vec::new(),
            dir_offset: 0,
            data_head: layout.data_start(),
            next_seq: 1,
        }
    }

    /// Address map in use
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Borrow the device
    pub fn device(&self) -> &D {
        &self.dev
    }

    /// Give the device back
    pub fn into_inner(self) -> D {
        self.dev
    }

    fn reset_state(&mut self) {
        self.files.clear();
        self.dir_offset = 0;
        self.data_head = self.layout.data_start();
        self.next_seq = 1;
    }

    // ------------------------------------------------------------------
    // Mount / format
    // ------------------------------------------------------------------

    /// Rebuild the file table from the directory log
    ///
    /// With `auto_format`, a log without a single record is formatted.
    pub fn mount(&mut self, auto_format: bool) -> Result<()> {
        let data_start = self.layout.data_start();
        if self.layout.capacity <= data_start {
            return Err(FsError::Unmountable);
        }
        self.reset_state();
        self.dir_offset = self.layout.dir_size;

        let mut max_end = data_start;
        let mut max_seq = 0u32;
        let mut saw_any = false;
        let mut buf = [0u8; RECORD_SIZE];

        for slot in 0..self.layout.dir_slots() {
            let addr = slot * RECORD_SIZE as u32;
            self.dev.read(addr, &mut buf)?;
            let rec = match Record::decode(&buf) {
                Decoded::End => {
                    self.dir_offset = addr;
                    break;
                }
                Decoded::Invalid => {
                    saw_any = true;
                    log::warn!("skipping damaged directory record at 0x{:08X}", addr);
                    continue;
                }
                Decoded::Record(rec) => rec,
            };
            saw_any = true;
            max_seq = max_seq.max(rec.seq);

            if !rec.is_deleted() {
                let end = rec.addr as u64 + rec.size as u64;
                if rec.addr < data_start || end > self.layout.capacity as u64 {
                    log::warn!(
                        "skipping record for '{}' outside the data region (0x{:08X}+{})",
                        rec.name,
                        rec.addr,
                        rec.size
                    );
                    continue;
                }
                max_end = max_end.max(end as u32);
            }
            self.apply_record(rec);
        }

        if !saw_any {
            self.dir_offset = 0;
            if auto_format {
                log::info!("empty directory, formatting");
                self.format()?;
            }
        }

        self.next_seq = max_seq.wrapping_add(1).max(1);
        self.data_head = max_end;
        self.compute_capacities();
        log::info!(
            "mounted {} file(s) on CS {}, data head 0x{:08X}",
            self.file_count(),
            self.dev.chip_select(),
            self.data_head
        );
        Ok(())
    }

    /// Keep the record if it is the newest for its name
    fn apply_record(&mut self, rec: Record) {
        let entry = Entry {
            addr: rec.addr,
            size: rec.size,
            seq: rec.seq,
            deleted: rec.is_deleted(),
            cap_end: 0,
            slot_safe: false,
            name: rec.name,
        };
        match self.find(&entry.name) {
            Some(i) if self.files[i].seq > entry.seq => {}
            Some(i) => self.files[i] = entry,
            None => {
                if self.files.push(entry).is_err() {
                    log::warn!("file table full, ignoring record");
                }
            }
        }
    }

    /// Erase the directory region and forget every file
    pub fn format(&mut self) -> Result<()> {
        policy::fill_erased(&mut self.dev, &self.layout, 0, self.layout.dir_size)?;
        self.reset_state();
        self.compute_capacities();
        log::info!("formatted directory on CS {}", self.dev.chip_select());
        Ok(())
    }

    /// Erase the whole device
    pub fn wipe(&mut self) -> Result<()> {
        self.wipe_with_progress(&mut NoProgress)
    }

    /// Erase the whole device, reporting progress
    pub fn wipe_with_progress(&mut self, progress: &mut impl FsProgress) -> Result<()> {
        let total = self.layout.capacity;
        let chunk = align_up(WIPE_CHUNK, self.layout.unit);
        progress.erasing(total as u64);

        let mut pos = 0u32;
        while pos < total {
            let n = chunk.min(total - pos);
            policy::fill_erased(&mut self.dev, &self.layout, pos, n)?;
            pos += n;
            progress.erase_progress(pos as u64);
        }
        progress.complete();

        self.reset_state();
        self.compute_capacities();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Append a file at the data head
    pub fn write_file(&mut self, name: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        let name = parse_name(name).ok_or(FsError::InvalidName)?;
        if data.len() > MAX_FILE_SIZE as usize {
            return Err(FsError::FileTooLarge);
        }
        self.check_dir_room()?;
        if mode == WriteMode::FailIfExists && self.live_index(&name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        self.check_table_room(&name)?;

        let start = self.append_start(data)?;
        log::debug!("'{}': {} bytes at 0x{:08X}", name, data.len(), start);
        policy::write_with_policy(&mut self.dev, &self.layout, start, data)?;

        let size = data.len() as u32;
        let seq = self.append_record(Record::live(&name, start, size, self.next_seq))?;
        self.upsert(name, start, size, seq);
        self.data_head = start + size;
        self.compute_capacities();
        Ok(())
    }

    /// Pick the start address for an appended file
    ///
    /// On erase-capable devices an unaligned head is only usable if the
    /// write will not erase the unit it shares with earlier data.
    fn append_start(&mut self, data: &[u8]) -> Result<u32> {
        let mut start = self.data_head.max(self.layout.data_start());
        self.check_fits(start, data.len() as u64)?;

        if self.layout.is_erasable() && start % self.layout.unit != 0 && !data.is_empty() {
            let all_erased_value = data.iter().all(|&b| b == ERASED_VALUE);
            if all_erased_value || !policy::is_erased(&mut self.dev, start, data.len())? {
                start = align_up(start, self.layout.unit);
                log::debug!("data head is programmed, aligning up to 0x{:08X}", start);
                self.check_fits(start, data.len() as u64)?;
            }
        }
        Ok(start)
    }

    /// Reserve an aligned region and record `init` at its start
    pub fn create_slot(&mut self, name: &str, reserve: u32, init: &[u8]) -> Result<()> {
        let name = parse_name(name).ok_or(FsError::InvalidName)?;
        self.check_dir_room()?;
        if init.len() > reserve as usize {
            return Err(FsError::InitTooLarge);
        }
        if self.live_index(&name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        self.check_table_room(&name)?;

        let unit = self.layout.unit;
        let cap = align_up(reserve.max(1), unit);
        let start = align_up(self.data_head.max(self.layout.data_start()), unit);
        self.check_fits(start, cap as u64)?;

        log::debug!("slot '{}': {} bytes at 0x{:08X}", name, cap, start);
        policy::fill_erased(&mut self.dev, &self.layout, start, cap)?;
        policy::write_with_policy(&mut self.dev, &self.layout, start, init)?;

        let size = init.len() as u32;
        let seq = self.append_record(Record::live(&name, start, size, self.next_seq))?;
        self.upsert(name, start, size, seq);
        self.data_head = start + cap;
        self.compute_capacities();
        Ok(())
    }

    /// Rewrite a file at its current address
    ///
    /// The file must be slot-safe with room for `data`. Otherwise the call
    /// fails, or with `allow_realloc` falls back to
    /// [`write_file`](Self::write_file) and the file moves.
    pub fn write_in_place(&mut self, name: &str, data: &[u8], allow_realloc: bool) -> Result<()> {
        let name = parse_name(name).ok_or(FsError::InvalidName)?;
        let index = self.live_index(&name).ok_or(FsError::NotFound)?;
        let entry = &self.files[index];
        let (addr, slot_safe) = (entry.addr, entry.slot_safe);
        let fits = entry.capacity() as usize >= data.len();

        if !(slot_safe && fits) {
            if allow_realloc {
                log::debug!("'{}' does not fit its slot, reallocating", name);
                return self.write_file(&name, data, WriteMode::ReplaceIfExists);
            }
            return Err(if slot_safe {
                FsError::SlotTooSmall
            } else {
                FsError::SlotUnsafe
            });
        }
        self.check_dir_room()?;

        policy::write_with_policy(&mut self.dev, &self.layout, addr, data)?;
        let size = data.len() as u32;
        let seq = self.append_record(Record::live(&name, addr, size, self.next_seq))?;
        self.upsert(name, addr, size, seq);
        self.data_head = self.data_head.max(addr + size);
        self.compute_capacities();
        Ok(())
    }

    /// Tombstone a file
    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let name = parse_name(name).ok_or(FsError::InvalidName)?;
        let index = self.live_index(&name).ok_or(FsError::NotFound)?;
        self.check_dir_room()?;

        let seq = self.append_record(Record::tombstone(&name, self.next_seq))?;
        let entry = &mut self.files[index];
        entry.deleted = true;
        entry.addr = 0;
        entry.size = 0;
        entry.seq = seq;
        self.compute_capacities();
        log::debug!("deleted '{}'", name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Read up to `buf.len()` bytes from the start of a file
    pub fn read_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize> {
        self.read_file_range(name, 0, buf)
    }

    /// Read up to `buf.len()` bytes starting `offset` bytes into a file
    ///
    /// Returns 0 at or past the end of the file.
    pub fn read_file_range(&mut self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let entry = self.live(name)?;
        let (addr, size) = (entry.addr, entry.size);
        if offset >= size {
            return Ok(0);
        }
        let n = buf.len().min((size - offset) as usize);
        self.dev.read(addr + offset, &mut buf[..n])?;
        Ok(n)
    }

    /// Size of a live file
    pub fn file_size(&self, name: &str) -> Result<u32> {
        Ok(self.live(name)?.size)
    }

    /// Location, size and slot capacity of a live file
    pub fn file_info(&self, name: &str) -> Result<FileInfo> {
        Ok(self.live(name)?.info())
    }

    /// Returns true if a live file has this name
    pub fn exists(&self, name: &str) -> bool {
        self.live(name).is_ok()
    }

    /// Every live file, in table order
    pub fn list_files(&self) -> impl Iterator<Item = FileInfo> + '_ {
        self.files.iter().filter(|e| !e.deleted).map(Entry::info)
    }

    /// Number of live files
    pub fn file_count(&self) -> usize {
        self.files.iter().filter(|e| !e.deleted).count()
    }

    /// Where the next appended file would start
    pub fn next_data_addr(&self) -> u32 {
        self.data_head
    }

    /// Usable device bytes
    pub fn capacity(&self) -> u32 {
        self.layout.capacity
    }

    /// First byte of the data region
    pub fn data_region_start(&self) -> u32 {
        self.layout.data_start()
    }

    /// Space used in the directory and data regions
    pub fn usage(&self) -> Usage {
        let data_start = self.layout.data_start();
        let data_size = self.layout.capacity.saturating_sub(data_start);
        Usage {
            dir_used: self.dir_offset,
            dir_size: self.layout.dir_size,
            data_used: self.data_head.saturating_sub(data_start).min(data_size),
            data_size,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn find(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|e| e.name == name)
    }

    fn live_index(&self, name: &str) -> Option<usize> {
        self.find(name).filter(|&i| !self.files[i].deleted)
    }

    fn live(&self, name: &str) -> Result<&Entry> {
        self.live_index(name)
            .map(|i| &self.files[i])
            .ok_or(FsError::NotFound)
    }

    fn check_dir_room(&self) -> Result<()> {
        if self.dir_offset as usize + RECORD_SIZE > self.layout.dir_size as usize {
            return Err(FsError::DirectoryFull);
        }
        Ok(())
    }

    fn check_table_room(&self, name: &str) -> Result<()> {
        if self.find(name).is_none() && self.files.is_full() {
            return Err(FsError::TooManyFiles);
        }
        Ok(())
    }

    fn check_fits(&self, start: u32, len: u64) -> Result<()> {
        if start as u64 + len > self.layout.capacity as u64 {
            return Err(FsError::NoSpace);
        }
        Ok(())
    }

    /// Program one record at the directory cursor, returns its sequence
    fn append_record(&mut self, rec: Option<Record>) -> Result<u32> {
        let rec = rec.ok_or(FsError::InvalidName)?;
        self.check_dir_room()?;
        policy::write_with_policy(&mut self.dev, &self.layout, self.dir_offset, &rec.encode())?;
        self.dir_offset += RECORD_SIZE as u32;
        self.next_seq = rec.seq.wrapping_add(1).max(1);
        Ok(rec.seq)
    }

    fn upsert(&mut self, name: FileName, addr: u32, size: u32, seq: u32) {
        let entry = Entry {
            name,
            addr,
            size,
            seq,
            deleted: false,
            cap_end: 0,
            slot_safe: false,
        };
        match self.find(&entry.name) {
            Some(i) => self.files[i] = entry,
            // Room was checked before the record went out
            None => {
                let _ = self.files.push(entry);
            }
        }
    }

    /// Recompute every live file's capacity from the gap to its successor
    fn compute_capacities(&mut self) {
        let mut order: heapless::Vec<usize, MAX_FILES> = (0..self.files.len())
            .filter(|&i| !self.files[i].deleted)
            .collect();
        order.sort_unstable_by_key(|&i| (self.files[i].addr, i));

        let unit = self.layout.unit;
        let tail = align_up(self.data_head, unit);
        for (pos, &i) in order.iter().enumerate() {
            let next = order.get(pos + 1).map_or(tail, |&j| self.files[j].addr);
            let entry = &mut self.files[i];
            entry.cap_end = next;
            entry.slot_safe = entry.addr % unit == 0 && next % unit == 0 && next > entry.addr;
        }
    }
}
