use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::common::config::{PageId, PAGE_SIZE};

/// DiskManager performs the reading and writing of pages to and from disk,
/// providing a logical file layer within the context of a database
/// management system.
pub struct DiskManager {
    // Protects file access with multiple buffer pool instances.
    db_io: Mutex<File>,
    file_name: String,
    // Number of page writes issued.
    num_writes: AtomicU32,
    // Number of page reads issued.
    num_reads: AtomicU32,
}

impl DiskManager {
    /// Creates a new disk manager that writes to the specified database file.
    pub fn new(db_file: impl AsRef<Path>) -> std::io::Result<DiskManager> {
        let db_file = db_file.as_ref();
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .open(db_file)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(db_file)
            })?;

        Ok(Self {
            db_io: Mutex::new(db_io),
            file_name: db_file.to_string_lossy().to_string(),
            num_writes: AtomicU32::new(0),
            num_reads: AtomicU32::new(0),
        })
    }

    /// Write a page to the database file.
    pub fn write_page(&self, page_id: PageId, page_data: &[u8]) {
        assert_eq!(page_data.len(), PAGE_SIZE);
        self.num_writes.fetch_add(1, Ordering::Relaxed);

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock();
        db_io.seek(SeekFrom::Start(offset)).unwrap();
        if let Err(e) = db_io.write_all(page_data) {
            panic!("I/O error while writing page {}: {:?}", page_id, e);
        }
        // needs to flush to keep disk file in sync
        db_io.flush().unwrap();
    }

    /// Read a page from the database file. Reads past the end of the file
    /// (pages allocated but never written) come back zero-filled.
    pub fn read_page(&self, page_id: PageId, page_data: &mut [u8]) {
        assert_eq!(page_data.len(), PAGE_SIZE);
        self.num_reads.fetch_add(1, Ordering::Relaxed);

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock();
        if offset >= db_io.metadata().unwrap().len() {
            debug!("read of page {} past end of file", page_id);
            page_data.fill(0);
            return;
        }
        db_io.seek(SeekFrom::Start(offset)).unwrap();
        match db_io.read(page_data) {
            Ok(read_count) => {
                if read_count < PAGE_SIZE {
                    debug!("read less than a page ({} bytes)", read_count);
                    page_data[read_count..].fill(0);
                }
            }
            Err(e) => panic!("I/O error while reading page {}: {:?}", page_id, e),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// @return the number of disk writes so far
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// @return the number of disk reads so far
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn read_write_page() {
        let mut buf = [0; PAGE_SIZE];
        let mut data = [0; PAGE_SIZE];

        let dir = TempDir::new("disk_manager_test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();
        let test_str = b"A test string.";
        data[..test_str.len()].copy_from_slice(test_str);

        dm.read_page(0, &mut buf); // tolerate empty read

        dm.write_page(0, &data);
        dm.read_page(0, &mut buf);
        assert_eq!(buf, data);

        buf.fill(0);
        dm.write_page(5, &data);
        dm.read_page(5, &mut buf);
        assert_eq!(buf, data);
        assert_eq!(2, dm.num_writes());
    }

    #[test]
    fn read_hole_between_pages() {
        let dir = TempDir::new("disk_manager_test").unwrap();
        let dm = DiskManager::new(dir.path().join("test.db")).unwrap();

        let data = [7u8; PAGE_SIZE];
        dm.write_page(3, &data);

        // Page 1 was never written; it reads back as zeroes.
        let mut buf = [9u8; PAGE_SIZE];
        dm.read_page(1, &mut buf);
        assert_eq!(buf, [0u8; PAGE_SIZE]);
    }
}
