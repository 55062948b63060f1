use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::page_size;

/// Handle to an open table file. The catalog uses the handle as the table id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

/// The page store: random access to fixed-size pages of registered files.
/// No caching, no locking; both live above in the buffer manager.
pub struct PagedFileManager {
    /// Map from file handles to open files
    open_files: HashMap<FileHandle, FileEntry>,
    /// Map from file paths to handles (for checking if already open)
    path_to_handle: HashMap<PathBuf, FileHandle>,
    /// Next available file handle
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
}

struct FileEntry {
    file: File,
    path: PathBuf,
}

impl PagedFileManager {
    pub fn new() -> Self {
        Self::with_max_files(128)
    }

    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: HashMap::new(),
            path_to_handle: HashMap::new(),
            next_handle: 0,
            max_open_files,
        }
    }

    /// Create a new, empty file
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        File::create(path)?;
        Ok(())
    }

    /// Open an existing file, returning its handle. Re-opening an already
    /// open file returns the original handle.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        if let Some(&handle) = self.path_to_handle.get(&path) {
            return Ok(handle);
        }

        if self.open_files.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        self.open_files.insert(
            handle,
            FileEntry {
                file,
                path: path.clone(),
            },
        );
        self.path_to_handle.insert(path, handle);

        Ok(handle)
    }

    /// Close a file
    pub fn close_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .remove(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        self.path_to_handle.remove(&entry.path);
        Ok(())
    }

    /// Remove (delete) a file, closing it first if open
    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if let Ok(canonical_path) = path.canonicalize() {
            if let Some(&handle) = self.path_to_handle.get(&canonical_path) {
                self.close_file(handle)?;
            }
        }

        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Read one page into `buffer`. Reading past the end of the file
    /// zero-fills, so a freshly extended page reads back as all zeroes.
    pub fn read_page(
        &mut self,
        handle: FileHandle,
        page_no: usize,
        buffer: &mut [u8],
    ) -> FileResult<()> {
        let page_size = page_size();
        if buffer.len() != page_size {
            return Err(FileError::InvalidPageSize {
                expected: page_size,
                actual: buffer.len(),
            });
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let offset = (page_no * page_size) as u64;
        entry.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < page_size {
            let n = entry.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer[filled..].fill(0);

        Ok(())
    }

    /// Write one page at `page_no * page_size`, extending the file if the
    /// offset is past the current end.
    pub fn write_page(
        &mut self,
        handle: FileHandle,
        page_no: usize,
        buffer: &[u8],
    ) -> FileResult<()> {
        let page_size = page_size();
        if buffer.len() != page_size {
            return Err(FileError::InvalidPageSize {
                expected: page_size,
                actual: buffer.len(),
            });
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let offset = (page_no * page_size) as u64;
        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.write_all(buffer)?;
        // No sync here; commit and flush_all sync explicitly.

        Ok(())
    }

    /// Append one page at the current end of the file, returning its page
    /// number.
    pub fn append_page(&mut self, handle: FileHandle, buffer: &[u8]) -> FileResult<usize> {
        let page_no = self.page_count(handle)?;
        self.write_page(handle, page_no, buffer)?;
        Ok(page_no)
    }

    /// Number of pages currently on disk for this file
    pub fn page_count(&mut self, handle: FileHandle) -> FileResult<usize> {
        let page_size = page_size();
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let file_size = entry.file.metadata()?.len();
        Ok(file_size.div_ceil(page_size as u64) as usize)
    }

    /// Flush one file's OS buffers to disk
    pub fn sync_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        entry.file.sync_data()?;
        Ok(())
    }

    /// Flush every open file's OS buffers to disk
    pub fn sync_all(&mut self) -> FileResult<()> {
        for entry in self.open_files.values_mut() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }
}

impl Default for PagedFileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_create_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        assert!(manager.create_file(&test_file).is_ok());
        assert!(test_file.exists());
    }

    #[test]
    fn test_create_file_already_exists() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let result = manager.create_file(&test_file);
        assert!(matches!(result, Err(FileError::FileAlreadyExists(_))));
    }

    #[test]
    fn test_open_close_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();
        assert!(manager.is_file_open(handle));

        manager.close_file(handle).unwrap();
        assert!(!manager.is_file_open(handle));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("nonexistent.db");
        let mut manager = PagedFileManager::new();

        let result = manager.open_file(&test_file);
        assert!(matches!(result, Err(FileError::FileNotFound(_))));
    }

    #[test]
    fn test_open_same_file_twice() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle1 = manager.open_file(&test_file).unwrap();
        let handle2 = manager.open_file(&test_file).unwrap();

        assert_eq!(handle1, handle2);
        assert_eq!(manager.open_file_count(), 1);
    }

    #[test]
    fn test_read_write_page() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();

        let mut write_buffer = vec![0u8; page_size()];
        write_buffer[0] = 42;
        write_buffer[100] = 99;
        write_buffer[page_size() - 1] = 255;

        manager.write_page(handle, 0, &write_buffer).unwrap();

        let mut read_buffer = vec![0u8; page_size()];
        manager.read_page(handle, 0, &mut read_buffer).unwrap();

        assert_eq!(read_buffer, write_buffer);
    }

    #[test]
    fn test_write_extends_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();

        let buffer = vec![7u8; page_size()];
        manager.write_page(handle, 5, &buffer).unwrap();
        assert_eq!(manager.page_count(handle).unwrap(), 6);

        let mut read_buffer = vec![0u8; page_size()];
        manager.read_page(handle, 5, &mut read_buffer).unwrap();
        assert_eq!(read_buffer, buffer);
    }

    #[test]
    fn test_read_past_eof_zero_fills() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();

        let mut buffer = vec![1u8; page_size()];
        manager.read_page(handle, 100, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_append_page() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();

        let buffer = vec![3u8; page_size()];
        assert_eq!(manager.append_page(handle, &buffer).unwrap(), 0);
        assert_eq!(manager.append_page(handle, &buffer).unwrap(), 1);
        assert_eq!(manager.append_page(handle, &buffer).unwrap(), 2);
        assert_eq!(manager.page_count(handle).unwrap(), 3);
    }

    #[test]
    fn test_page_count() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();

        assert_eq!(manager.page_count(handle).unwrap(), 0);

        let buffer = vec![0u8; page_size()];
        manager.write_page(handle, 0, &buffer).unwrap();
        assert_eq!(manager.page_count(handle).unwrap(), 1);

        manager.write_page(handle, 1, &buffer).unwrap();
        assert_eq!(manager.page_count(handle).unwrap(), 2);
    }

    #[test]
    fn test_remove_open_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();
        assert!(manager.is_file_open(handle));

        manager.remove_file(&test_file).unwrap();
        assert!(!test_file.exists());
        assert!(!manager.is_file_open(handle));
    }

    #[test]
    fn test_invalid_buffer_size() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();

        let mut small_buffer = vec![0u8; page_size() - 1];
        let result = manager.read_page(handle, 0, &mut small_buffer);
        assert!(matches!(result, Err(FileError::InvalidPageSize { .. })));

        let large_buffer = vec![0u8; page_size() + 1];
        let result = manager.write_page(handle, 0, &large_buffer);
        assert!(matches!(result, Err(FileError::InvalidPageSize { .. })));
    }

    #[test]
    fn test_max_open_files() {
        let temp_dir = setup_test_dir();
        let mut manager = PagedFileManager::with_max_files(2);

        let file1 = temp_dir.path().join("test1.db");
        let file2 = temp_dir.path().join("test2.db");
        let file3 = temp_dir.path().join("test3.db");

        manager.create_file(&file1).unwrap();
        manager.create_file(&file2).unwrap();
        manager.create_file(&file3).unwrap();

        manager.open_file(&file1).unwrap();
        manager.open_file(&file2).unwrap();

        let result = manager.open_file(&file3);
        assert!(matches!(result, Err(FileError::TooManyOpenFiles)));
    }
}
