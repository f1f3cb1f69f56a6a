use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;

/// Read a binary file using memory mapping for improved performance
/// This is more efficient for large files as it doesn't load the entire file into RAM
pub fn read_binary_file_mmap(path: impl AsRef<Path>) -> io::Result<Mmap> {
    let file = File::open(path)?;
    // Safety: the map is read-only and the file is not modified while it is alive
    unsafe { Mmap::map(&file) }
}

/// The complete contents of a file, never mutated after creation
#[derive(Debug)]
pub enum RawBuffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl RawBuffer {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        read_binary_file_mmap(path).map(RawBuffer::Mapped)
    }
}

impl From<Vec<u8>> for RawBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        RawBuffer::Owned(bytes)
    }
}

impl Deref for RawBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            RawBuffer::Mapped(map) => map,
            RawBuffer::Owned(bytes) => bytes,
        }
    }
}
