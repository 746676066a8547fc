//! Byte destinations for the container writer.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;

/// A byte destination which supports writing at a movable cursor.
///
/// The container writer streams chunks sequentially, then seeks back once to patch the file length in the header.
pub trait SeekableSink {
    /// Write all of `data` at the current position, advancing it.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Move the write cursor to `position`, an absolute offset from the start of the sink.
    fn seek(&mut self, position: u64) -> io::Result<()>;

    /// The current position of the write cursor.
    fn position(&self) -> u64;

    /// Flush and release the sink. Calling `close` more than once has no further effect.
    fn close(&mut self) -> io::Result<()>;
}

/// A [`SeekableSink`] writing to a file, with buffering.
///
/// The file is flushed and closed by [`close`](SeekableSink::close), or when the sink is dropped.
#[derive(Debug)]
pub struct FileSink {
    writer: Option<BufWriter<File>>,
    position: u64,
}

/// A [`SeekableSink`] writing to a growable in-memory buffer.
///
/// Seeking past the end of the buffer and then writing fills the gap with zeros.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    buf: Vec<u8>,
    position: usize,
    closed: bool,
}

const BUF_WRITER_LEN: usize = 64 * 1024;

//
// SeekableSink impls
//

impl<S: SeekableSink + ?Sized> SeekableSink for &mut S {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        (**self).seek(position)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: SeekableSink + ?Sized> SeekableSink for Box<S> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        (**self).seek(position)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

//
// FileSink impls
//

impl FileSink {
    /// Create or truncate the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_file(File::create(path)?)
    }

    /// Write to an already open `file`, starting at its current position.
    pub fn from_file(mut file: File) -> io::Result<Self> {
        let position = file.stream_position()?;
        Ok(Self { writer: Some(BufWriter::with_capacity(BUF_WRITER_LEN, file)), position })
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed"))
    }
}

impl SeekableSink for FileSink {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = self.writer()?.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("error closing file sink: {err}");
        }
    }
}

//
// MemorySink impls
//

impl MemorySink {
    /// Construct an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Copy out the bytes written so far.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    /// Consume the sink, returning the bytes written.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }

    /// Whether [`close`](SeekableSink::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SeekableSink for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed"));
        }
        let end = self
            .position
            .checked_add(data.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write past the end of addressable memory"))?;
        if end > self.buf.len() {
            self.buf
                .try_reserve(end - self.buf.len())
                .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
            self.buf.resize(end, 0);
        }
        self.buf[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(())
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = usize::try_from(position).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Read;

    use super::*;

    #[test]
    fn memory_overwrite() {
        let mut sink = MemorySink::new();
        sink.write(b"abcdef").unwrap();
        sink.seek(2).unwrap();
        sink.write(b"XY").unwrap();
        assert_eq!(sink.position(), 4);
        assert_eq!(sink.as_slice(), b"abXYef");
    }

    #[test]
    fn memory_seek_past_end() {
        let mut sink = MemorySink::new();
        sink.seek(3).unwrap();
        sink.write(b"a").unwrap();
        assert_eq!(sink.into_bytes(), &b"\0\0\0a"[..]);
    }

    #[test]
    fn memory_write_past_addressable_end() {
        let mut sink = MemorySink::new();
        sink.write(b"ab").unwrap();
        sink.seek(u64::MAX).unwrap();
        let err = sink.write(b"a").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(sink.as_slice(), b"ab");

        sink.seek(isize::MAX as u64).unwrap();
        assert_eq!(sink.write(b"a").unwrap_err().kind(), io::ErrorKind::OutOfMemory);
        assert_eq!(sink.as_slice(), b"ab");
    }

    #[test]
    fn memory_closed() {
        let mut sink = MemorySink::new();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert_eq!(sink.write(b"a").unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn file_patch_and_close() {
        let path = std::env::temp_dir().join(format!("webpmux-sink-{}.bin", std::process::id()));
        let mut sink = FileSink::create(&path).unwrap();
        sink.write(b"0000tail").unwrap();
        sink.seek(0).unwrap();
        sink.write(b"head").unwrap();
        assert_eq!(sink.position(), 4);
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.write(b"more").is_err());

        let mut contents = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut contents).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(contents, b"headtail");
    }
}
