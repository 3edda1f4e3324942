// crates/engine/src/adapters/stream.rs

use std::io::{Read, Seek, SeekFrom, Write};

use crate::domain::error::EngineResult;

/// Virtual I/O surface the engine reads and writes content through.
///
/// A blanket implementation covers any seekable std stream; applications
/// with exotic storage implement the trait directly.
pub trait ContentStream: Send {
  fn read(&mut self, buf: &mut [u8]) -> EngineResult<usize>;
  fn write(&mut self, buf: &[u8]) -> EngineResult<usize>;
  fn flush(&mut self) -> EngineResult<()>;
  fn seek_to(&mut self, pos: u64) -> EngineResult<u64>;
  fn position(&mut self) -> EngineResult<u64>;
  fn size(&mut self) -> EngineResult<u64>;

  fn write_all(&mut self, mut buf: &[u8]) -> EngineResult<()> {
    while !buf.is_empty() {
      let n = self.write(buf)?;
      if n == 0 {
        return Err(crate::domain::error::EngineError::Io(std::io::Error::new(
          std::io::ErrorKind::WriteZero,
          "stream refused further bytes",
        )));
      }
      buf = &buf[n..];
    }
    Ok(())
  }

  /// Read until `buf` is full or the stream ends; returns bytes read.
  fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
      let n = self.read(&mut buf[filled..])?;
      if n == 0 {
        break;
      }
      filled += n;
    }
    Ok(filled)
  }
}

impl<T: Read + Write + Seek + Send> ContentStream for T {
  fn read(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
    Ok(Read::read(self, buf)?)
  }

  fn write(&mut self, buf: &[u8]) -> EngineResult<usize> {
    Ok(Write::write(self, buf)?)
  }

  fn flush(&mut self) -> EngineResult<()> {
    Ok(Write::flush(self)?)
  }

  fn seek_to(&mut self, pos: u64) -> EngineResult<u64> {
    Ok(Seek::seek(self, SeekFrom::Start(pos))?)
  }

  fn position(&mut self) -> EngineResult<u64> {
    Ok(Seek::stream_position(self)?)
  }

  fn size(&mut self) -> EngineResult<u64> {
    let pos = Seek::stream_position(self)?;
    let end = Seek::seek(self, SeekFrom::End(0))?;
    Seek::seek(self, SeekFrom::Start(pos))?;
    Ok(end)
  }
}
