use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

pub async fn write<S: AsyncWrite + Unpin>(
    stream: &mut S,
    src: impl AsRef<[u8]>,
) -> std::io::Result<()> {
    let src = src.as_ref();
    debug!("write: {:?}", String::from_utf8_lossy(src));
    stream.write_all(src).await
}

pub async fn write_flush<S: AsyncWrite + Unpin>(
    stream: &mut S,
    src: impl AsRef<[u8]>,
) -> std::io::Result<()> {
    write(stream, src).await?;
    stream.flush().await
}

pub enum ReadLineError {
    Io(std::io::Error),
    Eof,
}

impl From<std::io::Error> for ReadLineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Read until LF, stripping the line terminator. An incomplete line stays
/// buffered in the reader until the rest of its bytes arrive.
pub async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> Result<(), ReadLineError> {
    assert!(buf.is_empty(), "buffer must be empty");

    if reader.read_until(b'\n', buf).await? == 0 {
        return Err(ReadLineError::Eof);
    }

    debug!("read: {:?}", String::from_utf8_lossy(buf));

    let rpos = buf
        .iter()
        .rposition(|&c| c != b'\r' && c != b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    buf.truncate(rpos);

    Ok(())
}

/// A socket with a read buffer in front of it.
pub struct Connection<IO: AsyncRead + AsyncWrite + Unpin> {
    stream: BufReader<IO>,
}

impl<IO: AsyncRead + AsyncWrite + Unpin> Connection<IO> {
    pub fn new(stream: IO) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    pub async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), ReadLineError> {
        read_line(&mut self.stream, buf).await
    }

    pub async fn write(&mut self, src: impl AsRef<[u8]>) -> std::io::Result<()> {
        write(&mut self.stream, src).await
    }

    pub async fn write_flush(&mut self, src: impl AsRef<[u8]>) -> std::io::Result<()> {
        write_flush(&mut self.stream, src).await
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.stream.get_mut().shutdown().await
    }
}
