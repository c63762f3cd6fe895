use {
    super::bytesio_errors::{BytesIOError, BytesIOErrorValue},
    bytes::{Bytes, BytesMut},
    std::time::Duration,
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::timeout,
    },
};

/// Read buffer size for one socket read.
const READ_BUFFER_SIZE: usize = 4096;

/// Thin non-blocking wrapper over a TCP stream. Sessions pull raw
/// chunks of bytes from here and feed them to their parsers.
pub struct BytesIO {
    stream: TcpStream,
}

impl BytesIO {
    #[must_use]
    pub const fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn read(&mut self) -> Result<BytesMut, BytesIOError> {
        let mut buffer = [0_u8; READ_BUFFER_SIZE];
        let len = self.stream.read(&mut buffer).await?;
        if len == 0 {
            return Err(BytesIOError {
                value: BytesIOErrorValue::EmptyStream,
            });
        }

        let mut rv = BytesMut::with_capacity(len);
        rv.extend_from_slice(&buffer[..len]);
        Ok(rv)
    }

    pub async fn read_timeout(&mut self, duration: Duration) -> Result<BytesMut, BytesIOError> {
        match timeout(duration, self.read()).await {
            Ok(data) => data,
            Err(elapsed) => Err(BytesIOError {
                value: BytesIOErrorValue::TimeoutError(elapsed),
            }),
        }
    }

    pub async fn write(&mut self, bytes: Bytes) -> Result<(), BytesIOError> {
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), BytesIOError> {
        self.stream.flush().await?;
        Ok(())
    }
}
