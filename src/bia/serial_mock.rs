//! Mock serial port implementation for testing
//!
//! Behaves like an analyzer on the other end of the cable: replies can be
//! scripted per command id and are queued for reading as soon as the host
//! writes a frame carrying that id. Reads with nothing queued stay pending
//! until data arrives or the port is closed.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Default)]
struct Shared {
    /// Data written to the port (outgoing)
    tx: Vec<u8>,
    /// Data to be read from the port (incoming)
    rx: VecDeque<u8>,
    /// Replies keyed by command id, consumed in order
    replies: HashMap<u8, VecDeque<Vec<u8>>>,
    next_read_error: Option<io::Error>,
    next_write_error: Option<io::Error>,
    closed: bool,
    reader: Option<Waker>,
}

impl Shared {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.reader.take() {
            waker.wake();
        }
    }
}

/// Mock serial port that simulates a device
#[derive(Clone, Default)]
pub struct MockSerialPort {
    shared: Arc<Mutex<Shared>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for the next frame written with `command`
    pub fn script_reply(&self, command: u8, reply: Vec<u8>) {
        let mut shared = self.shared.lock().unwrap();
        shared.replies.entry(command).or_default().push_back(reply);
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.shared.lock().unwrap().tx.clone()
    }

    /// Set an error to be returned by the next read
    pub fn set_next_read_error(&self, error: io::Error) {
        let mut shared = self.shared.lock().unwrap();
        shared.next_read_error = Some(error);
        shared.wake_reader();
    }

    /// Set an error to be returned by the next write
    pub fn set_next_write_error(&self, error: io::Error) {
        self.shared.lock().unwrap().next_write_error = Some(error);
    }

    /// Simulates unplugging: pending and later reads return EOF
    pub fn close(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.closed = true;
        shared.wake_reader();
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(error) = shared.next_read_error.take() {
            return Poll::Ready(Err(error));
        }

        let available = shared.rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = shared.rx.drain(..available).collect();
            buf.put_slice(&data);
            return Poll::Ready(Ok(()));
        }

        if shared.closed {
            return Poll::Ready(Ok(()));
        }
        shared.reader = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(error) = shared.next_write_error.take() {
            return Poll::Ready(Err(error));
        }

        shared.tx.extend_from_slice(buf);
        // Frames are written whole, so the command id sits at offset 2.
        if let Some(&command) = buf.get(2) {
            if let Some(reply) = shared.replies.get_mut(&command).and_then(VecDeque::pop_front) {
                shared.rx.extend(reply);
                shared.wake_reader();
            }
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_scripted_reply_follows_write() {
        let mut port = MockSerialPort::new();
        port.script_reply(0xE0, vec![0xAA, 0x05, 0xE0, 0x00, 0x71]);

        port.write_all(&[0x55, 0x05, 0xE0, 0x00, 0xC6]).await.unwrap();
        let mut buf = [0u8; 16];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0x05, 0xE0, 0x00, 0x71]);

        // Script consumed: a second request gets no answer.
        port.write_all(&[0x55, 0x05, 0xE0, 0x00, 0xC6]).await.unwrap();
        port.close();
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_simulated_errors() {
        let mut port = MockSerialPort::new();
        port.set_next_write_error(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        assert!(port.write_all(&[0x55]).await.is_err());
        assert!(port.get_tx_data().is_empty());

        port.set_next_read_error(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        let mut buf = [0u8; 4];
        assert!(port.read(&mut buf).await.is_err());
    }
}
