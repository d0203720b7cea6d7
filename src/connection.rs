use std::io::Cursor;

use crate::frame::Frame;
use crate::{Error, LResult};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Any byte stream a [`Connection`] can run over.
///
/// Implemented for `TcpStream` in production and for mock streams in tests.
pub trait ConnectionStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ConnectionStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Send and receive `Frame` values from a remote peer.
///
/// To read frames, the `Connection` uses an internal buffer, which is filled
/// up until there are enough bytes to create a full frame. Once this happens,
/// the `Connection` creates the frame and returns it to the caller.
///
/// When sending frames, the frame is first encoded into the write buffer.
/// The contents of the write buffer are then written to the socket.
#[derive(Debug)]
pub struct Connection<S> {
    /// The stream wrapped with a `BufWriter` for buffering writes.
    stream: BufWriter<S>,
    /// Buffer used for reading frames.
    buffer: BytesMut,
    /// Scratch buffer frames are encoded into before being written.
    out: BytesMut,
    /// Number of bytes consumed from the stream by decoded frames so far.
    consumed: u64,
}

impl<S: ConnectionStream> Connection<S> {
    pub fn new(socket: S) -> Self {
        Self {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
            out: BytesMut::with_capacity(1024),
            consumed: 0,
        }
    }

    /// Read a single `Frame` from the connection.
    ///
    /// The function waits until it has retrieved enough data to parse a frame.
    /// Any data remaining in the read buffer after the frame has been parsed is
    /// kept there for the next call to `read_frame`.
    ///
    /// # Returns
    ///
    /// On success, the received frame is returned. If the stream is closed
    /// in a way that doesn't break a frame in half, it returns `None`. A
    /// close in the middle of a frame is [`Error::ConnectionClosed`].
    pub async fn read_frame(&mut self) -> LResult<Option<Frame>> {
        loop {
            // Attempt to parse a frame from the buffered data. If enough data
            // has been buffered, the frame is returned.
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // There is not enough buffered data to read a frame. Attempt to
            // read more data from the socket.
            //
            // On success, the number of bytes is returned. `0` indicates "end
            // of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The remote closed the connection. For this to be a clean
                // shutdown, there should be no data in the read buffer. If
                // there is, this means that the peer closed the socket while
                // sending a frame.
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }

    fn parse_frame(&mut self) -> LResult<Option<Frame>> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(_) => {
                // get the byte length of the frame
                let len = buf.position() as usize;
                // reset the cursor in order to call `parse`
                buf.set_position(0);
                let frame = Frame::parse(&mut buf).map_err(|e| e.at_offset(self.consumed))?;
                // discard the frame from the buffer
                self.buffer.advance(len);
                self.consumed += len as u64;

                Ok(Some(frame))
            }
            // not enough data has been buffered
            Err(Error::Incomplete) => Ok(None),
            // an actual error has occurred
            Err(e) => Err(e.at_offset(self.consumed)),
        }
    }

    /// Write a frame to the connection's underlying stream and flush it.
    pub async fn write_frame(&mut self, frame: &Frame) -> LResult<()> {
        self.out.clear();
        frame.encode(&mut self.out);
        self.stream.write_all(&self.out).await?;
        self.stream.flush().await.map_err(Error::from)
    }

    /// Shuts down the write half, telling the peer no more frames follow.
    pub async fn shutdown(&mut self) -> LResult<()> {
        self.stream.shutdown().await.map_err(Error::from)
    }
}
