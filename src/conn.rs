//! # Reader Loop
//!
//! Purpose: Drain the read half of the connection and hand each received
//! chunk to the dispatcher as one response unit.
//!
//! ## Design Principles
//! 1. **One Read = One Response**: The peer writes exactly one reply per
//!    request and the transport delivers it in a single read. This is a
//!    protocol constraint of the store, not something the client verifies.
//! 2. **No Garbage Forwarding**: EOF or a read error terminates the loop;
//!    it never publishes a unit after a failed read.
//! 3. **Closed Queue = Closed Connection**: Dropping the sender is the
//!    loop's only shutdown signal; every pending and future `recv` resolves.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Capacity of the intermediate read buffer, in bytes.
pub(crate) const READ_BUF_SIZE: usize = 1024;

/// Depth of the response queue.
///
/// Producing into a full queue blocks the reader task. That is safe only
/// because the dispatcher never lets a second request go out before the
/// first response is consumed; without that invariant a full queue would
/// blur response boundaries across overlapping calls.
pub(crate) const RESPONSE_QUEUE_DEPTH: usize = 10;

/// Spawns the reader task for the given read half.
///
/// The task runs until the peer closes the connection, a read fails, or
/// the receiver is dropped. On exit the sender is dropped, closing the
/// queue so that dispatcher waits resolve instead of hanging.
pub(crate) fn spawn_reader<R>(mut read_half: R) -> (mpsc::Receiver<String>, JoinHandle<()>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(RESPONSE_QUEUE_DEPTH);

    let handle = tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
        loop {
            buf.clear();
            match read_half.read_buf(&mut buf).await {
                Ok(0) => {
                    debug!("peer closed connection, reader exiting");
                    break;
                }
                Ok(n) => {
                    let unit = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(unit).await.is_err() {
                        // Client handle dropped; nobody is waiting.
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "read failed, marking connection broken");
                    break;
                }
            }
        }
    });

    (rx, handle)
}
