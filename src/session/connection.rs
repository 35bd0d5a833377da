use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::session::{Session, SessionError};
use crate::sink::RowSink;
use crate::stats::SessionReport;


/// Drives `session` from the bytes arriving on `transport` until the peer closes the connection
///  or the session fails, then closes the session.
///
/// The sink is flushed when the session ends, whatever the reason, so that every record counted
///  for the session is durable. The only exception is a session whose writes the sink rejected.
///
/// The transport is not read any further after a failure; dropping it afterwards terminates the
///  connection.
pub async fn serve_connection<T: AsyncRead + Unpin>(
    transport: &mut T,
    mut session: Session,
    sink: Arc<dyn RowSink>,
    read_buf_size: usize,
) -> SessionReport {
    let mut read_buf = vec![0u8; read_buf_size.max(1)];

    loop {
        match transport.read(&mut read_buf).await {
            Ok(0) => {
                debug!(device_id = ?session.device_id(), "connection closed by peer");
                break;
            }
            Ok(n) => {
                trace!(n, "received bytes");
                if session.on_bytes(&read_buf[..n], sink.as_ref()).await.is_err() {
                    // the session logged and recorded the error
                    break;
                }
            }
            Err(e) => {
                session.fail(SessionError::Transport(e));
                break;
            }
        }
    }

    if !session.sink_failed() {
        if let Err(e) = sink.flush().await {
            session.fail(SessionError::SinkWriteFailure(e));
        }
    }

    session.close()
}
