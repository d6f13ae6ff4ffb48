//! Line-oriented provisioner service.
//!
//! [`serve_lines`] reads one JSON-encoded [`ProvisionerMessage`] request per
//! line, dispatches it to a [`Provisioner`], and writes one JSON response
//! line back.  The `rknfs serve` command runs it over stdin/stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::controller::Provisioner;
use crate::error::NfsError;
use crate::message::ProvisionerMessage;

fn stream_error(op: &str, e: std::io::Error) -> NfsError {
    NfsError::Io {
        op: op.to_owned(),
        path: "<stream>".to_owned(),
        reason: e.to_string(),
    }
}

/// Serve requests from `reader` until end of input.
///
/// Blank lines are ignored.  A line that does not parse is answered with
/// [`ProvisionerMessage::Error`] and the loop keeps going; only I/O errors
/// on the streams themselves end it early.
#[instrument(skip_all, fields(identity = handler.identity()))]
pub async fn serve_lines<T, R, W>(handler: &T, reader: R, mut writer: W) -> Result<(), NfsError>
where
    T: Provisioner + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| stream_error("read request", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ProvisionerMessage>(&line) {
            Ok(request) => {
                debug!(%request, "request received");
                dispatch(handler, request).await
            }
            Err(e) => {
                warn!(error = %e, "malformed request");
                ProvisionerMessage::Error(NfsError::InvalidArgument(format!(
                    "malformed request: {e}"
                )))
            }
        };
        debug!(%response, "sending response");

        let mut payload = serde_json::to_vec(&response).map_err(NfsError::invalid)?;
        payload.push(b'\n');
        writer
            .write_all(&payload)
            .await
            .map_err(|e| stream_error("write response", e))?;
        writer
            .flush()
            .await
            .map_err(|e| stream_error("flush response", e))?;
    }
    Ok(())
}

/// Map a request to the matching [`Provisioner`] call and wrap the result in
/// a response message.
pub async fn dispatch<T>(handler: &T, request: ProvisionerMessage) -> ProvisionerMessage
where
    T: Provisioner + ?Sized,
{
    match request {
        ProvisionerMessage::Provision(opts) => match handler.provision(opts).await {
            Ok(vol) => ProvisionerMessage::Provisioned(vol),
            Err(e) => ProvisionerMessage::Error(e),
        },
        ProvisionerMessage::Delete(vol) => match handler.delete(&vol).await {
            Ok(()) => ProvisionerMessage::Deleted,
            Err(e) => ProvisionerMessage::Error(e),
        },

        // Response variants should never arrive as requests.
        other => {
            warn!(msg = %other, "unexpected message variant received as request");
            ProvisionerMessage::Error(NfsError::InvalidArgument(format!(
                "unexpected message: {other}"
            )))
        }
    }
}
