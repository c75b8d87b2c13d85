//! Framed request loop over a duplex byte channel (stdin/stdout in
//! production).

use std::sync::Arc;

use bridge_core::{FrameCodec, FrameError, ProgressMessage, Request, Response};
use bridge_logging::{bridge_debug, bridge_error, bridge_info, bridge_warn};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinSet};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::invoke::ChannelProgressSink;
use crate::router::Router;
use crate::HostError;

/// Serve requests until `reader` reaches end of input, then wait for the
/// requests still in flight and flush `writer`.
pub async fn serve<R, W>(reader: R, writer: W, router: Arc<Router>) -> Result<(), HostError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(writer, outbound_rx));

    let mut frames = FramedRead::new(reader, FrameCodec::new());
    let mut in_flight = JoinSet::new();
    let mut received = 0u64;
    let mut read_error = None;

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(body)) => {
                    received += 1;
                    in_flight.spawn(handle_frame(router.clone(), body, outbound_tx.clone()));
                }
                Some(Err(err)) => {
                    bridge_error!("Input channel failed: {err}");
                    read_error = Some(err);
                    break;
                }
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_join(joined);
            }
        }
    }

    bridge_info!(
        "Input closed after {received} frame(s); waiting for {} request(s)",
        in_flight.len()
    );
    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
    drop(outbound_tx);
    writer_task.await?.map_err(HostError::Write)?;

    match read_error {
        Some(err) => Err(HostError::Read(err)),
        None => Ok(()),
    }
}

/// [`serve`] over the process's stdin and stdout.
pub async fn serve_stdio(router: Arc<Router>) -> Result<(), HostError> {
    serve(tokio::io::stdin(), tokio::io::stdout(), router).await
}

async fn handle_frame(router: Arc<Router>, body: Bytes, outbound: UnboundedSender<Vec<u8>>) {
    let request = match Router::decode(&body) {
        Ok(request) => request,
        Err(response) => {
            send_message(&outbound, &response);
            return;
        }
    };

    let request_id = request.request_id.clone();
    let action = request.action.clone();
    let task = tokio::spawn(run_request(router, request, outbound.clone()));
    if let Err(err) = task.await {
        bridge_error!("{action} task failed: {err}");
        send_message(
            &outbound,
            &Response::failure(request_id, format!("internal error while handling {action}")),
        );
    }
}

async fn run_request(router: Arc<Router>, request: Request, outbound: UnboundedSender<Vec<u8>>) {
    let (sink, mut updates) = ChannelProgressSink::channel();
    let request_id = request.request_id.clone();
    let progress_outbound = outbound.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            send_message(
                &progress_outbound,
                &ProgressMessage::new(request_id.clone(), update),
            );
        }
        updates.dropped()
    });

    let response: Response = router.dispatch(&request, &sink).await;
    drop(sink);
    match forwarder.await {
        Ok(0) => {}
        Ok(dropped) => bridge_debug!(
            "{dropped} progress event(s) dropped for {}",
            request.action
        ),
        Err(err) => bridge_warn!("Progress forwarder failed: {err}"),
    }
    send_message(&outbound, &response);
}

fn send_message<T: Serialize>(outbound: &UnboundedSender<Vec<u8>>, message: &T) {
    match serde_json::to_vec(message) {
        Ok(body) => {
            if outbound.send(body).is_err() {
                bridge_warn!("Output channel closed; message dropped");
            }
        }
        Err(err) => bridge_error!("Failed to encode outbound message: {err}"),
    }
}

async fn write_frames<W>(writer: W, mut outbound: UnboundedReceiver<Vec<u8>>) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let mut frames = FramedWrite::new(writer, FrameCodec::new());
    while let Some(body) = outbound.recv().await {
        frames.send(body).await?;
    }
    SinkExt::<Vec<u8>>::close(&mut frames).await
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        bridge_error!("Request task failed: {err}");
    }
}
