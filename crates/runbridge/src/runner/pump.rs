//! Duplex streaming between a running process and its client
//!
//! Two activities share one process: the drainer forwards merged output to
//! the client in small chunks, and the forwarder writes client input lines
//! to the process. They run concurrently on the session's task and stop each
//! other through cancellation tokens:
//!
//! - the drainer finishing (end-of-stream, read error, client gone) cancels
//!   `output_done`, which stops the forwarder;
//! - the client going away cancels `client_gone`, which stops the drainer
//!   without waiting for the process to finish.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::process::{ManagedProcess, OutputReader};
use crate::runner::ClientChannel;
use crate::types::InputMessage;

/// How long a process may take to exit after closing its output
const EXIT_GRACE: Duration = Duration::from_millis(250);

/// Why a pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// The process closed its output, normally by exiting
    ProcessExited,
    /// The client disconnected first
    ClientGone,
}

/// Summary of one pump run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    /// Text frames delivered to the client
    pub frames: usize,
    /// Output bytes read from the process
    pub bytes: usize,
    pub ended_by: PumpEnd,
    /// Whether the process had to be force-killed after streaming stopped
    pub killed: bool,
}

/// Bridge a process and a client until the process ends or the client leaves
///
/// Afterwards the process is killed if it has not exited: at once if the
/// client left, otherwise after a short grace period. I/O errors in either
/// direction end that direction quietly; they are not returned.
#[instrument(skip_all, fields(pid = ?process.pid()))]
pub async fn pump(
    process: &mut ManagedProcess,
    channel: &mut ClientChannel,
    chunk_size: usize,
) -> PumpReport {
    let output = process.take_output();
    let stdin = process.take_stdin();
    let (outbound, inbound) = channel.halves();

    let output_done = CancellationToken::new();
    let client_gone = CancellationToken::new();

    let (drained, ()) = tokio::join!(
        drain_output(output, outbound, chunk_size, &output_done, &client_gone),
        forward_input(stdin, inbound, &output_done, &client_gone),
    );

    let client_left = drained.client_gone || client_gone.is_cancelled();
    if !client_left {
        // End-of-stream can be seen just before the process is reapable
        match tokio::time::timeout(EXIT_GRACE, process.wait()).await {
            Ok(Err(e)) => debug!(error = %e, "wait after end of output failed"),
            Ok(Ok(_)) | Err(_) => {}
        }
    }

    let killed = match process.kill().await {
        Ok(killed) => killed,
        Err(e) => {
            warn!(error = %e, "failed to kill process");
            false
        }
    };

    let ended_by = if client_left {
        PumpEnd::ClientGone
    } else {
        PumpEnd::ProcessExited
    };

    debug!(
        frames = drained.frames,
        bytes = drained.bytes,
        ?ended_by,
        killed,
        "pump finished"
    );

    PumpReport {
        frames: drained.frames,
        bytes: drained.bytes,
        ended_by,
        killed,
    }
}

#[derive(Debug, Default)]
struct Drained {
    frames: usize,
    bytes: usize,
    client_gone: bool,
}

async fn drain_output(
    output: Option<OutputReader>,
    outbound: &mpsc::Sender<String>,
    chunk_size: usize,
    output_done: &CancellationToken,
    client_gone: &CancellationToken,
) -> Drained {
    let _done = output_done.clone().drop_guard();
    let mut drained = Drained::default();
    let Some(mut reader) = output else {
        return drained;
    };

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut decoder = Utf8Decoder::default();

    loop {
        let n = tokio::select! {
            biased;

            _ = client_gone.cancelled() => {
                drained.client_gone = true;
                break;
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "output read failed");
                    break;
                }
            },
        };
        drained.bytes += n;

        let text = decoder.decode(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        if !send_frame(outbound, text, client_gone).await {
            drained.client_gone = true;
            break;
        }
        drained.frames += 1;
    }

    if !drained.client_gone
        && let Some(rest) = decoder.finish()
    {
        if send_frame(outbound, rest, client_gone).await {
            drained.frames += 1;
        } else {
            drained.client_gone = true;
        }
    }

    drained
}

async fn send_frame(
    outbound: &mpsc::Sender<String>,
    text: String,
    client_gone: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;

        _ = client_gone.cancelled() => false,
        sent = outbound.send(text) => sent.is_ok(),
    }
}

async fn forward_input(
    mut stdin: Option<ChildStdin>,
    inbound: &mut mpsc::Receiver<String>,
    output_done: &CancellationToken,
    client_gone: &CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;

            _ = output_done.cancelled() => break,
            message = inbound.recv() => message,
        };
        let Some(message) = message else {
            client_gone.cancel();
            break;
        };

        let Some(line) = InputMessage::parse(&message).and_then(|m| m.stdin) else {
            continue;
        };
        // Dropped after the first failed write; later input is discarded
        let Some(writer) = stdin.as_mut() else {
            continue;
        };

        let written = tokio::select! {
            biased;

            _ = output_done.cancelled() => break,
            written = write_line(writer, &line) => written,
        };
        if let Err(e) = written {
            debug!(error = %e, "stdin closed, discarding further input");
            stdin = None;
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    let mut data = Vec::with_capacity(line.len() + 1);
    data.extend_from_slice(line.as_bytes());
    data.push(b'\n');
    stdin.write_all(&data).await?;
    stdin.flush().await
}

/// Incremental UTF-8 decoding of output chunks
///
/// A character split across two reads is held back until its remaining
/// bytes arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut text = String::with_capacity(buf.len());
        let mut input = buf.as_slice();
        while !input.is_empty() {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Flush bytes held back at end-of-stream
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}
