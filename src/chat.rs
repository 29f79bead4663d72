// Interactive terminal chat: questions come from stdin one line at a time,
// answers and the loading countdown are written to stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::api::GravidClient;
use crate::config::ChatConfig;
use crate::constants::INPUT_PLACEHOLDER;
use crate::render::{render_event, render_settled, render_transcript, Output};
use crate::session::{self, SessionError, SessionHandle};

const PROMPT: &str = "> ";
const QUIT_COMMANDS: [&str; 2] = ["/sair", "/quit"];
const HISTORY_COMMANDS: [&str; 2] = ["/historico", "/history"];

pub async fn run_chat(config: ChatConfig) -> Result<()> {
    info!(api_url = %config.api_url, "Starting terminal chat");
    let client = GravidClient::new(config.clone())?;
    let (handle, task) = session::spawn(&config, Arc::new(client));

    let mut stdout = tokio::io::stdout();
    let result = run_chat_with(&handle, tokio::io::stdin(), &mut stdout).await;
    task.abort();
    result
}

/// Drive a chat over arbitrary input/output streams. Returns at end of input
/// (after the pending answer, if any, has arrived) or on a quit command.
pub async fn run_chat_with<R, W>(handle: &SessionHandle, input: R, output: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(input).lines();
    let mut input_open = true;
    // Accepted questions whose answer has not been printed yet
    let mut awaiting = 0usize;

    write(output, &format!("{}\n{}", INPUT_PLACEHOLDER, PROMPT)).await?;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line.context("Failed to read chat input")? {
                    None => {
                        debug!("Chat input closed");
                        input_open = false;
                        if awaiting == 0 {
                            break;
                        }
                    }
                    Some(line) => {
                        let command = line.trim();
                        if QUIT_COMMANDS.contains(&command) {
                            break;
                        }
                        if HISTORY_COMMANDS.contains(&command) {
                            let snapshot = handle.snapshot().await?;
                            let history = render_transcript(&snapshot);
                            write(output, &format!("{}\n{}", history, PROMPT)).await?;
                            continue;
                        }
                        match handle.ask(line).await {
                            Ok(()) => awaiting += 1,
                            Err(SessionError::Rejected(reason)) => {
                                debug!(?reason, "Question not submitted")
                            }
                            Err(e) => return Err(e).context("Chat session failed"),
                        }
                    }
                }
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Terminal fell behind chat events");
                        if catch_up(handle, output, &mut awaiting).await? {
                            if !input_open {
                                break;
                            }
                            write(output, PROMPT).await?;
                        }
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let settled = event.is_resolution();
                if let Some(out) = render_event(&event) {
                    write_output(output, out).await?;
                }
                if settled {
                    awaiting = awaiting.saturating_sub(1);
                    if !input_open && awaiting == 0 {
                        break;
                    }
                    write(output, PROMPT).await?;
                }
            }
        }
    }

    output.flush().await?;
    Ok(())
}

// A lagged receiver may have missed the resolution event. Settle from the
// transcript instead; returns true when the outstanding answer was printed.
async fn catch_up<W: AsyncWrite + Unpin>(
    handle: &SessionHandle,
    output: &mut W,
    awaiting: &mut usize,
) -> Result<bool> {
    if *awaiting == 0 {
        return Ok(false);
    }
    let snapshot = handle.snapshot().await?;
    if snapshot.exchanges.iter().any(|e| e.pending) {
        return Ok(false);
    }
    if let Some(last) = snapshot.exchanges.last() {
        write_output(output, render_settled(last)).await?;
    }
    *awaiting = 0;
    Ok(true)
}

async fn write_output<W: AsyncWrite + Unpin>(output: &mut W, out: Output) -> Result<()> {
    match out {
        Output::Line(line) => write(output, &format!("\r\x1b[K{}\n", line)).await,
        Output::Status(status) => write(output, &format!("\r\x1b[K{}", status)).await,
        Output::ClearStatus => write(output, "\r\x1b[K").await,
    }
}

async fn write<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
