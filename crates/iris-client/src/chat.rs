//! Interactive terminal client: text questions by default, `/image` for image mode.

use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::api::ApiClient;
use crate::error::ClientError;

const HELP: &str = "\
Type a question and press enter.
  /image <path> [question]  ask about an image file
  /health                   check the service
  /help                     show this help
  /quit                     exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Image {
        path: PathBuf,
        question: Option<String>,
    },
    Health,
    Help,
    Quit,
    Empty,
    Usage(&'static str),
}

impl Command {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => return Self::Empty,
            "/quit" | "/exit" | "quit" | "exit" => return Self::Quit,
            "/health" => return Self::Health,
            "/help" => return Self::Help,
            _ => {}
        }

        if let Some(rest) = trimmed.strip_prefix("/image") {
            if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
                return Self::Ask(trimmed.to_owned());
            }
            let rest = rest.trim();
            if rest.is_empty() {
                return Self::Usage("usage: /image <path> [question]");
            }
            let (path, question) = match rest.split_once(char::is_whitespace) {
                Some((p, q)) => (p, Some(q.trim().to_owned()).filter(|q| !q.is_empty())),
                None => (rest, None),
            };
            return Self::Image {
                path: PathBuf::from(path),
                question,
            };
        }

        Self::Ask(trimmed.to_owned())
    }
}

/// Read commands from `input` until EOF or `/quit`, writing replies to `output`.
///
/// Request failures are printed and the loop continues.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails.
pub async fn run_chat<R, W>(client: &ApiClient, mut input: R, mut output: W) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("Connected to {}. /help for commands.\n", client.base_url()).as_bytes())
        .await?;

    let mut line = String::new();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }

        let reply = match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => HELP.to_owned(),
            Command::Usage(msg) => format!("{msg}\n"),
            Command::Health => match client.health().await {
                Ok(h) => format!("{} (server time {:.0})\n", h.status, h.time),
                Err(e) => format!("error: {e}\n"),
            },
            Command::Ask(q) => match client.ask_text(&q).await {
                Ok(reply) if reply.context.is_empty() => format!("{}\n", reply.answer),
                Ok(reply) => format!("{}\n\n[context]\n{}\n", reply.answer, reply.context),
                Err(e) => format!("error: {e}\n"),
            },
            Command::Image { path, question } => {
                match client.ask_image_file(&path, question.as_deref()).await {
                    Ok(answer) => format!("{answer}\n"),
                    Err(e) => format!("error: {e}\n"),
                }
            }
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(())
}
