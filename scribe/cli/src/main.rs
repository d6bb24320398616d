//! Scribe - AI edits applied to a selection as they stream in
//!
//! Sends the selected part of a file, plus instructions, to the generation
//! service and applies each part of the structured reply as soon as it is
//! decoded.
//!
//! # Usage
//!
//! ```bash
//! # Rewrite a whole file
//! scribe --file notes.md "fix the spelling"
//!
//! # Only characters 120..240, with the rest of the file as context
//! scribe --file main.rs --select 120:240 -c "turn this loop into an iterator"
//!
//! # Print the result instead of writing it back
//! scribe --file main.rs --dry-run "add doc comments"
//!
//! # Decode a reply captured from an earlier failure, offline
//! scribe --file main.rs --replay reply.json "add doc comments"
//!
//! # Verbose logging
//! RUST_LOG=debug scribe --file main.rs "..."
//! ```
//!
//! Without `--file` the text is read from stdin and the result written to
//! stdout.

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use scribe_core::backend::{
    LlmBackend, LlmRequest, OpenAiBackend, ReplayBackend, DEFAULT_CHUNK_CHARS,
};
use scribe_core::config::{default_config_path, load_config_from_path, ConfigOverrides};
use scribe_core::editor::{apply_part, char_to_byte_offset, EditError, EditorSession, TextBuffer};
use scribe_core::prompt::build_prompt;
use scribe_core::schema::reply_schema;
use scribe_core::{PartKind, PartStream, ReplyError, ScribeConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Scribe - apply AI edit instructions to a file selection
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// File to edit (stdin/stdout when omitted)
    #[arg(short = 'f', long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Selection as START:END character offsets (default: everything)
    #[arg(short = 's', long, value_name = "START:END", value_parser = parse_selection)]
    select: Option<(usize, usize)>,

    /// Include the entire file as context
    #[arg(short = 'c', long)]
    context: bool,

    /// Model to use
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Configuration file path
    #[arg(long, env = "SCRIBE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Decode a captured reply instead of contacting the service
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Print the result instead of writing the file
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SCRIBE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Edit instructions
    #[arg(required = true, trailing_var_arg = true)]
    instructions: Vec<String>,
}

/// Parse `START:END`
fn parse_selection(s: &str) -> Result<(usize, usize), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {s:?}"))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid start {start:?}: {e}"))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|e| format!("invalid end {end:?}: {e}"))?;
    if start > end {
        return Err(format!("start {start} is after end {end}"));
    }
    Ok((start, end))
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("scribe={level},scribe_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Load configuration and apply the command-line overrides
fn resolve_config(args: &Args) -> Result<ScribeConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("cannot load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref model) = args.model {
        overrides = overrides.with_model(model.clone());
    }
    if args.context {
        overrides = overrides.with_include_context(true);
    }
    overrides.apply(&mut config)?;

    debug!(source = %config.source(), model = %config.backend.model, "Configuration resolved");
    Ok(config)
}

/// Byte range of the requested character selection
fn selection_range(body: &str, select: Option<(usize, usize)>) -> Range<usize> {
    match select {
        Some((start, end)) => char_to_byte_offset(body, start)..char_to_byte_offset(body, end),
        None => 0..body.len(),
    }
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {}", path.display())),
        None => {
            let mut body = String::new();
            tokio::io::stdin()
                .read_to_string(&mut body)
                .await
                .context("cannot read stdin")?;
            Ok(body)
        }
    }
}

async fn backend_for(args: &Args, config: &ScribeConfig) -> Result<Box<dyn LlmBackend>> {
    if let Some(ref path) = args.replay {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read captured reply {}", path.display()))?;
        info!(path = %path.display(), "Replaying captured reply");
        return Ok(Box::new(ReplayBackend::new(text, DEFAULT_CHUNK_CHARS)));
    }
    Ok(Box::new(OpenAiBackend::from_config(config)?))
}

/// Why decoding stopped early
enum Interrupted {
    Reply(ReplyError),
    Edit(PartKind, EditError),
    Progress(std::io::Error),
    Signal,
}

/// Build the request for `instructions` against the buffer's selection
fn request_for(
    buffer: &TextBuffer,
    instructions: &str,
    config: &ScribeConfig,
) -> Result<LlmRequest> {
    Ok(build_prompt(buffer, instructions, config.include_context)
        .into_request(config.backend.model.clone(), reply_schema())?
        .with_max_tokens(config.backend.max_output_tokens))
}

/// Apply every part of the reply to `editor`, printing a dot per part.
///
/// Stops at the first part the editor rejects.
async fn apply_reply<E>(
    parts: &mut PartStream,
    editor: &mut E,
    progress: &mut tokio::io::Stderr,
) -> Result<usize, Interrupted>
where
    E: EditorSession + ?Sized,
{
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut applied = 0;
    loop {
        let next = tokio::select! {
            next = parts.next() => Some(next),
            _ = &mut interrupt => None,
        };
        match next {
            None => return Err(Interrupted::Signal),
            Some(None) => return Ok(applied),
            Some(Some(Err(e))) => return Err(Interrupted::Reply(e)),
            Some(Some(Ok(part))) => {
                apply_part(editor, &part).map_err(|e| Interrupted::Edit(part.kind(), e))?;
                applied += 1;
                progress.write_all(b".").await.map_err(Interrupted::Progress)?;
                progress.flush().await.map_err(Interrupted::Progress)?;
            }
        }
    }
}

async fn run(args: Args, config: ScribeConfig) -> Result<()> {
    let body = read_input(args.file.as_deref()).await?;
    let range = selection_range(&body, args.select);
    let mut buffer = TextBuffer::new(body, range)?;
    if let Some(name) = args.file.as_ref().and_then(|p| p.file_name()) {
        buffer = buffer.with_filename(name.to_string_lossy());
    }

    let instructions = args.instructions.join(" ");
    let request = request_for(&buffer, &instructions, &config)?;

    let backend = backend_for(&args, &config).await?;
    let mut parts = PartStream::start(backend.as_ref(), &request).await?;

    let mut progress = tokio::io::stderr();
    progress.write_all(b"AI in progress: ").await?;
    progress.flush().await?;

    let outcome = apply_reply(&mut parts, &mut buffer, &mut progress).await;
    progress.write_all(b"\n").await?;

    let applied = match outcome {
        Ok(applied) => applied,
        Err(Interrupted::Signal) => {
            parts.cancel().await;
            anyhow::bail!("interrupted; nothing written");
        }
        Err(Interrupted::Edit(kind, e)) => {
            parts.cancel().await;
            return Err(
                anyhow::Error::new(e).context(format!("cannot apply {kind} part; nothing written"))
            );
        }
        Err(Interrupted::Progress(e)) => {
            parts.cancel().await;
            return Err(anyhow::Error::new(e).context("cannot report progress; nothing written"));
        }
        Err(Interrupted::Reply(e)) => {
            let message = format!(
                "reply failed ({} error): {e}\n--- raw reply ---\n{}\n--- end ---\n",
                e.kind(),
                e.captured()
            );
            progress.write_all(message.as_bytes()).await?;
            return Err(anyhow::Error::new(e).context("nothing written"));
        }
    };

    for notice in buffer.notices() {
        progress.write_all(format!("{notice}\n").as_bytes()).await?;
    }
    info!(parts = applied, session = %parts.session_id(), "Reply applied");

    let changed = buffer.into_body();
    match args.file {
        Some(ref path) if !args.dry_run => {
            tokio::fs::write(path, changed)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        _ => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(changed.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let config = resolve_config(&args)?;
    run(args, config).await
}
