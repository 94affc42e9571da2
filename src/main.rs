/*!
 * clipsel - Command Line Entry Point
 *
 * Thin CLI over the clipboard engine:
 * - copy: own a board until another client takes it
 * - paste / targets: read the current owner's content or format list
 * - watch: print ownership changes
 * - clear: release a board we own
 */

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clipsel::{init_tracing, AsyncClipboard, Board, Clipboard, ClipboardConfig, Snapshot};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::info;

/// How often `copy` confirms it still owns the board
const OWNERSHIP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "clipsel")]
#[command(about = "X11 selection clipboard tool", long_about = None)]
struct Cli {
    /// X display to connect to (defaults to $DISPLAY)
    #[arg(short, long, global = true)]
    display: Option<String>,

    /// Milliseconds to wait for the owner's replies
    #[arg(short, long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy text (or stdin) and serve it until another client copies
    Copy {
        /// Text to copy; stdin is read when omitted
        text: Option<String>,
        #[arg(short, long, value_enum, default_value_t = BoardArg::Clipboard)]
        board: BoardArg,
        /// Format name to offer the bytes under
        #[arg(short, long)]
        mime: Option<String>,
    },
    /// Print the board's content
    Paste {
        #[arg(short, long, value_enum, default_value_t = BoardArg::Clipboard)]
        board: BoardArg,
        /// Write raw bytes of this format instead of text
        #[arg(short, long)]
        mime: Option<String>,
    },
    /// List the formats the owner offers
    Targets {
        #[arg(short, long, value_enum, default_value_t = BoardArg::Clipboard)]
        board: BoardArg,
    },
    /// Print every ownership change
    Watch {
        /// Stop after N events
        #[arg(short, long)]
        max_events: Option<usize>,
    },
    /// Release a board owned by this process
    Clear {
        #[arg(short, long, value_enum, default_value_t = BoardArg::Clipboard)]
        board: BoardArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BoardArg {
    Clipboard,
    Primary,
    Secondary,
}

impl From<BoardArg> for Board {
    fn from(arg: BoardArg) -> Self {
        match arg {
            BoardArg::Clipboard => Board::Default,
            BoardArg::Primary => Board::PrimarySelection,
            BoardArg::Secondary => Board::SecondarySelection,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = ClipboardConfig::from_env();
    if let Some(display) = cli.display {
        config = config.with_display(display);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_fetch_timeout(Duration::from_millis(ms));
    }
    let timeout = config.fetch_timeout;
    let clipboard = AsyncClipboard::new(Clipboard::new(config));

    match cli.command {
        Commands::Copy { text, board, mime } => run_copy(&clipboard, text, board.into(), mime).await,
        Commands::Paste { board, mime } => run_paste(&clipboard, board.into(), mime, timeout).await,
        Commands::Targets { board } => {
            let snapshot = clipboard.paste_from(board.into(), timeout).await?;
            for mime in snapshot.mimes() {
                println!("{mime}");
            }
            Ok(())
        }
        Commands::Watch { max_events } => run_watch(&clipboard, max_events).await,
        Commands::Clear { board } => {
            clipboard.clear(board.into()).await?;
            Ok(())
        }
    }
}

async fn run_copy(
    clipboard: &AsyncClipboard,
    text: Option<String>,
    board: Board,
    mime: Option<String>,
) -> Result<()> {
    let bytes = match text {
        Some(text) => text.into_bytes(),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let snapshot = match mime {
        Some(mime) => Snapshot::builder().board(board).bytes(mime, bytes).build(),
        None => Snapshot::text(String::from_utf8(bytes).context("input is not UTF-8")?),
    };

    // Watch before claiming so the hand-over is not missed
    let (monitor, changes) = clipboard.watch()?;
    clipboard.copy_to(board, snapshot).await?;
    info!(board = %board, "Serving until another client copies");

    // The new owner may never answer our refresh, so ownership is checked too
    let mut check = tokio::time::interval(OWNERSHIP_CHECK_INTERVAL);
    loop {
        tokio::select! {
            change = changes.recv_async() => match change {
                Ok(snapshot) if snapshot.board() == board => break,
                Ok(_) => {}
                Err(_) => break,
            },
            _ = check.tick() => {
                if !clipboard.owns(board).await? {
                    break;
                }
            }
        }
    }
    info!(board = %board, "Board taken by another client");
    monitor.close()?;
    Ok(())
}

async fn run_paste(
    clipboard: &AsyncClipboard,
    board: Board,
    mime: Option<String>,
    timeout: Duration,
) -> Result<()> {
    let mut stdout = std::io::stdout();
    match mime {
        Some(mime) => {
            let snapshot = clipboard.paste_from(board, timeout).await?;
            let Some(option) = snapshot.find_format(&mime).cloned() else {
                bail!("format {mime} not offered; try `clipsel targets`");
            };
            let bytes = clipboard.data(option, timeout).await?;
            stdout.write_all(&bytes)?;
        }
        None => {
            let text = clipboard.paste_text(board, timeout).await?;
            stdout.write_all(text.as_bytes())?;
        }
    }
    stdout.flush()?;
    Ok(())
}

async fn run_watch(clipboard: &AsyncClipboard, max_events: Option<usize>) -> Result<()> {
    let (monitor, changes) = clipboard.watch()?;
    monitor.poll()?;

    let mut seen = 0usize;
    while let Ok(snapshot) = changes.recv_async().await {
        println!("{snapshot}");
        seen += 1;
        if max_events.is_some_and(|max| seen >= max) {
            break;
        }
    }
    monitor.close()?;
    Ok(())
}
