//! Demo REPL exercising the promptline library: word completions,
//! hints, syntax coloring, persistent history and async prints.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use promptline::{Color, Editor, ReadResult};
use tracing::info;

const WORDS: &[(&str, Color)] = &[
    ("color_black", Color::Black),
    ("color_red", Color::Red),
    ("color_green", Color::Green),
    ("color_brown", Color::Brown),
    ("color_blue", Color::Blue),
    ("color_magenta", Color::Magenta),
    ("color_cyan", Color::Cyan),
    ("color_lightgray", Color::LightGray),
    ("color_gray", Color::Gray),
    ("color_brightred", Color::BrightRed),
    ("color_brightgreen", Color::BrightGreen),
    ("color_yellow", Color::Yellow),
    ("color_brightblue", Color::BrightBlue),
    ("color_brightmagenta", Color::BrightMagenta),
    ("color_brightcyan", Color::BrightCyan),
    ("color_white", Color::White),
];

#[derive(Parser)]
#[command(name = "promptline", about = "promptline demo REPL")]
struct Args {
    /// History file location.
    #[arg(long, default_value = "promptline_history.txt")]
    history: PathBuf,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Require a double Tab to list completions.
    #[arg(long)]
    double_tab: bool,
    /// Emit a demo line above the prompt every few seconds.
    #[arg(long)]
    ticker: bool,
    /// Log file for tracing output (the TTY stays clean).
    #[arg(long)]
    log: Option<PathBuf>,
}

/// The word under the cursor start, as a byte slice of `text`.
fn word_at(text: &str, start: usize) -> &str {
    let byte = text
        .char_indices()
        .nth(start)
        .map_or(text.len(), |(b, _)| b);
    &text[byte..]
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(log) = &args.log {
        let file = std::fs::File::create(log)?;
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    let mut editor = Editor::new()?;
    editor.set_no_color(args.no_color);
    editor.set_double_tab_to_complete(args.double_tab);
    if editor.history_load(&args.history).is_err() {
        eprintln!("warning: could not read {}", args.history.display());
    }

    editor.set_completion_callback(|text, start| {
        let prefix = word_at(text, start);
        WORDS
            .iter()
            .filter(|(w, _)| w.starts_with(prefix))
            .map(|(w, _)| w.to_string())
            .collect()
    });
    editor.set_hint_callback(|text, start| {
        let prefix = word_at(text, start);
        if prefix.len() < 2 {
            return (Vec::new(), Color::Gray);
        }
        let hints: Vec<String> = WORDS
            .iter()
            .filter(|(w, _)| w.starts_with(prefix))
            .map(|(w, _)| w.to_string())
            .collect();
        let color = if hints.len() == 1 {
            Color::Green
        } else {
            Color::Gray
        };
        (hints, color)
    });
    editor.set_highlight_callback(|text| {
        let mut colors = vec![Color::Default; text.chars().count()];
        for (word, color) in WORDS {
            let mut search = 0;
            while let Some(found) = text[search..].find(word) {
                let at = text[..search + found].chars().count();
                for slot in colors.iter_mut().skip(at).take(word.chars().count()) {
                    *slot = *color;
                }
                search += found + word.len();
            }
        }
        colors
    });

    if args.ticker {
        let printer = editor.printer();
        std::thread::spawn(move || {
            let mut n = 0u64;
            loop {
                std::thread::sleep(Duration::from_secs(3));
                printer.print(&format!("tick {n}"));
                n += 1;
            }
        });
    }

    loop {
        match editor.read_line("promptline> ")? {
            ReadResult::Accepted(line) => {
                println!("{line}");
                if editor.history_add(&line) {
                    editor.history_save(&args.history)?;
                }
                info!(target: "demo", len = line.len(), "accepted");
            }
            ReadResult::Canceled => continue,
            ReadResult::Eof => break,
        }
    }
    println!("\nExiting promptline");
    Ok(())
}
