use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use textchain::config::{RcConfig, RcLoader};
use textchain::document_model::{
    CursorSet, Document, Encoding, IndentStyle, LineEnding, MatchBlock, SearchQuery, SearchStatus, SearchTask, Utf8Transcoder,
    find_all,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Unix,
    Dos,
    Mac,
}

impl From<Format> for LineEnding {
    fn from(format: Format) -> Self {
        match format {
            Format::Unix => LineEnding::Unix,
            Format::Dos => LineEnding::Windows,
            Format::Mac => LineEnding::Mac,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Indentation {
    Tabs,
    Spaces,
}

#[derive(Parser, Debug)]
#[command(name = "textchain")]
#[command(about = "Search and batch-edit text files through a chunked document core", long_about = None)]
#[command(version)]
struct Args {
    /// Files to open
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Print every match of PATTERN with surrounding lines
    #[arg(long, value_name = "PATTERN")]
    find: Option<String>,

    /// Treat the find pattern as a regular expression
    #[arg(long)]
    regex: bool,

    /// Match case when searching
    #[arg(long)]
    match_case: bool,

    /// Lines of context around each match
    #[arg(long, default_value_t = 2)]
    context: usize,

    /// Remove spaces and tabs at the end of every line
    #[arg(long)]
    strip_trailing_whitespace: bool,

    /// Rewrite leading whitespace with tabs or spaces
    #[arg(long, value_enum)]
    indentation: Option<Indentation>,

    /// Line endings to write with (default: the detected ones)
    #[arg(long, value_enum)]
    line_ending: Option<Format>,

    /// Character set of the files
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Write the result here instead of standard output (single file only)
    #[arg(long, value_name = "PATH", conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Save edited files in place
    #[arg(long)]
    in_place: bool,

    /// Override the rc file's chunk size
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Override the rc file's tab stop
    #[arg(long)]
    tab_stop: Option<usize>,

    /// Indent with spaces
    #[arg(long)]
    expand_tab: bool,

    /// Print line, chunk and width statistics for each file
    #[arg(long)]
    stats: bool,
}

impl Args {
    fn has_edits(&self) -> bool {
        self.strip_trailing_whitespace || self.indentation.is_some() || self.line_ending.is_some()
    }

    fn apply_overrides(&self, config: &mut RcConfig) {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(tab_stop) = self.tab_stop {
            config.tab_stop = tab_stop;
        }
        if self.expand_tab {
            config.expand_tab = true;
        }
    }
}

fn print_block(out: &mut impl Write, path: &Path, block: &MatchBlock) -> io::Result<()> {
    let matched: Vec<usize> = block.matches.iter().map(|range| range.start.line).collect();
    for (offset, line) in block.lines.iter().enumerate() {
        let number = block.first_line + offset;
        let marker = if matched.contains(&number) { ':' } else { '-' };
        writeln!(out, "{}{}{}{}", path.display(), marker, number + 1, marker)?;
        writeln!(out, "    {line}")?;
    }
    writeln!(out, "--")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // Load RC configuration, then let flags override it
    let mut config = RcLoader::load_config();
    args.apply_overrides(&mut config);
    let options = config.document_options();
    let encoding = Encoding::from_label(&args.encoding);

    if args.output.is_some() && args.files.len() > 1 {
        return Err("--output takes a single input file".into());
    }

    let mut documents = Vec::with_capacity(args.files.len());
    for path in &args.files {
        documents.push(Document::load(path, &options, encoding.clone(), &Utf8Transcoder)?);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.stats {
        for (path, document) in args.files.iter().zip(&documents) {
            let state = document.read();
            writeln!(
                out,
                "{}: {} lines, {} chunks, widest line {} cells, {:?} line endings, {}",
                path.display(),
                state.line_count(),
                state.chain().chunk_count(),
                state.chain().max_line_width(),
                state.line_ending(),
                state.encoding(),
            )?;
        }
    }

    if let Some(pattern) = &args.find {
        let query = SearchQuery::new(pattern.as_str())
            .regex(args.regex)
            .match_case(args.match_case);
        let refs: Vec<&Document> = documents.iter().collect();
        let mut write_error = None;
        let status = find_all(&refs, &query, args.context, &SearchTask::new(), |block| {
            if write_error.is_none() {
                write_error = print_block(&mut out, &args.files[block.document], &block).err();
            }
        })?;
        if let Some(error) = write_error {
            return Err(error.into());
        }
        if let SearchStatus::Completed { matches } = status {
            info!(matches, "search finished");
        }
    }

    if !args.has_edits() {
        return Ok(());
    }

    for (path, document) in args.files.iter().zip(&documents) {
        let mut cursors = CursorSet::caret(0, 0);
        if args.strip_trailing_whitespace {
            document.remove_trailing_whitespace(&mut cursors);
        }
        if let Some(indentation) = args.indentation {
            let style = match indentation {
                Indentation::Tabs => IndentStyle::Tabs,
                Indentation::Spaces => IndentStyle::Spaces,
            };
            document.convert_indentation(&mut cursors, style);
        }
        if let Some(format) = args.line_ending {
            document.set_line_ending(format.into());
        }

        if args.in_place {
            let written = document.save(&Utf8Transcoder)?;
            info!(path = %path.display(), bytes = written, "saved");
        } else if let Some(output) = &args.output {
            document.save_as(output, &Utf8Transcoder)?;
        } else {
            document.write_to(&mut out, document.line_ending(), &Utf8Transcoder)?;
        }
    }

    Ok(())
}
