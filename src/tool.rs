// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for maintaining a module information database

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use humansize::{SizeFormatter, BINARY};
use modinfo_db::{ByteOrder, Config, FileType, Fingerprint, Payload, Record, RecordKind, Store};
use rustyline::DefaultEditor;
use std::fmt::Display;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};

    () => {{
        eprintln!("Program terminated unexpectedly");
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> (bool, LevelFilter) {
    let is_verbose = !quiet && verbose > 0;

    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let registry = Registry::default();

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("MODINFO_LOG")
        .from_env_lossy()
        .add_directive(
            "rustyline=warn"
                .parse()
                .expect("Failed to parse rustyline directive"),
        );

    let subscriber = registry.with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));

    (is_verbose, level_filter)
}

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
enum ByteOrderArg {
    /// Byte order of this machine
    #[default]
    Native,
    /// Little-endian
    Little,
    /// Big-endian
    Big,
}

impl From<ByteOrderArg> for ByteOrder {
    fn from(value: ByteOrderArg) -> Self {
        match value {
            ByteOrderArg::Native => Self::native(),
            ByteOrderArg::Little => Self::Little,
            ByteOrderArg::Big => Self::Big,
        }
    }
}

/// CLI tool for maintaining a module information database
#[derive(Parser, Debug)]
#[command(name = "modinfo")]
#[command(about = "CLI tool for maintaining a module information database")]
#[command(arg_required_else_help = true)]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the database file (will be created on first write)
    #[arg(short, long, default_value = "adplug.db", global = true)]
    db: PathBuf,

    /// Byte order of the database file
    #[arg(long, value_enum, default_value_t = ByteOrderArg::Native, global = true)]
    byte_order: ByteOrderArg,

    /// Command to run
    #[command(subcommand)]
    command: Option<ToolCommand>,
}

/// Which record a command operates on
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct Target {
    /// File whose content identifies the record
    file: Option<PathBuf>,

    /// Fingerprint of the record (CRC16:CRC32 in hex)
    #[arg(short, long)]
    key: Option<Fingerprint>,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Add information about a file, prompting for fields not given
    Add {
        /// The file to describe
        file: PathBuf,

        /// Record kind (plain, song-info, clock-speed)
        #[arg(long)]
        kind: Option<RecordKind>,

        /// Numeric audio format classification
        #[arg(long, default_value_t = 0)]
        file_type: u16,

        /// Song title (song-info)
        #[arg(long)]
        title: Option<String>,

        /// Song author (song-info)
        #[arg(long)]
        author: Option<String>,

        /// Clock speed in Hz (clock-speed)
        #[arg(long)]
        clock: Option<f32>,
    },
    /// List all records
    #[command(visible_alias = "ls")]
    List {
        /// Also show wiped records
        #[arg(short, long)]
        all: bool,
    },
    /// Show the information stored about a file
    Resolve {
        #[command(flatten)]
        target: Target,
    },
    /// Remove the information stored about a file
    #[command(visible_alias = "rm")]
    Wipe {
        #[command(flatten)]
        target: Target,
    },
    /// Show database statistics
    Info,
    /// Start an interactive shell
    Shell,
}

// Internal shell commands, include all external tool commands
#[derive(Parser, Debug)]
#[command(name = "")]
#[command(no_binary_name = true)]
#[command(disable_version_flag = true)]
#[command(help_template = "
{version}

Available Commands:

{subcommands}

Use `help COMMAND` or `COMMAND --help` for more details.

")]
struct ShellArgs {
    #[command(subcommand)]
    command: ShellCommand,
}

// Shell commands (including ones not available from CLI)
#[derive(Subcommand, Debug, Clone)]
enum ShellCommand {
    #[command(flatten)]
    ToolCmd(ToolCommand),

    /// Write pending changes to disk
    Save,
    /// Exit the current shell (saving pending changes)
    #[command(visible_alias = "quit")]
    Exit,
    /// Abort the current shell (discarding pending changes)
    Abort,
}

/// Source of input lines (shell commands and field prompts)
enum Input {
    Editor(DefaultEditor),
    Stdin,
}

enum Line {
    Text(String),
    Interrupted,
    Eof,
}

impl Input {
    fn open() -> Self {
        if !io::stdin().is_terminal() {
            return Self::Stdin;
        }

        match DefaultEditor::new() {
            Ok(editor) => Self::Editor(editor),
            Err(e) => {
                warn!("Error initializing line editor, falling back to plain stdin: {e}");
                Self::Stdin
            }
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<Line, String> {
        match self {
            Self::Editor(editor) => match editor.readline(prompt) {
                Ok(line) => Ok(Line::Text(line)),
                Err(rustyline::error::ReadlineError::Interrupted) => Ok(Line::Interrupted),
                Err(rustyline::error::ReadlineError::Eof) => Ok(Line::Eof),
                Err(e) => Err(format!("Error reading input: {e}")),
            },
            Self::Stdin => {
                let mut stdout = io::stdout();
                print!("{prompt}");
                stdout
                    .flush()
                    .map_err(|e| format!("can't flush stdout: {e}"))?;

                let mut line = String::new();
                match io::stdin().lock().read_line(&mut line) {
                    Ok(0) => Ok(Line::Eof),
                    Ok(_) => Ok(Line::Text(line.trim_end_matches(['\r', '\n']).to_string())),
                    Err(e) => Err(format!("Error reading input: {e}")),
                }
            }
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Self::Editor(editor) = self {
            let _ = editor.add_history_entry(line);
        }
    }

    /// Prompts for a line of free text, kept verbatim
    fn ask_text(&mut self, prompt: &str) -> Result<String, String> {
        match self.read_line(prompt)? {
            Line::Text(text) => Ok(text),
            Line::Interrupted | Line::Eof => Err("aborted".into()),
        }
    }

    /// Prompts for a value until one parses
    fn ask<T>(&mut self, prompt: &str) -> Result<T, String>
    where
        T: FromStr,
        T::Err: Display,
    {
        loop {
            match self.ask_text(prompt)?.trim().parse() {
                Ok(value) => return Ok(value),
                Err(e) => eprintln!("Invalid input: {e}"),
            }
        }
    }
}

struct Session {
    store: Store,
    input: Input,
    dirty: bool,
}

impl Session {
    fn open(path: PathBuf, byte_order: ByteOrder) -> modinfo_db::Result<Self> {
        let store = Config::new(path).byte_order(byte_order).open()?;

        Ok(Self {
            store,
            input: Input::open(),
            dirty: false,
        })
    }

    fn save(&mut self) -> Result<(), String> {
        self.store
            .save()
            .map_err(|e| format!("can't write database: {e}"))?;
        self.dirty = false;
        Ok(())
    }
}

fn resolve_key(target: &Target) -> Result<Fingerprint, String> {
    match (&target.key, &target.file) {
        (Some(key), _) => Ok(*key),
        (None, Some(file)) => fingerprint_file(file),
        (None, None) => Err("either a file or --key is required".into()),
    }
}

fn fingerprint_file(file: &Path) -> Result<Fingerprint, String> {
    Fingerprint::from_file(file).map_err(|e| format!("can't open {}: {e}", file.display()))
}

fn print_record(record: &Record) {
    println!("key: {}", record.key());
    println!("kind: {}", record.kind());
    println!("file type: {}", record.file_type());

    match record.payload() {
        Payload::Plain => {}
        Payload::SongInfo { title, author } => {
            println!("title: {}", String::from_utf8_lossy(title));
            println!("author: {}", String::from_utf8_lossy(author));
        }
        Payload::ClockSpeed { clock } => {
            println!("clock speed: {clock:.2}");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_add(
    session: &mut Session,
    file: &Path,
    kind: Option<RecordKind>,
    file_type: u16,
    title: Option<String>,
    author: Option<String>,
    clock: Option<f32>,
    auto_save: bool,
) -> Result<(), String> {
    let key = fingerprint_file(file)?;

    if session.store.contains_key(&key) {
        return Err(format!("{} is already in the database ({key})", file.display()));
    }

    let kind = match kind {
        Some(kind) => kind,
        None => session.input.ask("Type (plain, song-info, clock-speed): ")?,
    };

    if kind != RecordKind::SongInfo && (title.is_some() || author.is_some()) {
        return Err("--title and --author only apply to song-info records".into());
    }
    if kind != RecordKind::ClockSpeed && clock.is_some() {
        return Err("--clock only applies to clock-speed records".into());
    }

    let payload = match kind {
        RecordKind::Plain => Payload::Plain,
        RecordKind::SongInfo => {
            let title = match title {
                Some(title) => title,
                None => session.input.ask_text("Title: ")?,
            };
            let author = match author {
                Some(author) => author,
                None => session.input.ask_text("Author: ")?,
            };
            Payload::SongInfo {
                title: title.into_bytes(),
                author: author.into_bytes(),
            }
        }
        RecordKind::ClockSpeed => {
            let clock = match clock {
                Some(clock) => clock,
                None => session.input.ask("Clock speed: ")?,
            };
            Payload::ClockSpeed { clock }
        }
    };

    let record = Record::new(key, FileType::from_raw(file_type), payload);

    session
        .store
        .insert(record)
        .map_err(|e| format!("can't add record: {e}"))?;
    session.dirty = true;

    if auto_save {
        session.save()?;
    }

    println!("OK (added {key})");
    Ok(())
}

fn handle_list(session: &mut Session, all: bool) {
    let store = &mut session.store;

    let mut count = 0;
    let mut wiped = 0;

    if store.slot_count() > 0 {
        store.goto_begin();

        loop {
            if let Some(record) = store.get_record() {
                print_record(record);
                println!();
                count += 1;
            } else {
                wiped += 1;
                if all {
                    println!("(wiped record at index {})", store.cursor());
                    println!();
                }
            }

            if !store.go_forward() {
                break;
            }
        }
    }

    if all {
        println!("OK ({count} records, {wiped} wiped)");
    } else {
        println!("OK ({count} records)");
    }
}

fn handle_resolve(session: &mut Session, target: &Target) -> Result<(), String> {
    let key = resolve_key(target)?;

    match session.store.search(&key) {
        Some(record) => print_record(record),
        None => println!("(no information about {key})"),
    }

    Ok(())
}

fn handle_wipe(session: &mut Session, target: &Target, auto_save: bool) -> Result<(), String> {
    let key = resolve_key(target)?;

    if session.store.wipe(&key).is_none() {
        return Err(format!("no record for {key}"));
    }
    session.dirty = true;

    if auto_save {
        session.save()?;
    }

    println!("OK (wiped {key})");
    Ok(())
}

fn print_info(session: &Session) {
    let store = &session.store;
    let config = store.config();

    println!("Path: {}", config.path.display());
    println!("Byte order: {}", config.byte_order);
    match std::fs::metadata(&config.path) {
        Ok(meta) => println!("Disk space: {}", SizeFormatter::new(meta.len(), BINARY)),
        Err(_) => println!("Disk space: (not written yet)"),
    }
    println!("Records: {}", store.len());
    println!("Slots used: {} / {}", store.slot_count(), store.capacity());
    println!("Wiped: {}", store.slot_count() - store.len());
    if session.dirty {
        println!("Unsaved changes: yes");
    }
}

/// Result of executing a command
enum CommandResult {
    Continue,
    Exit,
}

/// Execute a parsed command
fn execute_command(session: &mut Session, cmd: ToolCommand, auto_save: bool) -> Result<(), String> {
    match cmd {
        ToolCommand::Add {
            file,
            kind,
            file_type,
            title,
            author,
            clock,
        } => handle_add(
            session, &file, kind, file_type, title, author, clock, auto_save,
        ),
        ToolCommand::List { all } => {
            handle_list(session, all);
            Ok(())
        }
        ToolCommand::Resolve { target } => handle_resolve(session, &target),
        ToolCommand::Wipe { target } => handle_wipe(session, &target, auto_save),
        ToolCommand::Info => {
            print_info(session);
            Ok(())
        }
        ToolCommand::Shell => Err("already in a shell".into()),
    }
}

/// Execute a shell-only command
fn execute_shell_command(session: &mut Session, cmd: ShellCommand) -> CommandResult {
    match cmd {
        ShellCommand::ToolCmd(tool_cmd) => {
            if let Err(e) = execute_command(session, tool_cmd, false) {
                eprintln!("Error: {e}");
            }
            CommandResult::Continue
        }
        ShellCommand::Save => {
            match session.save() {
                Ok(()) => println!("OK (saved)"),
                Err(e) => eprintln!("Error: {e}"),
            }
            CommandResult::Continue
        }
        ShellCommand::Exit => {
            if session.dirty {
                if let Err(e) = session.save() {
                    eprintln!("Error: {e}");
                    return CommandResult::Continue;
                }
            }
            CommandResult::Exit
        }
        ShellCommand::Abort => {
            if session.dirty {
                eprintln!("Warning: discarding unsaved changes");
            }
            CommandResult::Exit
        }
    }
}

/// Parse and run a shell command line
fn run_shell_command(session: &mut Session, line: &str) -> CommandResult {
    let line = line.trim();
    if line.is_empty() {
        return CommandResult::Continue;
    }

    let tokens = match shlex::split(line) {
        Some(t) if !t.is_empty() => t,
        Some(_) => return CommandResult::Continue,
        None => {
            eprintln!("error: unclosed quote");
            return CommandResult::Continue;
        }
    };

    match ShellArgs::try_parse_from(&tokens) {
        Ok(args) => execute_shell_command(session, args.command),
        Err(e) => {
            // Print clap's error message
            eprintln!("{e}");
            CommandResult::Continue
        }
    }
}

fn run_shell(session: &mut Session) {
    let interactive = matches!(session.input, Input::Editor(_));

    if interactive {
        println!("Welcome to the module information shell");
        println!("Type 'help' for available commands, 'exit' to quit.\n");
    }

    let prompt = if interactive { "modinfo> " } else { "" };

    loop {
        match session.input.read_line(prompt) {
            Ok(Line::Text(line)) => {
                session.input.add_history(&line);
                if let CommandResult::Exit = run_shell_command(session, &line) {
                    break;
                }
            }
            // Ignore Ctrl+C, just show a new prompt
            Ok(Line::Interrupted) => {}
            Ok(Line::Eof) => {
                if interactive {
                    println!();
                }
                if let CommandResult::Exit = execute_shell_command(session, ShellCommand::Exit) {
                    break;
                }
                die!("Unsaved changes could not be written");
            }
            Err(e) => {
                die!("{}", e);
            }
        }
    }
}

fn main() {
    let args = ToolArgs::parse();
    let (verbose, level_filter) = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();

    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let Some(command) = args.command else {
        die!("No command given, see `modinfo --help`");
    };

    let mut session = match Session::open(args.db, args.byte_order.into()) {
        Ok(s) => s,
        Err(e) => {
            let note = if verbose {
                ""
            } else {
                ". Note: Use -v (one or multiple times) for more information"
            };
            die!("Error opening database: {}{}", e, note);
        }
    };

    match command {
        ToolCommand::Shell => run_shell(&mut session),
        cmd => {
            if let Err(e) = execute_command(&mut session, cmd, true) {
                die!("Error: {}", e);
            }
        }
    }
}
