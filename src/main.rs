use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use explang::error::{format_error_context, get_error_suggestion};
use explang::formatter;
use explang::lexer;
use explang::logging::parse_filter;
use explang::parser::parse;
use explang::{ExpError, Interpreter, InterpreterConfig, TraceMode};

/// explang - integers, nested functions and while loops
#[derive(Parser)]
#[command(name = "explang")]
#[command(version)]
#[command(about = "Run, check and format explang programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run a .exp file directly
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Maximum depth of nested function calls
    #[arg(long, global = true, value_name = "N")]
    max_depth: Option<usize>,

    /// Log filter, e.g. "info" or "warn,interpreter::call=debug"
    #[arg(long, global = true, value_name = "SPEC")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a .exp program
    Run {
        /// The .exp file to run
        file: PathBuf,
    },

    /// Start the interactive REPL
    Repl,

    /// Check a .exp file for syntax errors without running it
    Check {
        /// The .exp file to check
        file: PathBuf,
    },

    /// Format a .exp file in place
    #[command(name = "fmt")]
    Format {
        /// The .exp file to format
        file: PathBuf,

        /// Only report whether formatting is needed
        #[arg(long)]
        check: bool,
    },

    /// Show tokens from the lexer
    Tokens {
        /// The .exp file to tokenize
        file: PathBuf,
    },

    /// Show the parse tree
    Ast {
        /// The .exp file to parse
        file: PathBuf,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a .exp program, reporting each step on stderr
    Trace {
        /// The .exp file to trace
        file: PathBuf,

        /// Also show values, branches and scopes
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match build_config(cli.max_depth, cli.log.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(2);
        }
    };

    let result = match cli.command {
        Some(Commands::Run { file }) => run_file(&file, config),
        Some(Commands::Repl) => run_repl(config),
        Some(Commands::Check { file }) => check_file(&file),
        Some(Commands::Format { file, check }) => format_file(&file, check),
        Some(Commands::Tokens { file }) => show_tokens(&file),
        Some(Commands::Ast { file, json }) => show_ast(&file, json),
        Some(Commands::Trace { file, verbose }) => trace_file(&file, verbose, config),
        None => {
            // If a file is provided directly, run it
            if let Some(file) = cli.file {
                run_file(&file, config)
            } else {
                run_repl(config)
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }
}

/// Environment first, then command-line flags on top
fn build_config(max_depth: Option<usize>, log: Option<&str>) -> Result<InterpreterConfig, String> {
    let mut config = InterpreterConfig::from_env();
    if let Some(depth) = max_depth {
        if depth == 0 {
            return Err("--max-depth must be at least 1".to_string());
        }
        config = config.with_max_call_depth(depth);
    }
    if let Some(spec) = log {
        config = config.with_log_filter(parse_filter(spec)?);
    }
    Ok(config)
}

fn run_file(path: &Path, config: InterpreterConfig) -> Result<(), String> {
    let source = read_file(path)?;
    let program = parse(&source).map_err(|e| format_error(&source, e))?;

    let mut interpreter = Interpreter::with_config(config);
    interpreter
        .interpret(&program)
        .map_err(|e| format_error(&source, e))?;

    Ok(())
}

fn trace_file(path: &Path, verbose: bool, config: InterpreterConfig) -> Result<(), String> {
    let source = read_file(path)?;
    let program = parse(&source).map_err(|e| format_error(&source, e))?;

    let mode = if verbose {
        TraceMode::Verbose
    } else {
        TraceMode::Statements
    };
    let mut interpreter = Interpreter::with_config(config.with_trace(mode));

    eprintln!("{}", "═".repeat(60).yellow());
    eprintln!("{}", format!("  explang tracer - {}", path.display()).yellow().bold());
    if verbose {
        eprintln!("{}", "  Mode: verbose (values, branches and scopes)".yellow());
    } else {
        eprintln!("{}", "  Mode: statements only".yellow());
    }
    eprintln!("{}", "═".repeat(60).yellow());

    let result = interpreter.interpret(&program);

    eprintln!("{}", "═".repeat(60).yellow());
    match result {
        Ok(_) => {
            eprintln!("{}", "  Trace complete".yellow().bold());
            Ok(())
        }
        Err(e) => Err(format_error(&source, e)),
    }
}

/// Whether the REPL should keep reading before it parses the buffer
fn repl_needs_more_input(buffer: &str) -> bool {
    let mut braces: i32 = 0;
    let mut parens: i32 = 0;

    for line in buffer.lines() {
        let code = line.split("//").next().unwrap_or("");
        for ch in code.chars() {
            match ch {
                '{' => braces += 1,
                '}' => braces -= 1,
                '(' => parens += 1,
                ')' => parens -= 1,
                _ => {}
            }

            // Negative nesting is a parse error; let the parser report it
            if braces < 0 || parens < 0 {
                return false;
            }
        }
    }

    braces > 0 || parens > 0
}

fn run_repl(config: InterpreterConfig) -> Result<(), String> {
    println!("{}", "═".repeat(50).cyan());
    println!("{}", "  explang REPL".cyan().bold());
    println!("{}", "═".repeat(50).cyan());
    println!(
        "{}",
        "Type ':help' for help, ':quit' to exit. Unclosed braces continue the entry.".dimmed()
    );
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| e.to_string())?;

    let history_path = dirs::home_dir()
        .map(|h| h.join(".explang_history"))
        .unwrap_or_else(|| PathBuf::from(".explang_history"));

    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    let mut interpreter = Interpreter::with_config(config);
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            format!("{} ", "exp>".green().bold())
        } else {
            format!("{} ", "...>".green().bold())
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed.is_empty() && buffer.is_empty() {
                    continue;
                }

                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }

                if trimmed.starts_with(':') {
                    match trimmed {
                        ":quit" | ":exit" | ":q" => break,
                        ":help" | ":h" => {
                            print_repl_help(&interpreter);
                        }
                        ":env" => {
                            print_environment(&interpreter);
                        }
                        ":reset" => {
                            interpreter.reset();
                            buffer.clear();
                            println!("{}", "Interpreter reset.".green());
                        }
                        ":cancel" => {
                            buffer.clear();
                        }
                        ":trace" => {
                            let mode = match interpreter.trace_mode() {
                                TraceMode::Off => TraceMode::Statements,
                                _ => TraceMode::Off,
                            };
                            interpreter.set_trace_mode(mode);
                            println!("{}", format!("Trace mode: {:?}", mode).dimmed());
                        }
                        other => {
                            eprintln!("{}: unknown command '{}'", "error".red().bold(), other);
                        }
                    }
                    continue;
                }

                buffer.push_str(&line);
                buffer.push('\n');

                if repl_needs_more_input(&buffer) {
                    continue;
                }

                match interpreter.run_source(&buffer) {
                    Ok(Some(value)) => {
                        println!("{} {}", "=>".dimmed(), value.to_string().yellow());
                    }
                    Ok(None) => {}
                    Err(e) => {
                        eprintln!("{}: {}", "error".red().bold(), format_error(&buffer, e));
                    }
                }

                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("{}", "Interrupted. Use ':quit' to leave.".yellow());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}: {:?}", "error".red(), err);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_path) {
        eprintln!("{}: could not save history: {}", "warning".yellow(), e);
    }

    Ok(())
}

fn print_repl_help(interpreter: &Interpreter) {
    println!();
    println!("{}", "Commands:".cyan().bold());
    println!("  {}    show this help", ":help".green());
    println!("  {}     list global variables and functions", ":env".green());
    println!("  {}   forget every declaration", ":reset".green());
    println!("  {}  drop an unfinished entry", ":cancel".green());
    println!("  {}   toggle statement tracing", ":trace".green());
    println!("  {}    leave the REPL", ":quit".green());
    println!();
    println!("{}", "Language:".cyan().bold());
    println!("  var x = 1            fun add(a, b) {{ return a + b }}");
    println!("  while (x < 10) {{ x = x * 2 }}");
    println!("  if (x == 16) {{ print(x) }} else {{ print(0) }}");
    println!("  return x             (prints => x)");
    println!();
    println!(
        "{} {}",
        "Built-ins:".cyan().bold(),
        interpreter.library().names().join(", ")
    );
    println!();
}

fn print_environment(interpreter: &Interpreter) {
    let names = interpreter.environment_names();
    if names.is_empty() {
        println!("  {}", "Nothing declared yet.".dimmed());
    } else {
        for name in names {
            println!("  {}", name.green());
        }
    }
}

fn check_file(path: &Path) -> Result<(), String> {
    let source = read_file(path)?;

    let tokens = lexer::lex(&source).map_err(|e| format_error(&source, e))?;
    println!("{} Lexing passed ({} tokens)", "✓".green(), tokens.len());

    parse(&source).map_err(|e| format_error(&source, e))?;
    println!("{} Parsing passed", "✓".green());

    Ok(())
}

fn format_file(path: &Path, check_only: bool) -> Result<(), String> {
    let source = read_file(path)?;
    let formatted = formatter::format_source(&source).map_err(|e| format_error(&source, e))?;

    if check_only {
        if source == formatted {
            println!("{} {} is already formatted", "✓".green(), path.display());
            Ok(())
        } else {
            println!("{} {} needs formatting", "✗".red(), path.display());
            Err(format!("{} needs formatting", path.display()))
        }
    } else {
        fs::write(path, &formatted)
            .map_err(|e| format!("cannot write to {}: {}", path.display(), e))?;
        println!("{} Formatted {}", "✓".green(), path.display());
        Ok(())
    }
}

fn show_tokens(path: &Path) -> Result<(), String> {
    let source = read_file(path)?;
    let tokens = lexer::lex(&source).map_err(|e| format_error(&source, e))?;

    for token in &tokens {
        println!(
            "{:4}:{:<3} {:12} {:?}",
            token.line,
            token.column,
            token.kind.to_string().green(),
            token.lexeme
        );
    }
    println!("Total: {} tokens", tokens.len());

    Ok(())
}

fn show_ast(path: &Path, json: bool) -> Result<(), String> {
    let source = read_file(path)?;
    let program = parse(&source).map_err(|e| format_error(&source, e))?;

    if json {
        let text = serde_json::to_string_pretty(&program).map_err(|e| e.to_string())?;
        println!("{}", text);
        return Ok(());
    }

    for (i, stmt) in program.statements().iter().enumerate() {
        println!("{}. {:#?}", i + 1, stmt);
    }
    println!("Total: {} top-level statements", program.statements().len());

    Ok(())
}

fn read_file(path: &Path) -> Result<String, String> {
    if let Some(ext) = path.extension() {
        if ext != "exp" {
            eprintln!(
                "{}: expected a .exp file, got .{}",
                "warning".yellow(),
                ext.to_string_lossy()
            );
        }
    }

    fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))
}

/// Message, source context and a hint when one applies
fn format_error(source: &str, error: ExpError) -> String {
    let mut msg = error.to_string();

    if let Some(span) = error.position() {
        let context = format_error_context(source, span.line, span.column);
        if !context.is_empty() {
            msg.push_str("\n\n");
            msg.push_str(&context);
        }
    }

    if let Some(suggestion) = get_error_suggestion(&error) {
        msg.push('\n');
        msg.push_str(suggestion);
    }

    msg
}
