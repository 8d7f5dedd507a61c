use std::path::PathBuf;

use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};
use flatsql::{Connection, ConnectionConfig, Cursor};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

/// FlatSQL interactive shell
#[derive(Parser, Debug)]
#[command(name = "flatsql")]
#[command(about = "Run SQL queries against CSV and other flat files", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the table files
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Field separator
    #[arg(short, long)]
    separator: Option<char>,

    /// Run these statements and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // CLI args > ENV > config file > defaults
    let mut config = ConnectionConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.dir {
        config.path = dir;
    }
    if let Some(separator) = args.separator {
        config.separator = separator;
    }
    let connection = Connection::open(config)?;

    if let Some(sql) = args.execute {
        for statement in split_statements(&sql) {
            run(&connection, &statement, args.json)?;
        }
        return Ok(());
    }

    let mut rl = DefaultEditor::new()?;
    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".flatsql_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    println!("flatsql {} - type \\q to quit", env!("CARGO_PKG_VERSION"));
    loop {
        match rl.readline("flatsql> ") {
            Ok(input) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);
                if input == "\\q" || input.eq_ignore_ascii_case("quit") {
                    break;
                }
                for statement in split_statements(input) {
                    if let Err(e) = run(&connection, &statement, args.json) {
                        eprintln!("Error: {e}");
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
    Ok(())
}

fn run(connection: &Connection, sql: &str, json: bool) -> Result<(), flatsql::QueryError> {
    let mut cursor = connection.execute_query(sql)?;
    if json {
        println!("{}", format_json(&mut cursor)?);
    } else {
        print!("{}", format_table(&mut cursor)?);
    }
    Ok(())
}

fn format_table(cursor: &mut Cursor) -> Result<String, flatsql::QueryError> {
    let columns = cursor.column_names().to_vec();
    let rows = cursor.fetch_all()?;
    if rows.is_empty() {
        return Ok("(0 rows)\n".to_string());
    }

    let mut table = ComfyTable::new();
    table.load_preset(UTF8_FULL);
    table.set_header(columns.iter().map(Cell::new));
    for row in &rows {
        table.add_row(row.iter().map(Cell::new));
    }
    Ok(format!("{table}\n({} rows)\n", rows.len()))
}

fn format_json(cursor: &mut Cursor) -> Result<String, flatsql::QueryError> {
    let columns = cursor.column_names().to_vec();
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = cursor
        .fetch_all()?
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.iter().map(|v| serde_json::to_value(v).unwrap_or_default()))
                .collect()
        })
        .collect();
    serde_json::to_string_pretty(&rows).map_err(|e| flatsql::QueryError::Io(e.into()))
}

/// Split input on `;` outside single-quoted literals
fn split_statements(input: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in input.chars() {
        match c {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    statements.push(current);
    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
