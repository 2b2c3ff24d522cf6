//! Autodetracciones CLI - filter receivables reports for detraction review
//!
//! # Main Commands
//!
//! ```bash
//! autodetracciones serve                  # Start HTTP server (port 5001)
//! autodetracciones process report.xlsx    # Write the 4-sheet filtered workbook
//! autodetracciones convert export.txt     # Convert a text export to xlsx
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! autodetracciones parse report.xlsx      # Print the ingested rows as JSON
//! ```

use autodetracciones::api::server::{DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT};
use autodetracciones::{
    convert_text_file, parse_file_auto, process_file, start_server, ProcessOptions,
    ServerConfig, CONVERTED_FILE_NAME, PROCESSED_FILE_NAME,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "autodetracciones")]
#[command(about = "Filter receivables reports into detraction review workbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Address to bind
        #[arg(long, env = "AUTODETRACCIONES_HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "AUTODETRACCIONES_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Maximum upload size in MiB
        #[arg(long, env = "AUTODETRACCIONES_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
        max_upload_mb: usize,
    },

    /// Filter a receivables spreadsheet into USD, PEN and AUTODETRACCIONES sheets
    Process {
        /// Input spreadsheet (xlsx, xls, ods)
        input: PathBuf,

        /// Output workbook
        #[arg(short, long, default_value = PROCESSED_FILE_NAME)]
        output: PathBuf,
    },

    /// Convert a delimited text export into a single-sheet workbook
    Convert {
        /// Input text file
        input: PathBuf,

        /// Output workbook
        #[arg(short, long, default_value = CONVERTED_FILE_NAME)]
        output: PathBuf,
    },

    /// Parse a text or spreadsheet file and output JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            max_upload_mb,
        } => cmd_serve(host, port, max_upload_mb).await,

        Commands::Process { input, output } => cmd_process(&input, &output),

        Commands::Convert { input, output } => cmd_convert(&input, &output),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(host: IpAddr, port: u16, max_upload_mb: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig {
        host,
        port,
        max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        ..ServerConfig::default()
    };
    start_server(config).await
}

fn cmd_process(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let result = process_file(input, &ProcessOptions::default())?;
    fs::write(output, &result.workbook)?;

    eprintln!("💾 Output written to: {}", output.display());
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Converting: {}", input.display());

    let result = convert_text_file(input)?;
    fs::write(output, &result.workbook)?;

    eprintln!("   {} rows written", result.row_count);
    eprintln!("💾 Output written to: {}", output.display());
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = parse_file_auto(input)?;
    eprintln!("   Columns: {}", table.columns.join(", "));
    eprintln!("✅ Parsed {} records", table.len());

    let json = serde_json::to_string_pretty(&table.to_records())?;
    write_output(&json, output)?;

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
