use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use rvdec_disasm::{disasm_range, load_raw_bin};
use rvdec_rs::disasm::fmt_decoded;
use rvdec_rs::isa::rv32::{parse_extensions, TableConfig};
use rvdec_rs::{compile_text, DecisionTable, Decoder, Extensions, OperandRegistry};

#[derive(Parser, Debug)]
#[command(author, version, about = "Table-driven RV32 disassembler", long_about = None)]
struct Cli {
    /// Extensions to decode, comma separated (the base set is always included)
    #[arg(long, default_value = "rv32gc", value_parser = parse_extensions)]
    ext: Extensions,
    /// Extra table files appended after the selected fragments
    #[arg(long = "table", value_name = "FILE")]
    tables: Vec<String>,
    /// Output format: text or json
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode instruction words given on the command line (hex or dec)
    Words {
        #[arg(value_name = "WORD", required = true)]
        words: Vec<String>,
    },
    /// Disassemble a range [start, end) of a raw little-endian image
    Range {
        /// Input binary path
        #[arg(value_name = "BINFILE")]
        input: String,
        /// Start address (hex or dec)
        start: String,
        /// End address (hex or dec, exclusive)
        end: String,
        /// Load address for the binary in target address space
        #[arg(long, default_value_t = 0u32)]
        base: u32,
        /// Skip N bytes at start of file before loading
        #[arg(long, default_value_t = 0usize)]
        skip: usize,
        /// Limit bytes loaded (default: to EOF after --skip)
        #[arg(long)]
        len: Option<usize>,
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(&hex.replace('_', ""), 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn load_table(ext: Extensions, tables: &[String]) -> Result<DecisionTable> {
    let mut text = TableConfig::new(ext).source();
    for path in tables {
        text.push('\n');
        text.push_str(&std::fs::read_to_string(path)?);
    }
    Ok(compile_text(&text, &OperandRegistry::riscv())?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let table = load_table(cli.ext, &cli.tables)?;

    match cli.cmd {
        Command::Words { words } => {
            let mut decoded = Vec::with_capacity(words.len());
            for w in &words {
                decoded.push(table.decode(parse_u32(w)?));
            }
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decoded)?),
                OutputFormat::Text => {
                    for d in &decoded {
                        println!("{:#010x}: {}", d.word(), fmt_decoded(d));
                    }
                }
            }
        }
        Command::Range { input, start, end, base, skip, len, show_bytes, out } => {
            let img = load_raw_bin(Path::new(&input), base, skip, len)?;
            let start = parse_u32(&start)?;
            let end = parse_u32(&end)?;
            anyhow::ensure!(end >= start, "end must be >= start");

            let illegal_step = if cli.ext.contains(Extensions::C) { 2 } else { 4 };
            let lines = disasm_range(&table, &img, start, end, illegal_step);
            let buf = match cli.format {
                OutputFormat::Json => serde_json::to_string_pretty(&lines)?,
                OutputFormat::Text => lines
                    .iter()
                    .map(|l| l.render(show_bytes) + "\n")
                    .collect::<String>(),
            };
            if let Some(path) = out {
                std::fs::write(path, buf)?;
            } else {
                print!("{}", buf);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u32_hex_and_dec() {
        assert_eq!(parse_u32("0x10").unwrap(), 0x10);
        assert_eq!(parse_u32("0x0050_0093").unwrap(), 0x0050_0093);
        assert_eq!(parse_u32("16").unwrap(), 16);
        assert!(parse_u32("zz").is_err());
    }

    #[test]
    fn base_only_selection_rejects_compressed() {
        let table = load_table(Extensions::I, &[]).unwrap();
        assert!(table.decode(0x0001).is_illegal());
        assert_eq!(table.decode(0x0000_0073).operator(), Some("ecall"));
    }
}
