use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::fmt::Write as _;
use tracing_subscriber::EnvFilter;

use rvdec_rs::isa::rv32::{parse_extensions, TableConfig};
use rvdec_rs::merge::merge;
use rvdec_rs::{compile, parse_table, DecisionTable, Extensions, OperandRegistry, Spec};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compile instruction encoding tables and report the resulting decision table"
)]
struct Opts {
    /// Extensions to include, comma separated (the base set is always included)
    #[arg(long, default_value = "rv32gc", value_parser = parse_extensions)]
    ext: Extensions,
    /// Extra table files appended after the selected fragments
    #[arg(long = "table", value_name = "FILE")]
    tables: Vec<String>,
    /// Compile only the --table files
    #[arg(long)]
    no_builtin: bool,
    /// Fail when rules from unrelated shapes overlap
    #[arg(long)]
    deny_ambiguity: bool,
    /// Print the per-shape decision trees
    #[arg(long)]
    tree: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Selected fragments (unless `no_builtin`) followed by the extra files.
fn table_text(ext: Extensions, tables: &[String], no_builtin: bool) -> Result<String> {
    let mut text = if no_builtin {
        String::new()
    } else {
        TableConfig::new(ext).source()
    };
    for path in tables {
        text.push('\n');
        text.push_str(&std::fs::read_to_string(path)?);
    }
    Ok(text)
}

fn render_trees(specs: &[Spec]) -> String {
    let mut out = String::new();
    for (shape, root) in &merge(specs).trees {
        let _ = writeln!(out, "shape {:#010x} ({} bits)", shape.mask(), shape.specificity());
        out.push_str(&root.render(specs));
    }
    out
}

fn check_ambiguity(table: &DecisionTable, deny: bool) -> Result<()> {
    anyhow::ensure!(
        !deny || table.ambiguities().is_empty(),
        "{} ambiguous overlap(s)",
        table.ambiguities().len()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let text = table_text(opts.ext, &opts.tables, opts.no_builtin)?;

    let specs = parse_table(&text)?;
    if opts.tree {
        print!("{}", render_trees(&specs));
    }

    let table = compile(&specs, &OperandRegistry::riscv())?;
    match opts.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        OutputFormat::Text => {
            println!("rules      : {}", table.len());
            println!("groups     : {}", table.groups().len());
            println!("ambiguities: {}", table.ambiguities().len());
            for g in table.groups() {
                let names: Vec<&str> = g.entries.iter().map(|e| e.operator.as_str()).collect();
                println!("  {:#010x} {:>2} bits  {}", g.mask(), g.specificity(), names.join(" "));
            }
            for a in table.ambiguities() {
                println!(
                    "  overlap: {} (line {}) shadows {} (line {}) at {:#010x}",
                    a.winner, a.winner_line, a.shadowed, a.shadowed_line, a.word
                );
            }
        }
    }

    check_ambiguity(&table, opts.deny_ambiguity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    use rvdec_rs::compile_text;

    #[test]
    fn ambiguity_is_fatal_only_when_denied() {
        let registry = OperandRegistry::riscv();
        let table = compile_text("left 3..0=0xC\nright 5..2=0x3", &registry).unwrap();
        assert_eq!(table.ambiguities().len(), 1);
        assert!(check_ambiguity(&table, false).is_ok());
        let err = check_ambiguity(&table, true).unwrap_err();
        assert_eq!(err.to_string(), "1 ambiguous overlap(s)");

        let clean = compile_text("left 3..0=0xC", &registry).unwrap();
        assert!(check_ambiguity(&clean, true).is_ok());
    }

    #[test]
    fn no_builtin_keeps_only_extra_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "extra 6..0=0x7F").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let text = table_text(Extensions::RV32GC, std::slice::from_ref(&path), true).unwrap();
        assert_eq!(parse_table(&text).unwrap().len(), 1);

        let text = table_text(Extensions::I, &[path], false).unwrap();
        let specs = parse_table(&text).unwrap();
        assert!(specs.iter().any(|s| s.operator == "addi"));
        assert_eq!(specs.last().map(|s| s.operator.as_str()), Some("extra"));
    }

    #[test]
    fn missing_table_file_is_an_error() {
        let missing = vec!["/nonexistent/rvdec/table.opcodes".to_string()];
        assert!(table_text(Extensions::I, &missing, true).is_err());
    }

    #[test]
    fn trees_list_each_shape_and_its_leaves() {
        let specs = parse_table("a 3..0=1\nb 3..0=2\nc 7..4=1").unwrap();
        let out = render_trees(&specs);
        assert!(out.contains("shape 0x0000000f (4 bits)"), "{out}");
        assert!(out.contains("shape 0x000000f0 (4 bits)"), "{out}");
        assert!(out.contains("3..0 == 0x1\n  => a\n"), "{out}");
        assert!(out.contains("3..0 == 0x2\n  => b\n"), "{out}");
        assert!(out.contains("7..4 == 0x1\n  => c\n"), "{out}");
    }
}
