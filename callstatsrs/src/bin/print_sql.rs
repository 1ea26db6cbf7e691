use std::{env, fs, path::PathBuf};

use anyhow::Context;
use callstats::{
    config::CallstatsConfig, dialect::dialect_by_name, models::SectionQuery,
    query_builder::SqlBuilder, registry::SectionRegistry, sql_ast::LiteralMode,
};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_sql <request_json> [--inline] [--dialect <name>]");
    eprintln!("       print_sql <sections_dir> <section_name> [--inline] [--dialect <name>]");
    eprintln!("Dialects: duckdb (default), postgres, mysql");
    eprintln!("Example: cargo run --bin print_sql -- sections/ inbound_volume --inline");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    let inline = match args.iter().position(|a| a == "--inline") {
        Some(idx) => {
            args.remove(idx);
            true
        }
        None => false,
    };
    let dialect_name = match args.iter().position(|a| a == "--dialect") {
        Some(idx) if idx + 1 < args.len() => {
            let name = args.remove(idx + 1);
            args.remove(idx);
            name
        }
        Some(_) => {
            usage();
            std::process::exit(1);
        }
        None => "duckdb".to_string(),
    };
    let dialect = dialect_by_name(&dialect_name)
        .with_context(|| format!("unknown dialect {dialect_name}"))?;
    if args.is_empty() || args.len() > 2 {
        usage();
        std::process::exit(1);
    }

    let request = if args.len() == 2 {
        let registry = SectionRegistry::load_from_dir(PathBuf::from(&args[0]))?;
        registry
            .get(&args[1])
            .map(|section| section.query.clone())
            .with_context(|| format!("section {} not found in {}", args[1], args[0]))?
    } else {
        let request_str = fs::read_to_string(&args[0])
            .with_context(|| format!("reading request {}", args[0]))?;
        serde_json::from_str::<SectionQuery>(&request_str)?
    };

    let config = CallstatsConfig::load_default();
    let builder = SqlBuilder::from_config(&config)?;
    let mode = if inline {
        LiteralMode::Inline
    } else {
        config.compiler.literal_mode
    };
    let compiled = builder.build_with_mode(&request, dialect, mode)?;

    println!("{}", compiled.sql);
    if !compiled.params.is_empty() {
        println!("-- params: {}", serde_json::to_string(&compiled.params)?);
    }
    for warning in &compiled.warnings {
        println!("-- warning: {warning}");
    }
    Ok(())
}
