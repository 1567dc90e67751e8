use std::{env, fs, path::PathBuf};

use strata::{CubeRegistry, Query, SqlCompiler, StrataConfig};

fn usage() {
    eprintln!("Usage: print_sql <cubes_dir> <query_json> [dialect]");
    eprintln!("Example: cargo run --example print_sql -- demos/cubes demos/orders_by_month.json postgres");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let cubes_dir = PathBuf::from(args.remove(0));
    let query_path = PathBuf::from(args.remove(0));
    let dialect = if args.is_empty() {
        "postgres".to_string()
    } else {
        args.remove(0)
    };

    let registry = CubeRegistry::load_from_dir(cubes_dir)?;
    let query_str = fs::read_to_string(query_path)?;
    let query: Query = serde_json::from_str(&query_str)?;

    let compiler = SqlCompiler::new(StrataConfig::load_default());
    let compiled = compiler.compile(&registry, &query, &dialect)?;

    println!("{}", compiled.sql);
    println!("-- params: {}", serde_json::to_string(&compiled.params)?);
    for (member, alias) in &compiled.alias_map {
        println!("-- {member} -> {alias}");
    }
    Ok(())
}
