use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use tracing_subscriber::EnvFilter;

use assert_introspect::config::{RewriteConfig, Strategy};
use assert_introspect::exec::run_function;
use assert_introspect::host::Host;
use assert_introspect::render::render_unit;
use assert_introspect::syntax::UnitSyntax;

#[derive(Debug, Default)]
struct Options {
    config_path: Option<PathBuf>,
    strategy: Option<Strategy>,
    run: Option<String>,
    env: BTreeMap<String, i64>,
    dump_before: bool,
    input_path: Option<String>,
}

fn parse_args() -> Result<Options> {
    let mut args = std::env::args().skip(1);
    let mut options = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing config path after {arg}"))?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--strategy" | "-s" => {
                let name = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing strategy name after {arg}"))?;
                let strategy = Strategy::from_name(&name)
                    .ok_or_else(|| anyhow!("Unknown strategy '{name}'"))?;
                options.strategy = Some(strategy);
            }
            "--run" | "-r" => {
                options.run = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("Missing function name after {arg}"))?,
                );
            }
            "--set" => {
                let binding = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing NAME=VALUE after {arg}"))?;
                let (name, value) = binding
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{binding}'"))?;
                let value = value
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("Parsing value of {name}"))?;
                options.env.insert(name.trim().to_string(), value);
            }
            "--dump-before" => options.dump_before = true,
            _ => {
                options.input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    Ok(options)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let options = parse_args()?;

    let mut config = match &options.config_path {
        Some(path) => RewriteConfig::load(path)?,
        None => RewriteConfig::default(),
    };
    if let Some(strategy) = options.strategy {
        config.strategy = strategy;
    }

    let source = if let Some(path) = &options.input_path {
        fs::read_to_string(path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let mut unit = UnitSyntax::from_yaml_str(&source)?
        .lower()
        .context("Lowering translation unit")?;
    if options.dump_before {
        eprint!("{}", render_unit(&unit.tree));
    }

    let host = Host::with_introspection(config)?;
    host.compile(&mut unit).context("Rewriting assertions")?;
    print!("{}", render_unit(&unit.tree));

    if let Some(function) = &options.run {
        let execution = run_function(&unit.tree, function, options.env)
            .with_context(|| format!("Running {function}"))?;
        if !execution.stdout.is_empty() {
            println!("{}", execution.stdout);
        }
        if let Some(message) = execution.aborted {
            eprintln!("{message}");
        }
    }

    Ok(())
}
