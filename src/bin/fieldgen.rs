//! Generate values for a schema: print each one and, optionally, its serialized bytes.
//!
//! Usage:
//!   fieldgen [OPTIONS] [SCHEMA_FILE]
//!   fieldgen [OPTIONS] < schema.txt
//!
//! Options:
//!   --grid N, -g N    Grid randomizer with decimation N (value i uses index i)
//!   --seed S, -s S    Uniform randomizer seed (default: the library default seed)
//!   --count C, -n C   Number of values (default 1)
//!   --hex, -x         Also print the serialized bytes as hex
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).

use anyhow::{bail, Context};
use fieldpack::visitors::DEFAULT_SEED;
use fieldpack::{parse_schema, print, serialize, walk_mut, GridRandomizer, UniformRandomizer, Value};
use std::io::{self, Read};

/// Remove `flag VALUE` (or its short form) from `args` and parse the value.
fn take_option<T>(args: &mut Vec<String>, long: &str, short: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(pos) = args.iter().position(|a| a == long || a == short) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", long);
    }
    let raw = args.remove(pos + 1);
    args.remove(pos);
    let value = raw.parse().with_context(|| format!("invalid value for {}: {}", long, raw))?;
    Ok(Some(value))
}

fn take_flag(args: &mut Vec<String>, long: &str, short: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == long || a == short) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let grid: Option<u64> = take_option(&mut args, "--grid", "-g")?;
    let seed: Option<u64> = take_option(&mut args, "--seed", "-s")?;
    let count: u64 = take_option(&mut args, "--count", "-n")?.unwrap_or(1);
    let hex = take_flag(&mut args, "--hex", "-x");
    if grid.is_some() && seed.is_some() {
        bail!("--grid and --seed are mutually exclusive");
    }
    if let Some(unknown) = args.iter().find(|a| a.starts_with('-')) {
        bail!("unknown option {}", unknown);
    }

    let (name, source) = match args.as_slice() {
        [] => {
            let mut src = String::new();
            io::stdin().read_to_string(&mut src)?;
            ("<stdin>".to_string(), src)
        }
        [path] => {
            let src = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            (path.clone(), src)
        }
        _ => bail!("expected at most one schema file"),
    };
    let schema = parse_schema(&source).map_err(|e| anyhow::anyhow!("{}: {}", name, e))?;

    let mut uniform = UniformRandomizer::new(seed.unwrap_or(DEFAULT_SEED));
    for index in 0..count {
        let mut value = Value::default_for(&schema);
        match grid {
            Some(decimation) => walk_mut(&schema, &mut value, &mut GridRandomizer::new(index, decimation)?)?,
            None => walk_mut(&schema, &mut value, &mut uniform)?,
        }
        println!("{}", print(&schema, &value)?);
        if hex {
            println!("  {}", hex_string(&serialize(&schema, &value)?));
        }
    }
    Ok(())
}
