//! asn1kit: compile, lint, encode and decode against ASN.1 schemas.

use anyhow::{anyhow, bail, Context, Result};
use asnkit_core::{compile, lint, Codec, Options, Schema, Source};
use asnkit_std::{collect_asn_files, load_sources};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "asn1kit", about = "ASN.1 schema compiler and codec toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile schemas and list the defined types.
    Compile {
        /// Schema files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Codec to bind.
        #[arg(long, default_value = "ber")]
        codec: String,
    },
    /// Check schemas and report every diagnostic.
    Lint {
        /// Schema files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Encode a JSON value to hex.
    Encode {
        /// Schema files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Type to encode.
        #[arg(long = "type")]
        type_name: String,
        /// Codec to use.
        #[arg(long, default_value = "ber")]
        codec: String,
        /// The value, in the JER (JSON) form.
        #[arg(long)]
        value: String,
    },
    /// Decode hex input to a JSON value.
    Decode {
        /// Schema files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Type to decode.
        #[arg(long = "type")]
        type_name: String,
        /// Codec to use.
        #[arg(long, default_value = "ber")]
        codec: String,
        /// The encoding, as hex.
        #[arg(long)]
        hex: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Compile { paths, codec } => {
            let schema = build_schema(&paths, &codec)?;
            let mut names: Vec<&str> = schema.type_names().collect();
            names.sort_unstable();
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
        Command::Lint { paths } => {
            let sources = read_sources(&paths)?;
            let borrowed: Vec<Source<'_>> = sources
                .iter()
                .map(|(label, text)| Source::new(label, text))
                .collect();
            let messages = lint(&borrowed);
            for message in &messages {
                println!("{message}");
            }
            if messages.iter().any(|m| m.contains("error")) {
                bail!("lint found errors");
            }
            Ok(())
        }
        Command::Encode {
            paths,
            type_name,
            codec,
            value,
        } => {
            let schema = build_schema(&paths, &codec)?;
            let jer = build_schema(&paths, "jer")?;
            let parsed = jer
                .decode(&type_name, value.as_bytes())
                .with_context(|| format!("value does not fit type {type_name}"))?;
            let bytes = schema.encode(&type_name, &parsed)?;
            println!("{}", faster_hex::hex_string(&bytes));
            Ok(())
        }
        Command::Decode {
            paths,
            type_name,
            codec,
            hex,
        } => {
            let schema = build_schema(&paths, &codec)?;
            let jer = build_schema(&paths, "jer")?;
            let mut bytes = vec![0u8; hex.len() / 2];
            faster_hex::hex_decode(hex.as_bytes(), &mut bytes)
                .map_err(|e| anyhow!("bad hex input: {e}"))?;
            let value = schema.decode(&type_name, &bytes)?;
            let json = jer.encode(&type_name, &value)?;
            println!("{}", String::from_utf8_lossy(&json));
            Ok(())
        }
    }
}

fn parse_codec(name: &str) -> Result<Codec> {
    Codec::from_name(name).ok_or_else(|| anyhow!("unknown codec `{name}`"))
}

fn read_sources(paths: &[PathBuf]) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    for path in paths {
        files.extend(collect_asn_files(path));
    }
    if files.is_empty() {
        bail!("no .asn/.asn1 files found");
    }
    log::debug!("loading {} schema file(s)", files.len());
    load_sources(&files).context("reading schema files")
}

fn build_schema(paths: &[PathBuf], codec: &str) -> Result<Schema> {
    let codec = parse_codec(codec)?;
    let sources = read_sources(paths)?;
    let borrowed: Vec<Source<'_>> = sources
        .iter()
        .map(|(label, text)| Source::new(label, text))
        .collect();
    let schema = compile(
        &borrowed,
        Options {
            codec,
            numeric_enums: false,
        },
    )?;
    Ok(schema)
}
