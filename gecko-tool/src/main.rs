mod config;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use gecko_core::config::TextOptions;
use gecko_core::format::{CodeTable, TextDialect, GCT_HEADER};

use crate::config::{OutputFormat, ToolConfig};

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converts a code list between GCT and the text dialects
    Convert {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,

        #[arg(short, long, value_enum)]
        to: Option<OutputFormat>,
    },
    /// Prints the description map of a code list
    Map {
        #[arg(short, long, required = true)]
        input: PathBuf,
    },
    /// Writes the decoded command tree as YAML
    Dump {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,
    },
}

/// Reads `path`, refusing anything larger than the configured limit.
fn read_input(path: &Path, config: &ToolConfig) -> Result<Vec<u8>> {
    let len = std::fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    if len > config.max_input_len as u64 {
        bail!(
            "{} is {len} bytes, over the {} byte limit",
            path.display(),
            config.max_input_len
        );
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

/// GCT when the header sentinel is present, text otherwise.
fn load_table(bytes: &[u8]) -> Result<CodeTable> {
    if bytes.starts_with(&GCT_HEADER) {
        log::debug!("input looks like a GCT file");
        return Ok(CodeTable::from_gct(bytes)?);
    }
    let text = std::str::from_utf8(bytes).context("input is neither GCT nor UTF-8 text")?;
    Ok(CodeTable::from_text(text)?)
}

fn render(table: &CodeTable, format: OutputFormat, options: &TextOptions) -> Vec<u8> {
    match format {
        OutputFormat::Gct => table.to_gct(),
        OutputFormat::Plain => table.to_text_with(TextDialect::Plain, options).into_bytes(),
        OutputFormat::Annotated => table
            .to_text_with(TextDialect::Annotated, options)
            .into_bytes(),
    }
}

fn run(args: Args, config: &ToolConfig) -> Result<()> {
    match args.command {
        Command::Convert { input, output, to } => {
            let table = load_table(&read_input(&input, config)?)
                .with_context(|| format!("decoding {}", input.display()))?;
            let format = to.unwrap_or(config.default_format);
            log::info!("writing {} codes as {format:?}", table.len());
            std::fs::write(&output, render(&table, format, &config.text))
                .with_context(|| format!("writing {}", output.display()))?;
        }
        Command::Map { input } => {
            let table = load_table(&read_input(&input, config)?)
                .with_context(|| format!("decoding {}", input.display()))?;
            print!("{}", table.render_map());
        }
        Command::Dump { input, output } => {
            let table = load_table(&read_input(&input, config)?)
                .with_context(|| format!("decoding {}", input.display()))?;
            let mut writer = BufWriter::new(
                File::create(&output).with_context(|| format!("creating {}", output.display()))?,
            );
            serde_yaml::to_writer(&mut writer, &table)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };
    env_logger::Builder::new()
        .filter_level(config.log_level)
        .parse_default_env()
        .init();

    run(args, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "04000000 80231480\nE0000000 80008000\n";

    #[test]
    fn detects_input_form() -> Result<()> {
        let from_text = load_table(PLAIN.as_bytes())?;
        let gct = render(&from_text, OutputFormat::Gct, &TextOptions::default());
        assert!(gct.starts_with(&GCT_HEADER));

        let from_gct = load_table(&gct)?;
        assert_eq!(from_gct.codes[0].commands, from_text.codes[0].commands);
        assert_eq!(
            render(&from_gct, OutputFormat::Plain, &TextOptions::default()),
            PLAIN.as_bytes()
        );
        Ok(())
    }

    #[test]
    fn rejects_non_utf8_input() {
        assert!(load_table(&[0xFF, 0xFE, 0x00]).is_err());
    }

    #[test]
    fn convert_and_dump_files() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("gecko-tool-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let input = dir.join("codes.txt");
        std::fs::write(&input, PLAIN)?;

        let config = ToolConfig::default();
        let gct = dir.join("codes.gct");
        run(
            Args::parse_from(["gecko-tool", "convert", "-i", input.to_str().unwrap(), "-o", gct.to_str().unwrap(), "--to", "gct"]),
            &config,
        )?;
        assert_eq!(std::fs::read(&gct)?.len(), 4 * 8);

        let yaml = dir.join("codes.yaml");
        run(
            Args::parse_from(["gecko-tool", "dump", "-i", gct.to_str().unwrap(), "-o", yaml.to_str().unwrap()]),
            &config,
        )?;
        let dumped: CodeTable = serde_yaml::from_str(&std::fs::read_to_string(&yaml)?)?;
        assert_eq!(dumped, load_table(PLAIN.as_bytes())?);

        let tight = ToolConfig {
            max_input_len: 8,
            ..ToolConfig::default()
        };
        assert!(read_input(&input, &tight).is_err());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
