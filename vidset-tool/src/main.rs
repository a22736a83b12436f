mod common;
mod config;

use crate::{common::*, config::Config};

#[derive(Debug, Clone, FromArgs)]
/// Video dataset cache toolkit
struct Args {
    #[argh(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Clone, FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Info(InfoArgs),
    Build(BuildArgs),
}

/// Query cache file information
#[derive(Debug, Clone, FromArgs)]
#[argh(subcommand, name = "info")]
struct InfoArgs {
    #[argh(positional)]
    pub cache_file: PathBuf,
}

/// Build dataset cache
#[derive(Debug, Clone, FromArgs)]
#[argh(subcommand, name = "build")]
struct BuildArgs {
    /// configuration file
    #[argh(option, default = "PathBuf::from(\"vidset.json5\")")]
    pub config_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    {
        let filters = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        pretty_env_logger::formatted_builder()
            .parse_filters(&filters)
            .init();
    }

    let args: Args = argh::from_env();

    match args.subcommand {
        SubCommand::Info(info_args) => {
            info(info_args)?;
        }
        SubCommand::Build(build_args) => {
            build(build_args).await?;
        }
    }

    Ok(())
}

fn info(args: InfoArgs) -> Result<()> {
    let InfoArgs { cache_file } = args;
    let header = DatasetStore::new(&cache_file).inspect()?;
    let [channels, depth, height, width] = header.video_dim;

    println!("cache file:\t{}", cache_file.display());
    println!("sample table:\t{}", header.source.display());
    println!("records:\t{}", header.num_records);
    println!(
        "video shape:\t{} x {} x {} x {} (channels x depth x height x width)",
        channels, depth, height, width
    );
    println!("step:\t{}", header.params.step);
    println!("object mode:\t{:?}", header.params.mode);
    println!("label width:\t{}", header.label_width);
    println!("action width:\t{}", header.action_width);

    Ok(())
}

async fn build(args: BuildArgs) -> Result<()> {
    let BuildArgs { config_file } = args;
    let Config {
        table_file,
        vocab_file,
        backend,
        dataset: dataset_config,
    } = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;

    let text = Arc::new(CsvTextTable::load(&table_file, &vocab_file)?);
    let source = backend.frame_source()?;
    let dataset = VideoDataset::open(dataset_config, text, source, None).await?;

    match dataset.report() {
        Some(report) => info!(
            "built {} records ({} short, {} corrupted) into '{}'",
            dataset.len(),
            report.num_short(),
            report.num_corrupted(),
            dataset.cache_path().display()
        ),
        None => info!(
            "cache '{}' already exists with {} records",
            dataset.cache_path().display(),
            dataset.len()
        ),
    }

    Ok(())
}
