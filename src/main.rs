use anyhow::anyhow;
use clap::Parser;
use osm_features::config::RunConfig;
use osm_features::plot::{DEFAULT_ATTRIBUTE, DEFAULT_TITLE};
use osm_features::{plot, plot_by_attribute, save, Fetcher};
use std::{fs::read_to_string, path::Path};

/// Fetch OSM features for a place, then plot and/or save them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let config: RunConfig = serde_yaml::from_str(&config_contents)?;

    let fetcher = Fetcher::new(config.provider.clone())?;
    log::info!("Loading OSM features for {}", config.place);
    let collection =
        fetcher.load_and_filter(&config.place, &config.tags, config.attribute.as_deref())?;
    log::info!(
        "Loaded {} features with columns {:?}",
        collection.len(),
        collection.columns()
    );

    if let Some(plot_config) = &config.plot {
        if plot_config.by_attribute {
            let attribute = config.attribute.as_deref().unwrap_or(DEFAULT_ATTRIBUTE);
            let title = plot_config.title.as_deref().unwrap_or(DEFAULT_TITLE);
            plot_by_attribute(&collection, attribute, title, &plot_config.output)?;
        } else {
            plot(&collection, &plot_config.output)?;
        }
    }
    if let Some(save_path) = &config.save {
        save(&collection, save_path)?;
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
