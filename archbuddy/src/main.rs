//! ArchBuddy.
//!
//! Scans the archnemesis inventory on screen and lists which of the
//! configured combos, or their intermediate recipes, can be assembled.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod capture;
mod config;
mod report;
mod util;

use config::{Config, Rect};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file to use instead of the per-user one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the inventory and list what can be built.
    Scan(ScanArgs),
    /// Show or change the saved settings.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print every recipe in the catalog.
    Recipes,
}

#[derive(Debug, clap::Args)]
struct ScanArgs {
    /// Scan a saved screenshot instead of the primary monitor.
    #[arg(long)]
    screenshot: Option<PathBuf>,
    /// Folder holding the `<Item>.png` reference pictures.
    #[arg(long)]
    pictures: Option<PathBuf>,
    /// Override the confidence threshold for this scan.
    #[arg(long)]
    threshold: Option<f32>,
    /// Override the image scale for this scan.
    #[arg(long)]
    scale: Option<f32>,
    /// Also list every item found in the inventory.
    #[arg(long)]
    inventory: bool,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
    /// Save the cropped scanner window as PNG, for checking the window setting.
    #[arg(long, value_name = "FILE")]
    save_region: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show,
    /// Set the scanner window as "x y width height".
    SetWindow { window: Rect },
    SetScale { scale: f32 },
    SetThreshold { threshold: f32 },
    ToggleInventory,
}

fn main() -> Result<()> {
    // Structured logging on stderr. Use `RUST_LOG=debug` etc.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::path()?,
    };

    match cli.command {
        Command::Scan(args) => scan(&Config::load_or_default(&config_path), args),
        Command::Config(cmd) => configure(&config_path, cmd),
        Command::Recipes => {
            recipes();
            Ok(())
        }
    }
}

fn scan(config: &Config, args: ScanArgs) -> Result<()> {
    let catalog = data::Catalog::archnemesis();
    config.validate_combos(&catalog)?;

    let screen = match &args.screenshot {
        Some(path) => capture::load_screenshot(path)?,
        None => capture::capture_primary()?,
    };
    let window = config.scanner_window_for(screen.height());
    let scale = args.scale.unwrap_or_else(|| config.image_scale_for(screen.height()));
    let threshold = args.threshold.unwrap_or(config.confidence_threshold);
    tracing::info!(%window, scale, threshold, "scanning");

    let dir = match args.pictures {
        Some(dir) => dir,
        None => util::assets::resolve_pictures_dir(&catalog)?,
    };
    let sources = util::assets::load_sources(&catalog, &dir, config.strict_templates)?;
    let engine = ie::Ie::try_new(sources, scale, threshold)?;

    let region = capture::crop_region(&screen, window)?;
    if let Some(path) = &args.save_region {
        region.as_image().save_png(path)?;
        tracing::info!(path = %path.display(), "saved scanner region");
    }
    let scan = engine.scan(region.as_image());
    for (item, best) in &scan.best {
        if let Some(best) = best {
            tracing::debug!(item = %item, x = best.location.x, y = best.location.y, score = best.score, "best match");
        }
    }

    let mut allocator = data::Allocator::new(&catalog, &scan.findings);
    for combo in &config.combos {
        allocator.allocate(combo)?;
    }
    if !allocator.shortages().is_empty() {
        tracing::debug!(short = ?allocator.shortages(), "missing ingredients");
    }

    let report = report::Report::new(
        &catalog,
        engine.templates(),
        &scan,
        window,
        allocator.resolutions(),
        allocator.shortages(),
    )
    .with_inventory(args.inventory || config.display_inventory_items);

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn configure(path: &std::path::Path, cmd: ConfigCommand) -> Result<()> {
    let mut config = Config::try_load(path)?;
    match cmd {
        ConfigCommand::Show => {
            println!("config file: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        ConfigCommand::SetWindow { window } => config.scanner_window = Some(window),
        ConfigCommand::SetScale { scale } => config.set_image_scale(scale)?,
        ConfigCommand::SetThreshold { threshold } => config.set_confidence_threshold(threshold)?,
        ConfigCommand::ToggleInventory => {
            config.display_inventory_items = !config.display_inventory_items;
        }
    }

    config.save(path)?;
    tracing::info!(path = %path.display(), "saved config");
    Ok(())
}

fn recipes() {
    let catalog = data::Catalog::archnemesis();
    for (item, ingredients) in catalog.recipes() {
        println!("{item}: {}", ingredients.join(" + "));
    }
}
