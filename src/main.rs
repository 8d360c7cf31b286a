use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use canopy::{AppConfig, EngineConfig, ForestConfig, PaletteInput};

#[derive(Parser, Debug)]
#[command(
    name = "canopy",
    version,
    about = "Endless procedural fly-through of an abstract forest"
)]
struct Cli {
    /// Render on a background thread instead of the window thread.
    #[arg(long)]
    worker: bool,

    /// Theme JSON applied before the first frame.
    #[arg(long, env = "CANOPY_THEME")]
    theme: Option<PathBuf>,

    /// Initial window size in logical pixels.
    #[arg(long, default_value = "1280x720", value_parser = parse_size)]
    size: (u32, u32),

    /// Forest layout seed.
    #[arg(long)]
    seed: Option<u32>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (width, height) = cli.size;
    let mut app = AppConfig::new()
        .title("Canopy")
        .size(width, height)
        .worker(cli.worker);

    if let Some(path) = &cli.theme {
        let theme = PaletteInput::from_path(path)
            .with_context(|| format!("failed to load theme {}", path.display()))?;
        app = app.theme(theme);
    }

    let mut forest = ForestConfig::default();
    if let Some(seed) = cli.seed {
        forest = forest.seed(seed);
    }
    let engine = EngineConfig::default().forest(forest);

    info!(width, height, worker = cli.worker, "starting canopy");
    canopy::run(app, engine).context("renderer stopped with an error")?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn parse_size(text: &str) -> Result<(u32, u32)> {
    let Some((w, h)) = text.split_once(['x', 'X']) else {
        bail!("expected WIDTHxHEIGHT, got {text:?}");
    };
    let width: u32 = w.trim().parse().context("invalid width")?;
    let height: u32 = h.trim().parse().context("invalid height")?;
    if width == 0 || height == 0 {
        bail!("window size must be non-zero");
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size("640X480").unwrap(), (640, 480));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["canopy"]);
        assert!(!cli.worker);
        assert_eq!(cli.size, (1280, 720));
        assert_eq!(cli.seed, None);
    }
}
