use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use pipeline::{Attributes, Catalog, EngineSettings, FileLoader, Pipeline, RecordingSurfaces};
use runtime::EventLoop;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless ocean current visualization")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered data products
    Products,

    /// Run the pipeline on the virtual clock and print a JSON summary
    Run {
        /// Directory product and topology paths are resolved against
        #[arg(long)]
        root: PathBuf,

        /// Engine settings (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Configuration attributes (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Virtual milliseconds to run
        #[arg(long, default_value_t = 3000)]
        millis: u64,

        /// Drag the globe once at this virtual time
        #[arg(long)]
        drag_at: Option<u64>,

        /// Particle placement seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductLine<'a> {
    kind: &'a str,
    description: &'a str,
    paths: &'a [String],
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Products => list_products(&Catalog::builtin())?,
        Command::Run {
            root,
            settings,
            config,
            millis,
            drag_at,
            seed,
        } => run(&root, settings.as_deref(), config.as_deref(), millis, drag_at, seed)?,
    }
    Ok(())
}

fn list_products(catalog: &Catalog) -> Result<(), Box<dyn std::error::Error>> {
    for kind in catalog.overlay_types() {
        let Some(spec) = catalog.get(kind) else {
            continue;
        };
        let line = ProductLine {
            kind: &spec.kind,
            description: &spec.description,
            paths: &spec.paths,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let bytes = fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(serde_json::from_slice(&bytes).map_err(|e| format!("{}: {e}", path.display()))?)
}

fn run(
    root: &Path,
    settings_path: Option<&Path>,
    config_path: Option<&Path>,
    millis: u64,
    drag_at: Option<u64>,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match settings_path {
        Some(path) => read_json::<EngineSettings>(path)?,
        None => EngineSettings::default(),
    };
    if seed.is_some() {
        settings.seed = seed;
    }
    let attributes = match config_path {
        Some(path) => read_json::<Attributes>(path)?,
        None => Attributes::default(),
    };

    let mut event_loop = EventLoop::new();
    let surfaces = RecordingSurfaces::new();
    let pipeline = Pipeline::new(
        event_loop.handle(),
        settings,
        Catalog::builtin(),
        Rc::new(FileLoader::new(root)),
        surfaces.surfaces(),
    );
    info!(root = %root.display(), millis, "running pipeline");
    pipeline.start(attributes);

    match drag_at {
        Some(at) if at < millis => {
            event_loop.advance(at);
            drag_once(&pipeline);
            event_loop.advance(millis - at);
        }
        _ => event_loop.advance(millis),
    }

    println!("{}", serde_json::to_string_pretty(&pipeline.summary())?);
    Ok(())
}

/// Drags the globe a quarter of the view to the right from its center.
fn drag_once(pipeline: &Pipeline) {
    let view = pipeline.view();
    let [cx, cy] = view.center();
    let input = pipeline.input();
    let scale = input.scale();
    input.begin_move([cx, cy]);
    for step in 1..=4 {
        input.drag([cx + view.width as f64 * 0.0625 * step as f64, cy], scale);
    }
    input.end_move();
    info!(orientation = ?input.globe().map(|g| g.orientation()), "dragged globe");
}
