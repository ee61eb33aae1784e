use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mindgraph_app::{MindMapConfig, MindMapController};
use mindgraph_events::{Event, EventListener};
use mindgraph_storage::Storage;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON config file (defaults to the per-user config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the SQLite session database
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// JSON or YAML document to load, "-" for stdin
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Load the built-in demo document
    #[arg(long, global = true)]
    demo: bool,

    /// Load a shared map from a share URL or bare token
    #[arg(long, global = true)]
    share: Option<String>,

    /// Restore the saved session
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Settle the layout and print the graph snapshot as JSON
    Render {
        #[arg(long, default_value_t = 1000)]
        max_ticks: u64,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print tree statistics
    Stats,
    /// Print a share URL for the loaded map
    Share {
        #[arg(long, default_value = "https://mindmap.local/")]
        base: String,
    },
    /// Write the JSON export document
    Export { output: PathBuf },
    /// List visible nodes whose label matches a query
    Search { query: String },
    /// Store the loaded map as the current session
    SaveSession,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let storage = open_storage(args.db.as_deref())?;
    let mut controller = MindMapController::new(config).with_storage(storage);
    let mut log = EventLog;
    let loaded = load_document(&mut controller, &args);
    controller.bus().dispatch_to(&mut log);
    loaded?;

    match args.command {
        Command::Render { max_ticks, output } => {
            let ticks = controller.settle(max_ticks);
            tracing::info!("Layout settled after {ticks} ticks");
            controller.center_view();
            let json = serde_json::to_string_pretty(&controller.snapshot())?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Stats => {
            let stats = controller.stats();
            println!("Nodes:     {}", stats.nodes);
            println!("Links:     {}", stats.links);
            println!("Max depth: {}", stats.max_depth);
            println!("Size:      {:.1} KB", stats.size_bytes as f64 / 1024.0);
        }
        Command::Share { base } => {
            println!("{}", controller.share_url(&base)?);
        }
        Command::Export { output } => {
            controller
                .export_to(&output)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            println!("Exported to {}", output.display());
        }
        Command::Search { query } => {
            let count = controller.search_now(&query);
            println!("{count} matches for {query:?}");
            for id in controller.search().results() {
                if let Some(node) = controller.graph().node(*id) {
                    println!("  {id}  {}", node.label);
                }
            }
        }
        Command::SaveSession => {
            controller.save_session().context("Failed to save session")?;
            println!("Session saved");
        }
    }

    controller.bus().dispatch_to(&mut log);
    Ok(())
}

/// Mirrors controller notifications onto the log. Failures already surface as
/// command errors, so they are only traced.
struct EventLog;

impl EventListener for EventLog {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::ShowWarning { message } => tracing::warn!("{message}"),
            Event::ShowInfo { message } | Event::ShowSuccess { message } => {
                tracing::info!("{message}")
            }
            Event::LayoutSettled { ticks } => tracing::debug!("Layout settled after {ticks} ticks"),
            event if event.is_failure() => tracing::debug!(?event, "operation failed"),
            event => tracing::trace!(?event),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<MindMapConfig> {
    let Some(path) = path.map(Path::to_path_buf).or_else(MindMapConfig::default_path) else {
        return Ok(MindMapConfig::default());
    };
    MindMapConfig::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn open_storage(path: Option<&Path>) -> Result<Storage> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| dirs::data_dir().map(|dir| dir.join("mindgraph").join("mindgraph.db")));
    match path {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            Storage::open(&path).with_context(|| format!("Failed to open {}", path.display()))
        }
        None => Ok(Storage::new_in_memory()?),
    }
}

fn load_document(controller: &mut MindMapController, args: &Args) -> Result<()> {
    if let Some(share) = &args.share {
        let count = if share.contains('?') {
            controller.load_share_url(share)?
        } else {
            controller.load_share(share)?
        };
        tracing::info!("Loaded shared map with {count} nodes");
    } else if args.session {
        if !controller.load_session()? {
            anyhow::bail!("No saved session");
        }
    } else if args.demo {
        controller.load_demo()?;
    } else if let Some(path) = &args.input {
        let text = read_input(path)?;
        controller.apply_input(&text)?;
    } else {
        anyhow::bail!("Nothing to load: pass --input, --demo, --share or --session");
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
