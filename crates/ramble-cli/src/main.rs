use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use ramble_core::{CoreError, Model};

/// Reply used when the model has nothing to say yet.
const FALLBACK_REPLY: &str = "...";

const DEFAULT_ARCHIVE: &str = "archive";

#[derive(Parser)]
#[command(name = "ramble", about = "Self-trained conversational text generator")]
struct Cli {
    /// Archive directory (defaults to $RAMBLE_DATA_DIR, then ./archive)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Seed the RNG for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat; every message trains the model
    Chat {
        /// Conversation key for the context buffer
        #[arg(long, default_value = "chat")]
        key: String,
    },

    /// Send a single message and print the reply
    Say {
        /// Message text
        text: String,

        /// Conversation key for the context buffer
        #[arg(long, default_value = "chat")]
        key: String,
    },

    /// Train on text files, one message per line
    Train {
        /// File path(s) to train on
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show model statistics
    Stats,

    /// Manage the seed-word blacklist
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },
}

#[derive(Subcommand)]
enum BlacklistAction {
    /// Add a word
    Add { name: String },
    /// Remove a word
    Remove { name: String },
    /// List blacklisted words
    Show,
}

fn archive_dir(cli: &Cli) -> PathBuf {
    cli.data
        .clone()
        .or_else(|| std::env::var("RAMBLE_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE))
}

fn open_model(dir: &Path) -> Result<Model> {
    if ramble_store::exists(dir) {
        ramble_store::load(dir).with_context(|| format!("failed to load archive {}", dir.display()))
    } else {
        Ok(Model::default())
    }
}

fn save_model(model: &Model, dir: &Path) -> Result<()> {
    ramble_store::save(model, dir)
        .with_context(|| format!("failed to save archive {}", dir.display()))
}

fn make_rng(cli: &Cli) -> SmallRng {
    match cli.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Chat { key } => cmd_chat(&cli, key),
        Commands::Say { text, key } => cmd_say(&cli, text, key),
        Commands::Train { files } => cmd_train(&cli, files),
        Commands::Stats => cmd_stats(&cli),
        Commands::Blacklist { action } => cmd_blacklist(&cli, action),
    }
}

fn reply_or_fallback(model: &mut Model, text: &str, key: &str, rng: &mut SmallRng) -> Result<String> {
    match model.respond(text, key, rng) {
        Ok(reply) => Ok(reply),
        Err(CoreError::NoCandidates | CoreError::Empty) => Ok(FALLBACK_REPLY.to_string()),
        Err(e) => Err(e.into()),
    }
}

fn cmd_chat(cli: &Cli, key: &str) -> Result<()> {
    let dir = archive_dir(cli);
    let mut model = open_model(&dir)?;
    let mut rng = make_rng(cli);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        let reply = reply_or_fallback(&mut model, line, key, &mut rng)?;
        writeln!(stdout, "{reply}")?;
    }

    save_model(&model, &dir)?;
    Ok(())
}

fn cmd_say(cli: &Cli, text: &str, key: &str) -> Result<()> {
    let dir = archive_dir(cli);
    let mut model = open_model(&dir)?;
    let mut rng = make_rng(cli);

    let reply = reply_or_fallback(&mut model, text, key, &mut rng)?;
    println!("{reply}");

    save_model(&model, &dir)?;
    Ok(())
}

fn cmd_train(cli: &Cli, files: &[PathBuf]) -> Result<()> {
    let dir = archive_dir(cli);
    let mut model = open_model(&dir)?;
    let mut rng = make_rng(cli);

    let mut lines = 0usize;
    for path in files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            model.observe(line, "train", &mut rng)?;
            lines += 1;
        }
        println!("trained on {}", path.display());
    }

    save_model(&model, &dir)?;
    println!(
        "done. {} lines, {} tokens, {} forward nodes",
        lines,
        model.table().len(),
        model.forward().node_count()
    );
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let dir = archive_dir(cli);
    let model = open_model(&dir)?;
    let hyper = model.hyper();

    println!("archive:        {}", dir.display());
    println!("order:          {}", hyper.order);
    println!("tokens:         {}", model.table().len());
    println!(
        "forward:        {} nodes, {} edges",
        model.forward().node_count(),
        model.forward().edge_count()
    );
    println!(
        "backward:       {} nodes, {} edges",
        model.backward().node_count(),
        model.backward().edge_count()
    );
    println!("blacklist:      {}", model.blacklist().len());
    println!(
        "dropout:        {} ({}, factor {}, chance {})",
        hyper.dropout.as_str(),
        hyper.dropout_curve.as_str(),
        hyper.dropout_factor,
        hyper.dropout_chance
    );
    Ok(())
}

fn cmd_blacklist(cli: &Cli, action: &BlacklistAction) -> Result<()> {
    let dir = archive_dir(cli);
    let mut model = open_model(&dir)?;

    match action {
        BlacklistAction::Add { name } => {
            model.blacklist_add(name);
            save_model(&model, &dir)?;
            println!("blacklisted '{}'", name.to_lowercase());
        }
        BlacklistAction::Remove { name } => {
            model.blacklist_remove(name);
            save_model(&model, &dir)?;
            println!("removed '{}'", name.to_lowercase());
        }
        BlacklistAction::Show => {
            let mut names: Vec<&str> = model.blacklist().iter().map(String::as_str).collect();
            names.sort_unstable();
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}
