use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use spinwheel_core::{
    busy::BusyCounter,
    client::SpinClient,
    config::Config,
    driver::{StreamDriver, StreamSettings, StreamSummary},
    model::{CompareScenariosRequest, GenderId, GeneratedTextSources, SpinArguments},
    session::{Session, Snapshot},
    sources::format_source_label,
    transport::ScriptedTransport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "spinwheel CLI: spin a story from place, time and gender", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend root URL; takes precedence over the config file.
    #[arg(long, global = true)]
    root_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Spin {
    #[arg(long)]
    city: String,
    #[arg(long)]
    year: i32,
    /// MALE, FEMALE or NONBINARY (descriptions like "Non-binary" work too)
    #[arg(long)]
    gender: GenderId,
}

impl From<Spin> for SpinArguments {
    fn from(s: Spin) -> Self {
        SpinArguments {
            city: s.city,
            year: s.year,
            gender: s.gender.into(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story (streamed unless --no-stream)
    Story {
        #[command(flatten)]
        spin: Spin,
        #[arg(long)]
        no_stream: bool,
    },
    /// Compare two scenarios
    Compare {
        #[arg(long)]
        first_city: String,
        #[arg(long)]
        first_year: i32,
        #[arg(long)]
        first_gender: GenderId,
        #[arg(long)]
        second_city: String,
        #[arg(long)]
        second_year: i32,
        #[arg(long)]
        second_gender: GenderId,
        #[arg(long)]
        no_stream: bool,
    },
    /// Generate an image for a spin and write it to a file
    Image {
        #[command(flatten)]
        spin: Spin,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// List the places the backend knows
    Places,
    /// List the selectable years
    Times,
    /// List the selectable genders
    Genders,
    /// Feed a recorded SSE transcript through the stream pipeline offline
    Replay {
        file: PathBuf,
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
    },
}

const DEFAULT_ROOT_URL: &str = "http://localhost:8080";

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::for_root_url(DEFAULT_ROOT_URL),
    };
    if let Some(url) = &cli.root_url {
        cfg.api.root_url = url.clone();
    }
    Ok(cfg)
}

/// Print text as it grows. A reset (shorter text) restarts the output position.
fn echo_live(session: &Session) {
    let printed = Mutex::new(0usize);
    session.observe(move |snap: &Snapshot| {
        let text = snap.generated_text.as_deref().unwrap_or("");
        let mut printed = printed.lock().unwrap_or_else(|e| e.into_inner());
        if text.len() < *printed {
            *printed = 0;
        }
        if let Some(new) = text.get(*printed..) {
            print!("{new}");
            io::stdout().flush().ok();
            *printed = text.len();
        }
    });
}

fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for url in sources {
        println!("  {} <{}>", format_source_label(url), url);
    }
}

fn finish_stream(summary: &StreamSummary, snapshot: &GeneratedTextSources) {
    println!();
    print_sources(&snapshot.sources);
    tracing::debug!(?summary, "stream summary");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Story { spin, no_stream } => {
            let client = SpinClient::from_config(&cfg)?;
            if no_stream {
                let resp = client.generate_story(spin.into()).await?;
                println!("{}", resp.generated_text.unwrap_or_default());
                print_sources(&resp.sources);
            } else {
                echo_live(client.story_session());
                let summary = client.stream_story(spin.into()).await?;
                finish_stream(&summary, &client.story_session().snapshot());
            }
        }
        Commands::Compare {
            first_city,
            first_year,
            first_gender,
            second_city,
            second_year,
            second_gender,
            no_stream,
        } => {
            let client = SpinClient::from_config(&cfg)?;
            let req = CompareScenariosRequest {
                spin_arguments_first_story: SpinArguments {
                    city: first_city,
                    year: first_year,
                    gender: first_gender.into(),
                },
                spin_arguments_second_story: SpinArguments {
                    city: second_city,
                    year: second_year,
                    gender: second_gender.into(),
                },
                generated_text_sources_first_story: None,
                generated_text_sources_second_story: None,
            };
            if no_stream {
                let resp = client.compare_scenarios(req).await?;
                println!("{}", resp.generated_text.unwrap_or_default());
                print_sources(&resp.sources);
            } else {
                echo_live(client.comparison_session());
                let summary = client.stream_compare_scenarios(req).await?;
                finish_stream(&summary, &client.comparison_session().snapshot());
            }
        }
        Commands::Image { spin, out } => {
            let client = SpinClient::from_config(&cfg)?;
            let image = client.generate_image(spin.into()).await?;
            tokio::fs::write(&out, &image.data)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!(
                "{} bytes ({}) -> {}",
                image.data.len(),
                image.content_type.as_deref().unwrap_or("unknown type"),
                out.display()
            );
        }
        Commands::Places => {
            let client = SpinClient::from_config(&cfg)?;
            for place in client.places().await? {
                println!("{place}");
            }
        }
        Commands::Times => {
            let client = SpinClient::from_config(&cfg)?;
            for year in client.times().await? {
                println!("{year}");
            }
        }
        Commands::Genders => {
            let client = SpinClient::from_config(&cfg)?;
            for g in client.genders().await? {
                println!("{} -> {}", g.id.wire_name(), g.description);
            }
        }
        Commands::Replay { file, chunk_size } => {
            let body = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let driver = StreamDriver::new(
                Arc::new(ScriptedTransport::from_body(body, chunk_size)),
                BusyCounter::new(),
                StreamSettings::from(&cfg.stream),
            );
            let session = Session::new("replay");
            echo_live(&session);
            let url = format!("file://{}", file.display());
            let summary = driver
                .run(&url, &serde_json::Value::Null, &session)
                .await?;
            finish_stream(&summary, &session.snapshot());
            eprintln!(
                "[frames: {}, deltas: {}, skipped: {}, discarded tail: {} bytes]",
                summary.frames, summary.deltas, summary.skipped_lines, summary.discarded_tail_bytes
            );
        }
    }

    Ok(())
}
