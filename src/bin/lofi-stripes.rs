use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lofi_stripes::{
    CorrelatorOpts, EditorSession, PassthroughInit, RenderParameters, ReplayScript,
    RetainingPresenter, SessionOpts, SharedParameters, WorkerOpts,
};

#[derive(Parser, Debug)]
#[command(name = "lofi-stripes", version)]
struct Cli {
    /// Log protocol chatter and timings to stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render once through the worker and write the result as PNG.
    Render(RenderArgs),
    /// Replay a timed JSON script of edits and report what the scheduler did.
    Replay(ReplayArgs),
}

#[derive(Parser, Debug)]
struct AssetArgs {
    /// Font file (TrueType, OpenType or WOFF).
    #[arg(long)]
    font: PathBuf,

    /// Source image.
    #[arg(long)]
    image: PathBuf,

    /// Give up on a worker call after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    assets: AssetArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Text above the stripes.
    #[arg(long, default_value = "")]
    text_top: String,

    /// Text below the stripes.
    #[arg(long, default_value = "")]
    text_bottom: String,

    #[arg(long, default_value_t = 48)]
    font_size: u32,

    #[arg(long, default_value_t = 5)]
    stripe_count: u32,

    #[arg(long, default_value_t = 20)]
    stripe_height_percent: u32,
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    #[command(flatten)]
    assets: AssetArgs,

    /// Replay script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Write the last rendered image here.
    #[arg(long)]
    out: Option<PathBuf>,
}

type Session = EditorSession<SharedParameters, RetainingPresenter>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build runtime")?;
    let local = tokio::task::LocalSet::new();
    match cli.cmd {
        Command::Render(args) => local.block_on(&rt, cmd_render(args)),
        Command::Replay(args) => local.block_on(&rt, cmd_replay(args)),
    }
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let params = RenderParameters {
        text_top: args.text_top,
        text_bottom: args.text_bottom,
        font_size: args.font_size,
        stripe_count: args.stripe_count,
        stripe_height_percent: args.stripe_height_percent,
    };
    params.validate()?;

    let started = Instant::now();
    let session = start_session(&args.assets, params).await?;
    let written = write_latest(&session, &args.out);
    session.shutdown()?;
    let bytes = written?;

    eprintln!(
        "wrote {} ({bytes} bytes) in {} ms",
        args.out.display(),
        started.elapsed().as_millis()
    );
    Ok(())
}

async fn cmd_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let script = ReplayScript::from_path(&args.script)?;
    let session = start_session(&args.assets, script.initial.clone()).await?;

    let report = lofi_stripes::replay(session.scheduler(), &script).await;
    for (i, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            Ok(outcome) => println!("step {i}: {outcome:?}"),
            Err(err) => println!("step {i}: failed: {err}"),
        }
    }
    let stats = report.stats;
    println!(
        "requested={} coalesced={} unchanged={} rendered={} failed={}",
        stats.requested, stats.coalesced, stats.unchanged, stats.rendered, stats.failed
    );

    let written = match &args.out {
        Some(out) => write_latest(&session, out).map(Some),
        None => Ok(None),
    };
    session.shutdown()?;
    if let (Some(out), Some(bytes)) = (&args.out, written?) {
        eprintln!("wrote {} ({bytes} bytes)", out.display());
    }
    Ok(())
}

async fn start_session(assets: &AssetArgs, params: RenderParameters) -> anyhow::Result<Session> {
    let font = std::fs::read(&assets.font)
        .with_context(|| format!("read font '{}'", assets.font.display()))?;
    let image = std::fs::read(&assets.image)
        .with_context(|| format!("read image '{}'", assets.image.display()))?;

    let opts = SessionOpts {
        correlator: CorrelatorOpts {
            call_timeout: assets.timeout_ms.map(Duration::from_millis),
        },
        worker: WorkerOpts::default(),
    };
    let session = EditorSession::start(
        PassthroughInit,
        SharedParameters::new(params),
        RetainingPresenter::default(),
        font,
        image,
        opts,
    )
    .await
    .context("start editor session")?;
    Ok(session)
}

fn write_latest(session: &Session, out: &Path) -> anyhow::Result<usize> {
    let presenter = session.scheduler().presenter();
    let Some(latest) = presenter.latest() else {
        let reason = presenter
            .failures()
            .last()
            .map_or("nothing was rendered", String::as_str);
        anyhow::bail!("no image to write: {reason}");
    };

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(out, &latest.bytes)
        .with_context(|| format!("write png '{}'", out.display()))?;
    Ok(latest.bytes.len())
}
