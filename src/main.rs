use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, error, info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use folioview::inputs::{command_for_key, parse_key_list};
use folioview::panic_handler;
use folioview::sessions::{ViewingSessions, fingerprint};
use folioview::settings;
use folioview::viewer::{Command, DocumentProvider, Viewer, ViewerConfig, ViewerEvent, html};

/// Render a document page headlessly: navigate, zoom, then export the
/// painted page, its selectable HTML overlay or the text boxes.
#[derive(Parser, Debug)]
#[command(name = "folioview", version, about)]
struct Args {
    /// Document to open
    file: PathBuf,

    /// Page to show (1-based)
    #[arg(long)]
    page: Option<usize>,

    /// Fixed zoom level (1.0 = 100%), disables fit-to-height
    #[arg(long, conflicts_with = "fit")]
    scale: Option<f32>,

    /// Fit the page height to the window
    #[arg(long)]
    fit: bool,

    /// Comma-separated key presses to replay, e.g. `right,right,+,ctrl+0`
    #[arg(long)]
    keys: Option<String>,

    /// Device pixel ratio of the target display
    #[arg(long)]
    dpr: Option<f32>,

    /// Window size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_window)]
    window: Option<(f32, f32)>,

    /// Write the painted page as PNG
    #[arg(long, value_name = "OUT")]
    png: Option<PathBuf>,

    /// Write an HTML page with the selectable text overlay
    #[arg(long, value_name = "OUT")]
    html: Option<PathBuf>,

    /// Write the text boxes as JSON
    #[arg(long, value_name = "OUT")]
    text: Option<PathBuf>,

    /// Continue from the last viewing session of this document
    #[arg(long)]
    resume: bool,

    /// Seconds to wait for the renderer at each step
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[arg(long, default_value = "folioview.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_window(value: &str) -> Result<(f32, f32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| format!("invalid window dimension `{s}`"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting folioview on {}", args.file.display());
    settings::load_settings();

    let mut config = settings::viewer_config();
    if let Some(ratio) = args.dpr {
        config = config.with_device_pixel_ratio(ratio);
    }
    if let Some((width, height)) = args.window {
        config = config.with_window(width, height);
    }

    let result = open_and_run(&args, config);
    if let Err(e) = &result {
        error!("{e:#}");
    }
    info!("Shutting down folioview");
    result
}

#[cfg(feature = "pdf")]
fn open_and_run(args: &Args, config: ViewerConfig) -> Result<()> {
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    run(folioview::viewer::MupdfProvider::for_file_name(&name), args, config)
}

#[cfg(not(feature = "pdf"))]
fn open_and_run(_args: &Args, _config: ViewerConfig) -> Result<()> {
    bail!("folioview was built without the `pdf` feature; no document provider available")
}

fn run<P: DocumentProvider>(provider: P, args: &Args, config: ViewerConfig) -> Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let bytes = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let key = fingerprint(&bytes);
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut sessions = if settings::is_remember_sessions() {
        ViewingSessions::load_or_ephemeral(ViewingSessions::default_path().as_deref())
    } else {
        ViewingSessions::ephemeral()
    };

    let mut viewer = Viewer::spawn(provider, config).context("starting render worker")?;
    viewer.load_document(bytes);
    settle(&mut viewer, timeout)?;

    if !viewer.state().is_ready() {
        bail!("{} has no viewable pages", args.file.display());
    }

    if args.resume {
        match sessions.get(&key) {
            Some(session) => {
                info!("Resuming {file_name} at page {}", session.page);
                viewer.apply_command(Command::GoToPage(session.page));
                if !session.auto_fit {
                    viewer.apply_command(Command::SetScale(session.scale));
                }
            }
            None => warn!("No saved session for {file_name}"),
        }
    }
    if let Some(page) = args.page {
        viewer.apply_command(Command::GoToPage(page));
    }
    if let Some(scale) = args.scale {
        viewer.apply_command(Command::SetScale(scale));
    }
    if args.fit {
        viewer.apply_command(Command::FitToHeight);
    }
    settle(&mut viewer, timeout)?;

    if let Some(keys) = &args.keys {
        for key in parse_key_list(keys).context("parsing --keys")? {
            match command_for_key(key) {
                Some(cmd) => {
                    debug!("Key {:?} -> {cmd:?}", key.code);
                    viewer.apply_command(cmd);
                }
                None => warn!("Key {:?} is not bound", key.code),
            }
        }
        settle(&mut viewer, timeout)?;
    }

    export(&viewer, args, &file_name)?;

    sessions.record(
        &key,
        &file_name,
        viewer.page_count(),
        viewer.current_page(),
        viewer.scale(),
        viewer.auto_fit(),
    );

    println!(
        "{file_name}: page {}/{} at {:.0}%{}",
        viewer.current_page(),
        viewer.page_count(),
        viewer.scale() * 100.0,
        if viewer.auto_fit() { " (fit)" } else { "" }
    );
    Ok(())
}

/// Wait for the worker, then surface whatever went wrong on stderr
fn settle(viewer: &mut Viewer, timeout: Duration) -> Result<()> {
    let (idle, events) = viewer.wait_idle(timeout);
    for event in &events {
        match event {
            ViewerEvent::Painted { page, scale } => debug!("Painted page {page} at {scale:.3}"),
            ViewerEvent::TextLayerReady { page, boxes } => {
                debug!("Text layer for page {page}: {boxes} boxes");
            }
            ViewerEvent::DocumentLoaded { .. } | ViewerEvent::Failed(_) => {}
        }
    }

    for notification in viewer.notifications().all() {
        eprintln!("{notification}");
    }
    viewer.notifications_mut().clear();

    if !idle {
        bail!("renderer did not finish within {timeout:?}");
    }
    Ok(())
}

fn export(viewer: &Viewer, args: &Args, title: &str) -> Result<()> {
    let surface = viewer.surface();
    if surface.is_blank() && (args.png.is_some() || args.html.is_some()) {
        warn!("Nothing has been painted yet, exporting an empty surface");
    }

    if let Some(path) = &args.png {
        surface
            .save_png(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    if let Some(path) = &args.html {
        let page = html::render_page_html(surface, viewer.text_layer(), title)
            .context("encoding page image")?;
        write_file(path, page.as_bytes())?;
    }

    if let Some(path) = &args.text {
        let json = serde_json::to_string_pretty(viewer.text_layer())?;
        write_file(path, json.as_bytes())?;
    }

    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
