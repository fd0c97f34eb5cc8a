use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use geodash::stats::value_range;
use geodash::{Client, Dashboard, DashboardConfig, DirSource, JsonSource, Registry, storage};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "geodash",
    version,
    about = "Load, step through & export time-varying map dashboards"
)]
struct Cli {
    /// Dashboard descriptor (JSON).
    #[arg(short, long, global = true, default_value = "dashboard.json")]
    config: PathBuf,
    /// File server URL or local directory. Defaults to the descriptor's serverFileApiPath.
    #[arg(short, long, global = true)]
    base: Option<String>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the descriptor against the built-in plugins without fetching anything.
    Validate,
    /// Load the dashboard, apply the requested interactions and print every widget.
    Run(RunArgs),
    /// Load the dashboard and save the current frame.
    Export(ExportArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct StateArgs {
    /// Timeline index to seek to after loading.
    #[arg(long)]
    seek: Option<usize>,
    /// Feature to select, as LAYER:ID.
    #[arg(long)]
    select: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    state: StateArgs,
    /// Playback rate in steps per second.
    #[arg(long)]
    rate: Option<f64>,
    /// Play for this many seconds before printing.
    #[arg(long)]
    play_for: Option<f64>,
    /// Advance this many timeline steps before printing.
    #[arg(long, default_value_t = 0)]
    ticks: usize,
    /// Print the per-layer value range at the current cursor.
    #[arg(long, default_value_t = false)]
    stats: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    state: StateArgs,
    /// Output file.
    #[arg(long)]
    out: PathBuf,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = DashboardConfig::from_path(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    match cli.cmd {
        Command::Validate => cmd_validate(&config),
        Command::Run(args) => cmd_run(open(config, cli.base.as_deref())?, args),
        Command::Export(args) => cmd_export(open(config, cli.base.as_deref())?, args),
    }
}

fn source_for(base: &str) -> Box<dyn JsonSource> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Box::new(Client::new(base))
    } else {
        Box::new(DirSource::new(Path::new(base)))
    }
}

fn open(config: DashboardConfig, base: Option<&str>) -> Result<Dashboard<Box<dyn JsonSource>>> {
    let base = base.unwrap_or(config.server_file_api_path.as_str()).to_string();
    let mut dash = Dashboard::new(source_for(&base), config, Registry::builtin())?;
    dash.load()?;
    let ds = dash.dataset();
    for f in &ds.failed {
        eprintln!("layer {} failed: {}", f.layer, f.reason);
    }
    for l in ds.layers.iter().filter(|l| !l.degraded.is_empty()) {
        eprintln!(
            "layer {}: {} feature(s) incomplete ({})",
            l.name(),
            l.degraded.len(),
            l.degraded.join(", ")
        );
    }
    eprintln!(
        "Loaded {} layer(s), {} timeline entries",
        ds.layers.len(),
        dash.cursor().timeline().len()
    );
    Ok(dash)
}

fn cmd_validate(config: &DashboardConfig) -> Result<()> {
    config.validate(&Registry::builtin())?;
    println!(
        "OK: {} overlay layer(s), {} plugin(s), years {}-{}",
        config.overlay_layers.len(),
        config.plugins.len(),
        config.year_range.0,
        config.year_range.1
    );
    Ok(())
}

fn apply_state(dash: &mut Dashboard<Box<dyn JsonSource>>, state: &StateArgs) -> Result<()> {
    if let Some(i) = state.seek {
        dash.seek(i)?;
    }
    if let Some(sel) = state.select.as_deref() {
        let (layer, id) = sel
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid --select, expected LAYER:ID"))?;
        if dash.click_feature(layer, id)?.is_empty() {
            anyhow::bail!("feature {id} is not rendered by layer {layer}");
        }
    }
    Ok(())
}

fn cmd_run(mut dash: Dashboard<Box<dyn JsonSource>>, args: RunArgs) -> Result<()> {
    if let Some(r) = args.rate {
        dash.set_steps_per_second(r)?;
    }
    apply_state(&mut dash, &args.state)?;
    if args.ticks > 0 {
        dash.play();
        for _ in 0..args.ticks {
            dash.tick();
        }
        dash.pause();
    }
    if let Some(secs) = args.play_for {
        let d = Duration::try_from_secs_f64(secs)
            .map_err(|_| anyhow::anyhow!("invalid --play-for, expected seconds"))?;
        dash.play();
        dash.run_for(d)?;
        dash.pause();
    }

    for (_, text) in dash.render_widgets() {
        println!("{}", text.trim_end());
        println!();
    }

    if args.stats {
        if let Some(key) = dash.cursor().current() {
            for layer in &dash.dataset().layers {
                let (lo, hi) = value_range(&layer.data, key).unzip();
                println!(
                    "{} • {}  features={}  min={} max={}",
                    layer.name(),
                    key,
                    layer.feature_ids.len(),
                    fmt_opt(lo),
                    fmt_opt(hi)
                );
            }
        }
    }
    Ok(())
}

fn cmd_export(mut dash: Dashboard<Box<dyn JsonSource>>, args: ExportArgs) -> Result<()> {
    apply_state(&mut dash, &args.state)?;
    let rows = dash.frame();
    let fmt = match args.format {
        Some(OutFormat::Csv) => "csv",
        Some(OutFormat::Json) => "json",
        None => args.out.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
    }
    .to_ascii_lowercase();
    match fmt.as_str() {
        "csv" => storage::save_frame_csv(&rows, &args.out)?,
        "json" => storage::save_frame_json(&rows, &args.out)?,
        other => anyhow::bail!("unsupported format: {}", other),
    }
    eprintln!("Saved {} rows to {}", rows.len(), args.out.display());
    Ok(())
}
