use crate::{
    config::Config,
    extract::TesseractCli,
    llm::OpenAiChatClient,
    pipeline::{Pipeline, PipelineError},
    report::Report,
    server,
    util::{ensure_dir, extension_of},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "medreport-analyzer")]
#[command(about = "Medical report analyzer (PDF text / OCR + lab values + LLM summary)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./medreport.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report OCR engine and LLM configuration.
    Doctor {},
    /// Print the text extracted from a report.
    Extract {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the lab values parsed from a report as JSON.
    Labs {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the prompt that would be sent to the LLM.
    Prompt {
        #[arg(long)]
        input: PathBuf,
    },
    /// Run the whole pipeline and print the summary.
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Print the full analysis record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Serve the upload page.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = match &cfg_path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };

    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
    match &cfg_path {
        Some(p) => info!("config {}", p.display()),
        None => info!("no config file found; using defaults"),
    }

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg, cfg_path.as_deref()),
        Command::Extract { input } => extract(&cfg, input),
        Command::Labs { input } => labs(&cfg, input),
        Command::Prompt { input } => prompt(&cfg, input),
        Command::Analyze { input, json } => analyze(&cfg, input, *json),
        Command::Serve { bind } => serve(&cfg, bind.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["medreport.toml", "medreport.example.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for command output.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file || cfg.logging.file_path.is_empty() {
        return None;
    }
    Some(PathBuf::from(&cfg.logging.file_path))
}

fn doctor(cfg: &Config, cfg_path: Option<&Path>) -> Result<()> {
    let tesseract = TesseractCli::locate(&cfg.ocr);
    let tesseract_version = match &tesseract {
        Some(t) => match t.version() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("tesseract --version failed: {e}");
                None
            }
        },
        None => None,
    };
    let llm = OpenAiChatClient::from_config(&cfg.llm)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "config": cfg_path,
            "ocr": {
                "available": tesseract.is_some(),
                "tesseract": tesseract.as_ref().map(|t| t.exe()),
                "version": tesseract_version,
                "langs": cfg.ocr.langs,
            },
            "llm": {
                "base_url": llm.base_url(),
                "model": llm.model(),
                "api_key_env": cfg.llm.api_key_env,
                "api_key_present": llm.has_api_key(),
            },
            "labs": {
                "mode": cfg.labs.mode,
            },
        }))?
    );
    Ok(())
}

fn extract(cfg: &Config, input: &Path) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg)?;
    let report = load_report(cfg, input)?;
    let text = extract_text(&pipeline, &report)?;
    println!("{text}");
    Ok(())
}

fn labs(cfg: &Config, input: &Path) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg)?;
    let report = load_report(cfg, input)?;
    let text = extract_text(&pipeline, &report)?;
    let labs = pipeline.parse(&text);
    println!("{}", serde_json::to_string_pretty(&labs)?);
    Ok(())
}

fn prompt(cfg: &Config, input: &Path) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg)?;
    let report = load_report(cfg, input)?;
    let text = extract_text(&pipeline, &report)?;
    let labs = pipeline.parse(&text);
    println!("{}", pipeline.prompt(&text, &labs));
    Ok(())
}

fn analyze(cfg: &Config, input: &Path, json: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg)?;
    let report = load_report(cfg, input)?;
    let analysis = pipeline.run(&report).map_err(user_facing)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("== Extracted Text ==\n{}\n", analysis.raw_text);
    if analysis.lab_values.is_empty() {
        println!("{}\n", server::NO_LAB_VALUES);
    } else {
        println!(
            "== Parsed Lab Values ==\n{}\n",
            serde_json::to_string_pretty(&analysis.lab_values)?
        );
    }
    println!("== Detailed Summary ==\n{}", analysis.summary);
    Ok(())
}

fn serve(cfg: &Config, bind: Option<&str>) -> Result<()> {
    let bind = bind.unwrap_or(cfg.server.bind.as_str()).to_string();
    let pipeline = Arc::new(Pipeline::from_config(cfg)?);
    if !pipeline.ocr_available() {
        warn!("Tesseract OCR is not installed; image uploads will be refused");
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "building tokio runtime")?;
    let result = rt.block_on(server::serve(&bind, pipeline.clone()));
    drop(rt);
    // The blocking HTTP client inside the pipeline must be dropped outside the runtime.
    drop(pipeline);
    result
}

fn extract_text(pipeline: &Pipeline, report: &Report) -> Result<String> {
    pipeline.admit(report).map_err(user_facing)?;
    let extracted = pipeline.extract(report).map_err(user_facing)?;
    Ok(extracted.text)
}

fn user_facing(err: PipelineError) -> anyhow::Error {
    let msg = err.user_message();
    anyhow::Error::new(err).context(msg)
}

fn load_report(cfg: &Config, input: &Path) -> Result<Report> {
    validate_input(cfg, input)?;
    Report::from_path(input)
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.input.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    match extension_of(&input_str) {
        Some(ext)
            if cfg
                .input
                .allowed_extensions
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&ext)) => {}
        Some(ext) => return Err(anyhow!("unsupported input type .{ext}: {}", input.display())),
        None => return Err(anyhow!("input has no extension: {}", input.display())),
    }

    let size = std::fs::metadata(input)
        .with_context(|| "stat input")?
        .len();
    if size > cfg.input.max_bytes {
        anyhow::bail!("input exceeds input.max_bytes: {}", size);
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
