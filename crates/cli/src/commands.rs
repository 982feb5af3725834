use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use humanize_client::HumanizeApi;
use humanize_core::batch::{validate_source_file, BatchItemStatus};
use humanize_core::request::{JobParameters, JobRequest};
use humanize_core::status::JobMetrics;
use humanize_core::style::{derive_parameters, select_profile};
use humanize_core::types::ItemId;
use humanize_events::{EventBus, EventEnvelope, WorkflowEvent};
use humanize_pipeline::history::SavedResult;
use humanize_pipeline::{export, BatchWorkflow, HumanizeWorkflow, RecentResults};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::{Args, Command, ParamArgs};
use crate::config::ClientConfig;

pub async fn dispatch(args: Args) -> Result<()> {
    let config = ClientConfig::from_env()?;

    match args.cmd {
        Command::Run {
            text,
            file,
            params,
            out_dir,
            save,
            metrics,
        } => {
            let input = match (text, file) {
                (Some(text), _) => Input::Text(text),
                (None, Some(path)) => Input::File(path),
                (None, None) => bail!("Provide --text or --file"),
            };
            let opts = RunOptions {
                out_dir,
                save,
                metrics,
            };
            run(&config, input, &params, opts).await
        }
        Command::Batch {
            files,
            params,
            out_dir,
        } => batch(&config, &files, &params, out_dir.as_deref()).await,
        Command::Profiles {} => profiles(&config).await,
        Command::History { full } => history(&config, full).await,
    }
}

fn build_api(config: &ClientConfig) -> Result<Arc<HumanizeApi>> {
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let api = HumanizeApi::with_client(client, &config.api_url);
    let api = match &config.api_token {
        Some(token) => api.with_token(token),
        None => api,
    };
    Ok(Arc::new(api))
}

/// Flag values, then the selected style profile's metrics on top.
async fn resolve_parameters(api: &HumanizeApi, params: &ParamArgs) -> Result<JobParameters> {
    let base = params.to_parameters()?;
    let Some(wanted) = &params.profile else {
        return Ok(base);
    };

    let profiles = api
        .list_style_profiles()
        .await
        .context("Failed to load style profiles")?;
    let profile = profiles
        .iter()
        .find(|p| p.id == *wanted || p.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| anyhow!("No style profile matches '{wanted}'"))?;

    info!(profile = %profile.name, "Applied style profile");
    Ok(select_profile(Some(profile), &base))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

enum Input {
    Text(String),
    File(PathBuf),
}

struct RunOptions {
    out_dir: Option<PathBuf>,
    save: bool,
    metrics: bool,
}

async fn run(
    config: &ClientConfig,
    input: Input,
    params: &ParamArgs,
    opts: RunOptions,
) -> Result<()> {
    let api = build_api(config)?;
    let parameters = resolve_parameters(&api, params).await?;

    let events = Arc::new(EventBus::default());
    let workflow = HumanizeWorkflow::new(api, config.poll).with_events(Arc::clone(&events));
    let progress = tokio::spawn(report_progress(events.subscribe(), HashMap::new()));

    let text = match input {
        Input::Text(text) => text,
        Input::File(path) => {
            let (name, bytes) = read_source(&path).await?;
            workflow.extract_text(&name, bytes).await?
        }
    };
    let request = JobRequest::new(text, parameters)?;

    // Dropping the run on Ctrl-C cancels its poll.
    let done = tokio::select! {
        result = workflow.run(&request) => result?,
        _ = tokio::signal::ctrl_c() => bail!("Processing cancelled"),
    };
    progress.abort();

    println!("{}", done.output_text);
    if opts.metrics {
        print_metrics(done.metrics.as_ref());
    }
    if let Some(watermark) = &done.watermark_id {
        eprintln!("Watermark id: {watermark}");
    }

    if let Some(dir) = &opts.out_dir {
        export::write_single(dir, &done.output_text).await?;
    }
    if opts.save {
        let mut history =
            RecentResults::load(&config.history_path, config.history_capacity).await?;
        history
            .record(SavedResult::new(
                request.text(),
                done.output_text.as_str(),
                done.metrics.clone(),
                request.parameters().clone(),
            ))
            .await?;
        info!(path = %config.history_path.display(), "Saved result");
    }
    Ok(())
}

async fn read_source(path: &Path) -> Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
    let size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?
        .len();
    validate_source_file(&name, size)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    Ok((name, bytes))
}

fn print_metrics(metrics: Option<&JobMetrics>) {
    let Some(metrics) = metrics else {
        eprintln!("No metrics reported");
        return;
    };
    let show = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    for pair in metrics.pairs() {
        let delta = pair.delta().map(|d| format!(" ({d:+.2})")).unwrap_or_default();
        eprintln!(
            "{:<24} {:>8} -> {:<8}{delta}",
            pair.label,
            show(pair.before),
            show(pair.after)
        );
    }
}

// ---------------------------------------------------------------------------
// batch
// ---------------------------------------------------------------------------

async fn batch(
    config: &ClientConfig,
    files: &[PathBuf],
    params: &ParamArgs,
    out_dir: Option<&Path>,
) -> Result<()> {
    let api = build_api(config)?;
    let parameters = resolve_parameters(&api, params).await?;

    let events = Arc::new(EventBus::default());
    let batch = BatchWorkflow::new(api, config.batch).with_events(Arc::clone(&events));
    batch.set_parameters(parameters);

    let mut names = HashMap::new();
    for path in files {
        match batch.add_path(path).await {
            Ok(id) => {
                names.insert(id, path.display().to_string());
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping file"),
        }
    }
    if names.is_empty() {
        bail!("No pending files to process");
    }
    info!(files = names.len(), "Added file(s) to queue");

    let progress = tokio::spawn(report_progress(events.subscribe(), names));

    let run = batch.run();
    tokio::pin!(run);
    let items = tokio::select! {
        items = &mut run => items,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; cancelling in-flight items");
            batch.cancel_all();
            run.await
        }
    };
    progress.abort();

    for item in &items {
        let detail = item.error.as_deref().unwrap_or_default();
        println!(
            "{:<10} {:<40} {:>10} {detail}",
            item.status.label(),
            item.name,
            item.size_kib()
        );
    }

    if let Some(dir) = out_dir {
        let outputs = batch.collect_completed().await;
        if outputs.is_empty() {
            warn!("No completed files to download");
        } else {
            let written = export::write_batch(dir, &outputs).await?;
            info!(files = written.len(), dir = %dir.display(), "Exported batch results");
        }
    }

    let failed = items
        .iter()
        .filter(|i| i.status == BatchItemStatus::Failed)
        .count();
    if failed > 0 {
        warn!(failed, "Some files failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// profiles / history
// ---------------------------------------------------------------------------

async fn profiles(config: &ClientConfig) -> Result<()> {
    let api = build_api(config)?;
    let profiles = api
        .list_style_profiles()
        .await
        .context("Failed to load style profiles")?;
    if profiles.is_empty() {
        println!("No style profiles");
        return Ok(());
    }

    let base = JobParameters::default();
    for profile in &profiles {
        let derived = derive_parameters(profile, &base);
        println!(
            "{}  {}  formality={:.2} burstiness={:.2} conciseness={:.2}",
            profile.id, profile.name, derived.formality, derived.burstiness, derived.conciseness
        );
        if let Some(description) = profile.description.as_deref().filter(|d| !d.is_empty()) {
            println!("    {description}");
        }
    }
    Ok(())
}

async fn history(config: &ClientConfig, full: bool) -> Result<()> {
    let history = RecentResults::load(&config.history_path, config.history_capacity).await?;
    if history.is_empty() {
        println!("No saved results");
        return Ok(());
    }

    for (n, entry) in history.entries().iter().enumerate() {
        println!(
            "{}. {} [{}] {}",
            n + 1,
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.parameters.tone.as_str(),
            preview(&entry.original, 60)
        );
        if full {
            println!("{}\n", entry.humanized);
        }
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

// ---------------------------------------------------------------------------
// progress
// ---------------------------------------------------------------------------

/// Log workflow events as they arrive, naming batch items by file.
async fn report_progress(
    mut rx: broadcast::Receiver<EventEnvelope>,
    names: HashMap<ItemId, String>,
) {
    loop {
        let envelope = match rx.recv().await {
            Ok(envelope) => envelope,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress display fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match envelope.event {
            WorkflowEvent::JobStatusChanged { job_id, state } => {
                info!(job_id = %job_id, state = state.as_str(), "Job status");
            }
            WorkflowEvent::BatchItemUpdated { item_id, status } => {
                let name = names.get(&item_id).map(String::as_str).unwrap_or("?");
                info!(file = name, status = status.label(), "Batch item");
            }
            _ => {}
        }
    }
}
