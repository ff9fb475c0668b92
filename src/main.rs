mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pf_core::SafetyProfile;
use pf_pipeline::Pipeline;

const TOOL_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on
    // the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "postforge=debug,pf_core=debug,pf_av=debug,pf_pipeline=debug".to_string()
        } else {
            "info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let input = expand_path(&cli.input);
    let output_dir = cli.output_dir.as_deref().map(expand_path);
    let config_path = cli.config.as_deref().map(expand_path);

    // The environment is consulted exactly once; everything downstream
    // receives the profile as a value.
    let profile = SafetyProfile::from_env();
    if profile == SafetyProfile::Conservative {
        tracing::info!("CI environment detected, conservative defaults in effect");
    }

    let mut pipeline = Pipeline::new().with_profile(profile);
    if let Some(path) = config_path {
        pipeline = pipeline.with_base_config(path);
    }

    if cli.dry_run {
        return dry_run(&pipeline, &input, output_dir.as_deref()).await;
    }
    process(&pipeline, &input, output_dir.as_deref()).await
}

async fn process(pipeline: &Pipeline, input: &Path, output_dir: Option<&Path>) -> Result<()> {
    println!("Processing {}", input.display());

    let result = pipeline.process(input, output_dir, None).await;

    println!();
    for report in &result.reports {
        let mark = if report.success { "✓" } else { "✗" };
        println!("{} {} ({:.2}s)", mark, report.agent, report.elapsed_secs);
    }

    println!();
    if let Some(path) = &result.final_video_path {
        println!("Enhanced video: {}", path.display());
    }
    if let Some(path) = &result.captions_srt_path {
        println!("Captions: {}", path.display());
    }
    if !result.thumbnail_paths.is_empty() {
        println!("Thumbnails: {}", result.thumbnail_paths.len());
    }
    if let Some(path) = &result.processing_log_path {
        println!("Processing log: {}", path.display());
    }
    println!("Total time: {:.2}s", result.total_time_secs);

    if result.success() {
        println!("\nProcessing complete!");
        return Ok(());
    }

    for message in &result.error_messages {
        eprintln!("error: {message}");
    }
    if result.reports.is_empty() {
        anyhow::bail!("configuration error, nothing was processed");
    }
    anyhow::bail!(
        "{} of {} stages failed",
        result.error_messages.len(),
        result.reports.len()
    )
}

async fn dry_run(pipeline: &Pipeline, input: &Path, output_dir: Option<&Path>) -> Result<()> {
    println!("Dry run for {}\n", input.display());

    let report = pipeline.dry_run(input, output_dir, None).await;
    for (check, passed) in &report.checks {
        println!("  {} {}", if *passed { "✓" } else { "✗" }, check);
    }

    println!("\nTools:");
    for status in pipeline.tools().check_all(TOOL_CHECK_TIMEOUT).await {
        print_tool_status(&status);
    }

    if report.all_passed {
        println!("\nAll checks passed.");
        return Ok(());
    }
    let failed = report.checks.values().filter(|passed| !**passed).count();
    anyhow::bail!("{failed} dry-run check(s) failed")
}

fn print_tool_status(status: &pf_av::ToolStatus) {
    print!("  {} {}", if status.available { "✓" } else { "✗" }, status.name);
    if let Some(version) = &status.version {
        print!(" ({version})");
    }
    if let Some(path) = &status.path {
        print!(" - {}", path.display());
    }
    println!();
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
