mod cli;

use camsync::{
    config::{self, Config},
    directory,
    engine::{fragments_of, HlsEngineFactory, ManifestClient},
    locator::{Segment, SegmentLocator},
    sync::{CoordinatorHandle, CoordinatorOptions, ScrubDebouncer, SyncCoordinator, SyncEvent},
    timeline, CameraId, TimelinePosition,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "camsync=trace,camsync_media=trace,camsync_common=debug".to_string()
        } else {
            "camsync=info,camsync_media=info".to_string()
        }
    });

    // Logs go to stderr so command output on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Segments {
            camera,
            date,
            durations,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_segments(&config, camera, date, durations, json))
        }
        Commands::Resolve { date, time, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let position = position_at(date, Some(&time))?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(resolve_all(&config, position, json))
        }
        Commands::Play { date, time } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let position = position_at(date, time.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(play(config, position))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("camsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn position_at(date: NaiveDate, time: Option<&str>) -> Result<TimelinePosition> {
    let offset_ms = match time {
        Some(t) => TimelinePosition::parse_time_of_day(t)?,
        None => 0,
    };
    Ok(TimelinePosition::new(date, offset_ms)?)
}

fn build_locator(config: &Config) -> Arc<SegmentLocator> {
    Arc::new(SegmentLocator::new(
        directory::create_directory(&config.directory),
        config.timeline.offset(),
        config.timeline.bucket(),
    ))
}

async fn list_segments(
    config: &Config,
    camera: CameraId,
    date: NaiveDate,
    durations: bool,
    json: bool,
) -> Result<()> {
    let locator = build_locator(config);
    let index = locator.locate(camera, date).await;

    let mut segments: Vec<Segment> = index.segments().to_vec();
    if durations {
        let client = ManifestClient::new(config.engine.request_timeout());
        let fetched = futures::future::join_all(
            segments.iter().map(|s| client.fetch(&s.source_url)),
        )
        .await;
        for (segment, playlist) in segments.iter_mut().zip(fetched) {
            match playlist {
                Ok(p) => segment.duration_secs = Some(p.total_duration()),
                Err(e) => tracing::warn!(camera = %camera, "{}", e),
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
        return Ok(());
    }

    if segments.is_empty() {
        println!("No recordings for camera {} on {}", camera, date);
        return Ok(());
    }

    let offset = config.timeline.offset();
    println!("Camera {} on {}: {} segments", camera, date, segments.len());
    for segment in &segments {
        print!(
            "  {}  {} - {}",
            segment.identifier,
            segment.coverage_start.with_timezone(&offset).format("%H:%M:%S"),
            segment.coverage_end.with_timezone(&offset).format("%H:%M:%S"),
        );
        if let Some(duration) = segment.duration_secs {
            print!("  ({:.1}s)", duration);
        }
        println!();
        println!("      {}", segment.source_url);
        println!("      download: {}", segment.download_url());
    }

    Ok(())
}

#[derive(Serialize)]
struct ResolvedCamera {
    camera: CameraId,
    segment: Option<Segment>,
    offset_secs: Option<f64>,
    error: Option<String>,
}

async fn resolve_camera(
    locator: &SegmentLocator,
    client: &ManifestClient,
    camera: CameraId,
    position: TimelinePosition,
    utc_offset: chrono::FixedOffset,
) -> ResolvedCamera {
    let target = position.absolute(utc_offset);
    let index = locator.locate(camera, position.date()).await;

    let Some(segment) = timeline::resolve(index.segments(), target).cloned() else {
        return ResolvedCamera {
            camera,
            segment: None,
            offset_secs: None,
            error: None,
        };
    };

    let seeked = match client.fetch(&segment.source_url).await {
        Ok(playlist) => timeline::seek(&fragments_of(&playlist), target)
            .map(|offset| (offset, playlist.total_duration())),
        Err(e) => Err(e),
    };

    match seeked {
        Ok((offset, duration)) => ResolvedCamera {
            camera,
            segment: Some(Segment {
                duration_secs: Some(duration),
                ..segment
            }),
            offset_secs: Some(offset),
            error: None,
        },
        Err(e) => {
            tracing::warn!(camera = %camera, "{}", e);
            ResolvedCamera {
                camera,
                segment: Some(segment),
                offset_secs: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn resolve_all(config: &Config, position: TimelinePosition, json: bool) -> Result<()> {
    let locator = build_locator(config);
    let client = ManifestClient::new(config.engine.request_timeout());
    let utc_offset = config.timeline.offset();

    let rows = futures::future::join_all(
        config
            .cameras
            .ids()
            .filter(|&c| config.cameras.starts_enabled(c))
            .map(|camera| resolve_camera(&locator, &client, camera, position, utc_offset)),
    )
    .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Position: {}", position);
    for row in &rows {
        match (&row.segment, row.offset_secs, &row.error) {
            (None, _, _) => println!("  cam{}: no recording", row.camera),
            (Some(segment), Some(offset), _) => println!(
                "  cam{}: {} @ {:.3}s",
                row.camera, segment.identifier, offset
            ),
            (Some(segment), None, error) => println!(
                "  cam{}: {} unavailable ({})",
                row.camera,
                segment.identifier,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    Ok(())
}

async fn play(config: Config, position: TimelinePosition) -> Result<()> {
    let locator = build_locator(&config);
    let factory = Arc::new(HlsEngineFactory::new(ManifestClient::new(
        config.engine.request_timeout(),
    )));

    let (handle, mut events) = SyncCoordinator::spawn(
        locator,
        factory,
        CoordinatorOptions::from_config(&config, position),
    );

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });

    let debouncer = ScrubDebouncer::spawn(config.scrub.window(), handle.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if let Err(e) = play_command(&handle, &debouncer, line).await {
            eprintln!("{:#}", e);
        }
    }

    debouncer.close().await;
    let snapshot = handle.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    handle.shutdown().await?;
    printer.abort();

    Ok(())
}

async fn play_command(
    handle: &CoordinatorHandle,
    debouncer: &ScrubDebouncer,
    line: &str,
) -> Result<()> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("play"), None) => handle.play().await?,
        (Some("pause"), None) => handle.pause().await?,
        (Some("status"), None) => {
            let snapshot = handle.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        (Some("date"), Some(date)) => {
            let date: NaiveDate = date
                .parse()
                .with_context(|| format!("Invalid date: {}", date))?;
            handle.set_date(date).await?;
        }
        (Some("toggle"), Some(camera)) => {
            let camera: CameraId = camera.parse()?;
            let snapshot = handle.snapshot().await?;
            let enabled = snapshot
                .camera(camera)
                .map(|c| c.enabled)
                .with_context(|| format!("Unknown camera: {}", camera))?;
            handle.set_enabled(camera, !enabled).await?;
        }
        (Some(time), None) => {
            let offset_ms = TimelinePosition::parse_time_of_day(time)?;
            debouncer.push(offset_ms);
        }
        _ => anyhow::bail!("Unrecognized command: {}", line),
    }
    Ok(())
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Loading { camera, url } => println!("cam{}: loading {}", camera, url),
        SyncEvent::Seeked {
            camera,
            offset_secs,
            ..
        } => println!("cam{}: seeked to {:.3}s", camera, offset_secs),
        SyncEvent::NoRecording { camera, .. } => println!("cam{}: no recording", camera),
        SyncEvent::Unavailable { camera, reason } => {
            println!("cam{}: unavailable ({})", camera, reason)
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            config::validate_config(&config)?;
            print_config_summary(&config);
        }
    }

    Ok(())
}

fn print_config_summary(config: &Config) {
    println!("  Directory: {:?}", config.directory.kind);
    match config.directory.kind {
        config::DirectoryKind::Http => println!("    Base URL: {}", config.directory.base_url),
        config::DirectoryKind::Fs => println!(
            "    Root: {}",
            config
                .directory
                .root
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
    }
    println!("  Cameras: {}", config.cameras.count);
    println!(
        "    Enabled: {}",
        config
            .cameras
            .ids()
            .filter(|&c| config.cameras.starts_enabled(c))
            .count()
    );
    println!("  UTC offset: {}", config.timeline.offset());
    println!("  Bucket: {}s", config.timeline.bucket_secs);
    println!("  Scrub debounce: {}ms", config.scrub.debounce_ms);
}
