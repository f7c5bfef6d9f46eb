use clap::Parser;
use std::env;
use std::fs;
use tracing::{error, info, warn};

mod args;
mod assemble;
mod audio;
mod caption;
mod config;
mod dialogue;
mod news;
mod script;
mod segment;
mod tts;
mod webdriver;
mod webtts;

use crate::args::Args;
use crate::assemble::{assemble_video, cleanup_temp};
use crate::audio::AudioClip;
use crate::caption::CaptionRenderer;
use crate::config::Config;
use crate::segment::{compose_segment, plan_segments};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter("info") // set to "debug" for more logs
        .init();

    info!("Starting headline video pipeline");

    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    args.apply(&mut cfg);

    if !cfg.assets.background.exists() {
        error!(
            "Background video not found: {}",
            cfg.assets.background.display()
        );
        std::process::exit(1);
    }
    for character in &cfg.cast.characters {
        if !character.image.exists() {
            warn!(
                "Image for {} missing ({}); their segments will be skipped",
                character.name,
                character.image.display()
            );
        }
        if !character.sample.exists() {
            warn!(
                "Voice sample for {} missing ({}); their turns will likely fail",
                character.name,
                character.sample.display()
            );
        }
    }

    let news_key = match env::var("NEWS_API") {
        Ok(key) => key,
        Err(_) => {
            error!("NEWS_API environment variable is not set");
            std::process::exit(1);
        }
    };
    let script_key = match env::var("MISTRAL_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            error!("MISTRAL_API_KEY environment variable is not set");
            std::process::exit(1);
        }
    };

    if cfg.assets.temp_dir.exists() {
        info!("Removing existing temp dir {}", cfg.assets.temp_dir.display());
        fs::remove_dir_all(&cfg.assets.temp_dir)?;
    }
    fs::create_dir_all(&cfg.assets.temp_dir)?;

    let result = run(&cfg, args.article, &news_key, &script_key).await;
    if args.keep_temp {
        info!("Keeping temp dir {}", cfg.assets.temp_dir.display());
    } else {
        cleanup_temp(&cfg.assets.temp_dir);
    }
    result
}

async fn run(
    cfg: &Config,
    article_index: usize,
    news_key: &str,
    script_key: &str,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    info!(
        "Fetching top headlines (country {}, up to {})",
        cfg.news.country, cfg.news.page_size
    );
    let articles = news::fetch_top_articles(&client, &cfg.news, news_key).await?;
    if articles.is_empty() {
        anyhow::bail!("no articles available");
    }
    let Some(article) = articles.get(article_index) else {
        anyhow::bail!(
            "article index {} out of range ({} fetched)",
            article_index,
            articles.len()
        );
    };
    info!("Using headline: {}", article.title);

    let script_text = script::generate_script(
        &client,
        &cfg.script,
        script_key,
        &cfg.cast,
        &article.title,
        &article.body,
    )
    .await?;
    info!("Generated script:\n{}", script_text);

    let turns = dialogue::parse_script(&script_text, &cfg.cast);
    info!("Parsed {} dialogue turns", turns.len());
    if turns.is_empty() {
        anyhow::bail!("script produced no usable dialogue");
    }

    let mut backend = tts::make_backend(cfg).await?;
    let mut clips: Vec<Option<AudioClip>> = Vec::new();
    for (i, turn) in turns.iter().enumerate() {
        let character = cfg.cast.get(turn.speaker);
        let out_path = cfg.assets.temp_dir.join(format!(
            "{}_{}.{}",
            character.name.to_lowercase(),
            i,
            backend.audio_ext()
        ));
        info!(
            "Synthesizing turn {}/{} ({}): {:.40}",
            i + 1,
            turns.len(),
            character.name,
            turn.clean_text
        );
        match backend.synthesize(character, &turn.clean_text, &out_path).await {
            Ok(()) => match AudioClip::probe(out_path) {
                Ok(clip) => clips.push(Some(clip)),
                Err(e) => {
                    warn!("Could not read audio for turn {}: {}", i, e);
                    clips.push(None);
                }
            },
            Err(e) => {
                warn!("Synthesis failed for turn {}: {}", i, e);
                clips.push(None);
            }
        }
    }
    if let Err(e) = backend.shutdown().await {
        warn!("Voice backend shutdown failed: {}", e);
    }

    let plans = plan_segments(&turns, &clips);
    info!("{} of {} turns have audio", plans.len(), turns.len());

    let bg_duration = audio::ffprobe_duration_seconds(&cfg.assets.background)?;
    let renderer = CaptionRenderer::new(&cfg.style);

    let mut segments = Vec::new();
    let mut cursor = 0.0f64;
    for plan in &plans {
        let character = cfg.cast.get(plan.speaker);
        info!(
            "Composing segment for turn {} ({})",
            plan.turn_index, character.name
        );
        match compose_segment(
            plan,
            character,
            cursor,
            bg_duration,
            &cfg.style,
            &cfg.assets,
            &renderer,
        ) {
            Ok(path) => {
                segments.push(path);
                cursor += plan.audio.duration;
            }
            Err(e) => warn!("Segment for turn {} failed, skipping: {}", plan.turn_index, e),
        }
    }

    assemble_video(&segments, &cfg.assets, &cfg.style)?;
    match audio::ffprobe_duration_seconds(&cfg.assets.out) {
        Ok(total) => info!("Done: {} ({:.2}s)", cfg.assets.out.display(), total),
        Err(e) => {
            warn!("Could not probe the finished video: {}", e);
            info!("Done: {}", cfg.assets.out.display());
        }
    }
    Ok(())
}
