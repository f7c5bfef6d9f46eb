use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::audio::AudioClip;
use crate::caption::{CaptionRenderer, plan_captions};
use crate::config::{AssetsConfig, CharacterSpec, SlideSide, StyleConfig};
use crate::dialogue::DialogueTurn;

/// A turn that survived synthesis and will become one video segment.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    pub turn_index: usize,
    pub speaker: usize,
    pub raw_text: String,
    pub audio: AudioClip,
}

/// Pairs turns with their synthesized clips, dropping turns whose
/// synthesis failed. Order is preserved; with N turns and K failures the
/// result has N-K entries.
pub fn plan_segments(turns: &[DialogueTurn], clips: &[Option<AudioClip>]) -> Vec<SegmentPlan> {
    turns
        .iter()
        .zip(clips.iter())
        .enumerate()
        .filter_map(|(i, (turn, clip))| {
            clip.as_ref().map(|audio| SegmentPlan {
                turn_index: i,
                speaker: turn.speaker,
                raw_text: turn.raw_text.clone(),
                audio: audio.clone(),
            })
        })
        .collect()
}

/// Where to read background video from for a segment: seek offset into
/// the (possibly repeated) source, plus how many extra repetitions the
/// demuxer must add so the window never runs short.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundWindow {
    pub start: f64,
    pub extra_loops: u32,
}

pub fn background_window(
    cursor: f64,
    need: f64,
    bg_duration: f64,
) -> anyhow::Result<BackgroundWindow> {
    if bg_duration <= f64::EPSILON {
        anyhow::bail!("background video has no duration");
    }
    let start = cursor % bg_duration;
    let copies = if start + need <= bg_duration {
        1
    } else {
        ((start + need) / bg_duration).floor() as u32 + 1
    };
    Ok(BackgroundWindow {
        start,
        extra_loops: copies - 1,
    })
}

/// The overlay x position over time: a smoothstep ease from fully
/// off-screen to a resting spot `margin` pixels inside the frame edge.
/// Written in ffmpeg expression syntax; `w` and `W` resolve to overlay
/// and frame width at evaluation time.
pub fn slide_position_expr(side: SlideSide, margin: u32, slide_secs: f64) -> String {
    let eased = if slide_secs > f64::EPSILON {
        format!(
            "pow(min(t/{s},1),2)*(3-2*min(t/{s},1))",
            s = slide_secs
        )
    } else {
        "1".to_string()
    };
    match side {
        SlideSide::Left => format!("-w+((w+{})*{})", margin, eased),
        SlideSide::Right => format!("W-((w+{})*{})", margin, eased),
    }
}

struct SegmentJob<'a> {
    background: &'a Path,
    window: BackgroundWindow,
    duration: f64,
    audio: &'a Path,
    character_image: &'a Path,
    side: SlideSide,
    cards: &'a [(PathBuf, f64, f64)],
    style: &'a StyleConfig,
    out: &'a Path,
}

fn build_segment_args(job: &SegmentJob) -> Vec<String> {
    let style = job.style;
    let fade = style.fade_secs;
    let fade_out_start = (job.duration - fade).max(0.0);
    let char_height = (style.frame_height as f64 * style.character_frac) as u32;
    let caption_y = style.frame_height - style.caption_bottom;

    let mut args: Vec<String> = vec!["-y".into()];
    if job.window.extra_loops > 0 {
        args.push("-stream_loop".into());
        args.push(job.window.extra_loops.to_string());
    }
    args.push("-i".into());
    args.push(job.background.display().to_string());
    args.push("-i".into());
    args.push(job.audio.display().to_string());
    args.push("-i".into());
    args.push(job.character_image.display().to_string());
    for (path, _, _) in job.cards {
        args.push("-i".into());
        args.push(path.display().to_string());
    }

    let mut filter = format!(
        "[0:v]trim=start={:.3}:duration={:.3},setpts=PTS-STARTPTS,scale={}:{},setsar=1[bg];",
        job.window.start, job.duration, style.frame_width, style.frame_height
    );
    filter.push_str(&format!("[2:v]scale=-1:{}[char];", char_height));
    filter.push_str(&format!(
        "[bg][char]overlay=x='{}':y=H-h-{}[vchar];",
        slide_position_expr(job.side, style.overlay_margin, style.slide_secs),
        style.overlay_margin
    ));
    let mut current = "[vchar]".to_string();
    let mut input_idx = 3;

    for (i, (_, start, card_dur)) in job.cards.iter().enumerate() {
        let label = format!("[vcap{}]", i);
        filter.push_str(&format!(
            "{}[{}:v]overlay=x=(W-w)/2:y={}:enable='between(t,{:.3},{:.3})'{};",
            current,
            input_idx,
            caption_y,
            start,
            start + card_dur,
            label
        ));
        current = label;
        input_idx += 1;
    }

    filter.push_str(&format!(
        "{}fade=t=in:st=0:d={f},fade=t=out:st={st:.3}:d={f}[vout];",
        current,
        f = fade,
        st = fade_out_start
    ));
    filter.push_str(&format!(
        "[1:a]afade=t=in:st=0:d={f},afade=t=out:st={st:.3}:d={f}[aout]",
        f = fade,
        st = fade_out_start
    ));

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[vout]".into(),
        "-map".into(),
        "[aout]".into(),
        "-r".into(),
        style.fps.to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-t".into(),
        format!("{:.3}", job.duration),
        job.out.display().to_string(),
    ]);
    args
}

/// Renders one turn into a finished segment: background window, sliding
/// character, caption cards, fades and the turn's audio, in a single
/// ffmpeg pass. An Err here means the caller drops the turn and the time
/// cursor stays put.
pub fn compose_segment(
    plan: &SegmentPlan,
    character: &CharacterSpec,
    cursor: f64,
    bg_duration: f64,
    style: &StyleConfig,
    assets: &AssetsConfig,
    renderer: &CaptionRenderer,
) -> anyhow::Result<PathBuf> {
    if !character.image.exists() {
        anyhow::bail!(
            "character image {} missing",
            character.image.display()
        );
    }
    let duration = plan.audio.duration;
    let window = background_window(cursor, duration, bg_duration)?;

    let mut cards = Vec::new();
    for (i, card) in plan_captions(&plan.raw_text, duration, style).iter().enumerate() {
        let path = assets
            .temp_dir
            .join(format!("caption_{}_{}.png", plan.turn_index, i));
        match renderer.render_phrase(&card.text, &path) {
            Ok(_) => cards.push((path, card.start, card.duration)),
            Err(e) => warn!("caption render failed, dropping card: {}", e),
        }
    }

    let out = assets.temp_dir.join(format!("segment_{}.mp4", plan.turn_index));
    let job = SegmentJob {
        background: &assets.background,
        window,
        duration,
        audio: &plan.audio.path,
        character_image: &character.image,
        side: character.side,
        cards: &cards,
        style,
        out: &out,
    };
    let args = build_segment_args(&job);
    debug!("ffmpeg {}", args.join(" "));

    let output = Command::new("ffmpeg").args(&args).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg failed composing segment {}: {}",
            plan.turn_index,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    info!(
        "segment {} composed ({:.2}s, {} captions)",
        plan.turn_index,
        duration,
        cards.len()
    );
    Ok(out)
}
