use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info, warn};

use crate::config::{AssetsConfig, StyleConfig};

/// Joins the finished segments into the final video. Tries a lossless
/// stream copy first; when the demuxer refuses (parameter mismatch
/// between segments), falls back to a re-encode.
pub fn assemble_video(
    segments: &[PathBuf],
    assets: &AssetsConfig,
    style: &StyleConfig,
) -> anyhow::Result<()> {
    if segments.is_empty() {
        anyhow::bail!("no segments to assemble");
    }

    let concat_list = assets.temp_dir.join("segments.txt");
    write_concat_list(segments, &concat_list)?;
    info!("created concat list {}", concat_list.display());

    let list = concat_list.display().to_string();
    let out = assets.out.display().to_string();

    let status = Command::new("ffmpeg")
        .args(["-y", "-f", "concat", "-safe", "0", "-i", &list, "-c", "copy", &out])
        .status()?;

    if !status.success() {
        warn!("concat with stream copy failed; retrying with re-encode");
        let fps = style.fps.to_string();
        let status2 = Command::new("ffmpeg")
            .args([
                "-y", "-f", "concat", "-safe", "0", "-i", &list, "-c:v", "libx264", "-pix_fmt",
                "yuv420p", "-c:a", "aac", "-r", &fps, &out,
            ])
            .status()?;
        if !status2.success() {
            error!("ffmpeg failed to concatenate segments");
            anyhow::bail!("ffmpeg failed to concatenate segments");
        }
    }
    info!("final video written to {}", assets.out.display());
    Ok(())
}

/// Concat demuxer input: one `file 'name'` line per segment. Paths are
/// written relative to the list file, which ffmpeg resolves against the
/// list's own directory.
fn write_concat_list(segments: &[PathBuf], list_path: &Path) -> anyhow::Result<()> {
    let mut f = File::create(list_path)?;
    for segment in segments {
        let name = segment
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid segment filename"))?;
        writeln!(f, "file '{}'", name)?;
    }
    Ok(())
}

/// Removes the per-run scratch directory. Failures are logged and
/// swallowed; a leftover temp dir must never fail the run.
pub fn cleanup_temp(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(dir) {
        warn!("temp cleanup failed for {}: {}", dir.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_list_names_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("segments.txt");
        let segments = vec![
            dir.path().join("segment_0.mp4"),
            dir.path().join("segment_2.mp4"),
            dir.path().join("segment_5.mp4"),
        ];
        write_concat_list(&segments, &list).unwrap();
        let written = fs::read_to_string(&list).unwrap();
        assert_eq!(
            written,
            "file 'segment_0.mp4'\nfile 'segment_2.mp4'\nfile 'segment_5.mp4'\n"
        );
    }

    #[test]
    fn assembling_nothing_is_an_error() {
        let assets = AssetsConfig::default();
        let style = StyleConfig::default();
        assert!(assemble_video(&[], &assets, &style).is_err());
    }

    #[test]
    fn cleanup_tolerates_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never_created");
        cleanup_temp(&gone);

        let real = dir.path().join("scratch");
        fs::create_dir_all(real.join("downloads")).unwrap();
        fs::write(real.join("voice_0.mp3"), b"x").unwrap();
        cleanup_temp(&real);
        assert!(!real.exists());
    }
}
