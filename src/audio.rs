use hound::WavReader;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A synthesized turn on disk, with its measured duration in seconds.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub path: PathBuf,
    pub duration: f64,
}

impl AudioClip {
    pub fn probe(path: PathBuf) -> anyhow::Result<AudioClip> {
        let duration = probe_duration_seconds(&path)?;
        Ok(AudioClip { path, duration })
    }
}

pub fn probe_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wav") => wav_duration_seconds(path),
        _ => ffprobe_duration_seconds(path),
    }
}

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Container-level duration via ffprobe, for anything hound cannot read.
pub fn ffprobe_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()?;
    if !out.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr)
        );
    }
    let text = String::from_utf8_lossy(&out.stdout);
    let duration: f64 = text.trim().parse()?;
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_test_wav(path: &Path, seconds: f64, channels: u16) {
        let spec = WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let frames = (seconds * 22050.0) as usize;
        for i in 0..frames * channels as usize {
            writer.write_sample((i % 128) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_duration_counts_frames_not_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mono = dir.path().join("mono.wav");
        let stereo = dir.path().join("stereo.wav");
        write_test_wav(&mono, 1.0, 1);
        write_test_wav(&stereo, 0.5, 2);

        assert!((wav_duration_seconds(&mono).unwrap() - 1.0).abs() < 1e-6);
        assert!((wav_duration_seconds(&stereo).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn probe_dispatches_wav_files_to_hound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.WAV");
        write_test_wav(&path, 0.25, 1);
        let clip = AudioClip::probe(path.clone()).unwrap();
        assert_eq!(clip.path, path);
        assert!((clip.duration - 0.25).abs() < 1e-6);
    }
}
