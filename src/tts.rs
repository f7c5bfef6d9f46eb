use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error};

use crate::config::{BackendKind, CharacterSpec, Config, TtsConfig};

/// A voice synthesizer. Implementations differ in where the audio comes
/// from (local model vs. driven web UI) but share one contract: on Ok the
/// file at `out_path` exists and is playable; anything else is an Err and
/// the caller skips that turn.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    async fn synthesize(
        &mut self,
        character: &CharacterSpec,
        text: &str,
        out_path: &Path,
    ) -> anyhow::Result<()>;

    /// File extension of the audio this backend produces.
    fn audio_ext(&self) -> &'static str;

    /// Releases external resources. Called once after the last turn.
    async fn shutdown(&mut self) -> anyhow::Result<()>;
}

pub async fn make_backend(cfg: &Config) -> anyhow::Result<Box<dyn VoiceBackend>> {
    match cfg.tts.backend {
        BackendKind::Local => Ok(Box::new(LocalCloneBackend::new(
            &cfg.tts,
            &cfg.assets.temp_dir,
        ))),
        BackendKind::CloneSite => {
            let backend =
                crate::webtts::CloneSiteBackend::start(&cfg.tts, &cfg.assets.temp_dir).await?;
            Ok(Box::new(backend))
        }
        BackendKind::CatalogSite => {
            let backend =
                crate::webtts::CatalogSiteBackend::start(&cfg.tts, &cfg.assets.temp_dir).await?;
            Ok(Box::new(backend))
        }
    }
}

/// Two-pass local cloning: a plain base TTS render, then a tone-converter
/// pass that maps the base voice onto the character's reference timbre.
pub struct LocalCloneBackend {
    base_program: String,
    base_model: PathBuf,
    converter_program: String,
    converter_checkpoint: PathBuf,
    language: String,
    scratch_dir: PathBuf,
    counter: usize,
}

impl LocalCloneBackend {
    pub fn new(cfg: &TtsConfig, scratch_dir: &Path) -> LocalCloneBackend {
        LocalCloneBackend {
            base_program: cfg.base_tts_program.clone(),
            base_model: cfg.base_tts_model.clone(),
            converter_program: cfg.converter_program.clone(),
            converter_checkpoint: cfg.converter_checkpoint.clone(),
            language: cfg.language.clone(),
            scratch_dir: scratch_dir.to_path_buf(),
            counter: 0,
        }
    }

    fn base_pass(&self, text: &str, base_path: &Path) -> anyhow::Result<()> {
        let mut child = Command::new(&self.base_program)
            .arg("--model")
            .arg(&self.base_model)
            .arg("--output_file")
            .arg(base_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            error!("base TTS failed for {}", base_path.display());
            anyhow::bail!("base TTS command returned non-zero");
        }
        Ok(())
    }

    fn convert_pass(
        &self,
        base_path: &Path,
        reference: &Path,
        out_path: &Path,
    ) -> anyhow::Result<()> {
        let status = Command::new(&self.converter_program)
            .arg("--checkpoint")
            .arg(&self.converter_checkpoint)
            .arg("--input")
            .arg(base_path)
            .arg("--reference")
            .arg(reference)
            .arg("--language")
            .arg(&self.language)
            .arg("--output")
            .arg(out_path)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()?;
        if !status.success() {
            error!("tone conversion failed for {}", out_path.display());
            anyhow::bail!("tone converter returned non-zero");
        }
        Ok(())
    }
}

/// The precomputed embedding wins when present; otherwise the converter
/// extracts timbre from the raw sample itself.
fn reference_path(character: &CharacterSpec) -> &Path {
    character
        .embedding
        .as_deref()
        .unwrap_or(character.sample.as_path())
}

#[async_trait]
impl VoiceBackend for LocalCloneBackend {
    async fn synthesize(
        &mut self,
        character: &CharacterSpec,
        text: &str,
        out_path: &Path,
    ) -> anyhow::Result<()> {
        let base_path = self.scratch_dir.join(format!("base_{}.wav", self.counter));
        self.counter += 1;

        debug!("base pass for {} -> {}", character.name, base_path.display());
        self.base_pass(text, &base_path)?;
        let result = self.convert_pass(&base_path, reference_path(character), out_path);
        let _ = std::fs::remove_file(&base_path);
        result?;

        if !out_path.exists() {
            anyhow::bail!("converter reported success but produced no file");
        }
        Ok(())
    }

    fn audio_ext(&self) -> &'static str {
        "wav"
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cast;

    #[test]
    fn embedding_takes_precedence_over_sample() {
        let mut character = Cast::default().characters[0].clone();
        assert_eq!(reference_path(&character), Path::new("peter_clone.mp3"));
        character.embedding = Some(PathBuf::from("peter_se.pt"));
        assert_eq!(reference_path(&character), Path::new("peter_se.pt"));
    }

    #[tokio::test]
    async fn missing_base_program_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TtsConfig {
            base_tts_program: "definitely-not-a-real-tts-binary".to_string(),
            ..TtsConfig::default()
        };
        let mut backend = LocalCloneBackend::new(&cfg, dir.path());
        let character = Cast::default().characters[0].clone();
        let out = dir.path().join("out.wav");

        let res = backend.synthesize(&character, "hello", &out).await;
        assert!(res.is_err());
        assert!(!out.exists());
    }

    #[test]
    fn local_backend_produces_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalCloneBackend::new(&TtsConfig::default(), dir.path());
        assert_eq!(backend.audio_ext(), "wav");
    }
}
