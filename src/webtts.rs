use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{CharacterSpec, TtsConfig};
use crate::tts::VoiceBackend;
use crate::webdriver::{BrowserSession, list_files, wait_for_download};

const CLONE_TEXTAREA: &str = "textarea[placeholder='Enter the text you want AI to speak here']";
const CATALOG_TEXTAREA: &str = "textarea";
const START_CLONING_BTN: &str = "//button[contains(., 'Start Voice Cloning')]";
const CLONE_VOICE_BTN: &str = "//button[.//span[contains(text(), 'CLONE VOICE')]]";
const GENERATE_BTN: &str = "//button[contains(., 'Generate Voiceover')]";
const DOWNLOAD_BTN: &str = "//button[.//svg[@data-icon='download']]";

/// Drives the voice-cloning page: upload the character's reference
/// sample, clone, then generate speech for each turn. The page gives no
/// completion callback, so readiness is inferred by polling for the next
/// control to appear.
pub struct CloneSiteBackend {
    session: BrowserSession,
    cfg: TtsConfig,
    download_dir: PathBuf,
}

impl CloneSiteBackend {
    pub async fn start(cfg: &TtsConfig, temp_dir: &Path) -> anyhow::Result<CloneSiteBackend> {
        let (session, download_dir) = start_session(cfg, temp_dir).await?;
        Ok(CloneSiteBackend {
            session,
            cfg: cfg.clone(),
            download_dir,
        })
    }
}

#[async_trait]
impl VoiceBackend for CloneSiteBackend {
    async fn synthesize(
        &mut self,
        character: &CharacterSpec,
        text: &str,
        out_path: &Path,
    ) -> anyhow::Result<()> {
        // Upload wants an absolute path on the machine running the browser.
        let sample = std::fs::canonicalize(&character.sample)?;
        let el_deadline = Duration::from_secs(self.cfg.element_deadline_secs);
        let poll = Duration::from_millis(self.cfg.poll_interval_ms);

        info!("cloning voice for {} via {}", character.name, self.cfg.clone_site_url);
        self.session.goto(&self.cfg.clone_site_url).await?;

        let start = self
            .session
            .wait_xpath(START_CLONING_BTN, el_deadline, poll)
            .await?;
        self.session.click(&start).await?;

        let file_input = self
            .session
            .wait_css("input[type='file']", el_deadline, poll)
            .await?;
        self.session
            .send_keys(&file_input, &sample.display().to_string())
            .await?;

        let clone_btn = self
            .session
            .wait_xpath(CLONE_VOICE_BTN, el_deadline, poll)
            .await?;
        self.session.click(&clone_btn).await?;

        generate_and_download(
            &self.session,
            &self.cfg,
            CLONE_TEXTAREA,
            text,
            out_path,
            &self.download_dir,
        )
        .await
    }

    fn audio_ext(&self) -> &'static str {
        "mp3"
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.session.close().await
    }
}

/// Same automation against the prebuilt voice catalog: pick the voice
/// card matching the character's configured catalog name, then generate.
pub struct CatalogSiteBackend {
    session: BrowserSession,
    cfg: TtsConfig,
    download_dir: PathBuf,
}

impl CatalogSiteBackend {
    pub async fn start(cfg: &TtsConfig, temp_dir: &Path) -> anyhow::Result<CatalogSiteBackend> {
        let (session, download_dir) = start_session(cfg, temp_dir).await?;
        Ok(CatalogSiteBackend {
            session,
            cfg: cfg.clone(),
            download_dir,
        })
    }
}

#[async_trait]
impl VoiceBackend for CatalogSiteBackend {
    async fn synthesize(
        &mut self,
        character: &CharacterSpec,
        text: &str,
        out_path: &Path,
    ) -> anyhow::Result<()> {
        let Some(voice) = &character.catalog_voice else {
            anyhow::bail!("character {} has no catalog voice configured", character.name);
        };
        let el_deadline = Duration::from_secs(self.cfg.element_deadline_secs);
        let poll = Duration::from_millis(self.cfg.poll_interval_ms);

        info!("selecting catalog voice {:?} for {}", voice, character.name);
        self.session.goto(&self.cfg.catalog_site_url).await?;

        let card = self
            .session
            .wait_xpath(&voice_card_xpath(voice), el_deadline, poll)
            .await?;
        self.session.click(&card).await?;

        generate_and_download(
            &self.session,
            &self.cfg,
            CATALOG_TEXTAREA,
            text,
            out_path,
            &self.download_dir,
        )
        .await
    }

    fn audio_ext(&self) -> &'static str {
        "mp3"
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.session.close().await
    }
}

async fn start_session(
    cfg: &TtsConfig,
    temp_dir: &Path,
) -> anyhow::Result<(BrowserSession, PathBuf)> {
    let download_dir = temp_dir.join("downloads");
    std::fs::create_dir_all(&download_dir)?;
    let download_dir = download_dir.canonicalize()?;
    let session = BrowserSession::start(&cfg.webdriver_url, cfg.headless, &download_dir).await?;
    Ok((session, download_dir))
}

/// Shared tail of both flows: type the line, trigger generation, then
/// treat the download button's appearance as the completion signal and
/// collect the file it fetches. A deadline that passes with no file on
/// disk is this backend's failure mode.
async fn generate_and_download(
    session: &BrowserSession,
    cfg: &TtsConfig,
    textarea_selector: &str,
    text: &str,
    out_path: &Path,
    download_dir: &Path,
) -> anyhow::Result<()> {
    let el_deadline = Duration::from_secs(cfg.element_deadline_secs);
    let dl_deadline = Duration::from_secs(cfg.download_deadline_secs);
    let poll = Duration::from_millis(cfg.poll_interval_ms);

    let textarea = session
        .wait_css(textarea_selector, el_deadline, poll)
        .await?;
    session.clear(&textarea).await?;
    session.send_keys(&textarea, text).await?;

    let generate = session.wait_xpath(GENERATE_BTN, el_deadline, poll).await?;
    session.click(&generate).await?;

    let known = list_files(download_dir)?;
    let download = session.wait_xpath(DOWNLOAD_BTN, dl_deadline, poll).await?;
    session.click(&download).await?;

    let fetched = wait_for_download(download_dir, &known, dl_deadline, poll).await?;
    debug!("download landed at {}", fetched.display());
    std::fs::rename(&fetched, out_path)?;

    if !out_path.exists() {
        anyhow::bail!("no audio present at {}", out_path.display());
    }
    Ok(())
}

fn voice_card_xpath(voice: &str) -> String {
    format!(
        "(//button[contains(., '{v}')] | //a[contains(., '{v}')])[1]",
        v = voice
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_card_xpath_embeds_the_catalog_name() {
        let xp = voice_card_xpath("Peter Griffin");
        assert!(xp.contains("contains(., 'Peter Griffin')"));
        assert!(xp.starts_with('('));
        assert!(xp.ends_with("[1]"));
    }
}
