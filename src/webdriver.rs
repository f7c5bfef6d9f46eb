use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// W3C element identifier key in find-element responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone)]
pub struct Element {
    id: String,
}

/// One browser session against a WebDriver endpoint, speaking the plain
/// W3C REST protocol.
pub struct BrowserSession {
    http: reqwest::Client,
    base: String,
    session_id: String,
}

impl BrowserSession {
    /// Starts a session with downloads routed to `download_dir`.
    pub async fn start(
        webdriver_url: &str,
        headless: bool,
        download_dir: &Path,
    ) -> anyhow::Result<BrowserSession> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--window-size=1280,1024".to_string(),
        ];
        if headless {
            args.push("--headless=new".to_string());
        }
        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": download_dir.display().to_string(),
                            "download.prompt_for_download": false,
                            "safebrowsing.enabled": true
                        }
                    }
                }
            }
        });

        let http = reqwest::Client::new();
        let base = webdriver_url.trim_end_matches('/').to_string();
        let value = post_checked(&http, &format!("{}/session", base), &caps).await?;
        let session_id = value
            .pointer("/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("webdriver session response missing sessionId"))?
            .to_string();
        debug!("webdriver session started: {}", session_id);
        Ok(BrowserSession {
            http,
            base,
            session_id,
        })
    }

    pub async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.post("url", &json!({ "url": url })).await?;
        Ok(())
    }

    async fn find(&self, using: &str, value: &str) -> anyhow::Result<Element> {
        let body = json!({ "using": using, "value": value });
        let resp = self.post("element", &body).await?;
        let id = resp
            .pointer(&format!("/{}", ELEMENT_KEY))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("element response missing id for {:?}", value))?
            .to_string();
        Ok(Element { id })
    }

    /// Retries a locator until it resolves or the deadline passes.
    pub async fn wait_css(
        &self,
        selector: &str,
        deadline: Duration,
        poll: Duration,
    ) -> anyhow::Result<Element> {
        self.wait("css selector", selector, deadline, poll).await
    }

    pub async fn wait_xpath(
        &self,
        expr: &str,
        deadline: Duration,
        poll: Duration,
    ) -> anyhow::Result<Element> {
        self.wait("xpath", expr, deadline, poll).await
    }

    async fn wait(
        &self,
        using: &str,
        value: &str,
        deadline: Duration,
        poll: Duration,
    ) -> anyhow::Result<Element> {
        let started = Instant::now();
        loop {
            match self.find(using, value).await {
                Ok(el) => return Ok(el),
                Err(e) => {
                    if started.elapsed() >= deadline {
                        anyhow::bail!(
                            "element {:?} not found within {:?}: {}",
                            value,
                            deadline,
                            e
                        );
                    }
                    tokio::time::sleep(poll).await;
                }
            }
        }
    }

    pub async fn click(&self, el: &Element) -> anyhow::Result<()> {
        self.post(&format!("element/{}/click", el.id), &json!({}))
            .await?;
        Ok(())
    }

    /// Sends keystrokes. On an `<input type=file>` element the text is a
    /// local path and performs the upload.
    pub async fn send_keys(&self, el: &Element, text: &str) -> anyhow::Result<()> {
        self.post(&format!("element/{}/value", el.id), &json!({ "text": text }))
            .await?;
        Ok(())
    }

    pub async fn clear(&self, el: &Element) -> anyhow::Result<()> {
        self.post(&format!("element/{}/clear", el.id), &json!({}))
            .await?;
        Ok(())
    }

    /// Ends the session. Safe to call once at shutdown; the browser dies
    /// with it.
    pub async fn close(&self) -> anyhow::Result<()> {
        let url = format!("{}/session/{}", self.base, self.session_id);
        let res = self.http.delete(&url).send().await?;
        if !res.status().is_success() {
            anyhow::bail!("webdriver session delete failed: {}", res.status());
        }
        Ok(())
    }

    async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let url = format!("{}/session/{}/{}", self.base, self.session_id, path);
        post_checked(&self.http, &url, body).await
    }
}

/// POSTs a WebDriver command and returns the `value` payload, turning
/// protocol-level errors into readable failures.
async fn post_checked(
    http: &reqwest::Client,
    url: &str,
    body: &Value,
) -> anyhow::Result<Value> {
    let res = http.post(url).json(body).send().await?;
    let status = res.status();
    let payload: Value = res.json().await?;
    let value = payload.pointer("/value").cloned().unwrap_or(Value::Null);
    if !status.is_success() {
        let error = value
            .pointer("/error")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let message = value
            .pointer("/message")
            .and_then(Value::as_str)
            .unwrap_or("");
        anyhow::bail!("webdriver command failed ({}): {} {}", status, error, message);
    }
    Ok(value)
}

/// Watches a download directory for a finished file that was not there
/// before the click. Chrome writes `.crdownload` placeholders while a
/// transfer runs; those do not count.
pub async fn wait_for_download(
    dir: &Path,
    known: &[PathBuf],
    deadline: Duration,
    poll: Duration,
) -> anyhow::Result<PathBuf> {
    let started = Instant::now();
    loop {
        if let Some(found) = scan_for_new_file(dir, known)? {
            return Ok(found);
        }
        if started.elapsed() >= deadline {
            anyhow::bail!(
                "no completed download appeared in {} within {:?}",
                dir.display(),
                deadline
            );
        }
        tokio::time::sleep(poll).await;
    }
}

pub fn list_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        files.push(entry?.path());
    }
    Ok(files)
}

fn scan_for_new_file(
    dir: &Path,
    known: &[PathBuf],
) -> anyhow::Result<Option<PathBuf>> {
    for path in list_files(dir)? {
        if known.contains(&path) {
            continue;
        }
        let partial = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("crdownload"));
        if partial {
            continue;
        }
        return Ok(Some(path));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn partial_downloads_are_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let known = list_files(dir.path()).unwrap();

        fs::write(dir.path().join("voice.mp3.crdownload"), b"partial").unwrap();
        assert!(scan_for_new_file(dir.path(), &known).unwrap().is_none());

        fs::write(dir.path().join("voice.mp3"), b"done").unwrap();
        let found = scan_for_new_file(dir.path(), &known).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "voice.mp3");
    }

    #[test]
    fn files_present_before_the_click_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.mp3"), b"stale").unwrap();
        let known = list_files(dir.path()).unwrap();
        assert!(scan_for_new_file(dir.path(), &known).unwrap().is_none());
    }

    #[test]
    fn missing_directory_lists_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(list_files(&gone).unwrap().is_empty());
    }
}
