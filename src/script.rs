use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{Cast, ScriptConfig};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Asks the chat model for a short back-and-forth between the cast about
/// one headline. Returns the raw script text.
pub async fn generate_script(
    client: &reqwest::Client,
    cfg: &ScriptConfig,
    api_key: &str,
    cast: &Cast,
    headline: &str,
    context: &str,
) -> anyhow::Result<String> {
    let prompt = build_prompt(cast, headline, context);
    debug!("script prompt:\n{}", prompt);

    let res = client
        .post(&cfg.endpoint)
        .bearer_auth(api_key)
        .json(&json!({
            "model": cfg.model,
            "messages": [
                { "role": "system", "content": system_prompt(cast) },
                { "role": "user", "content": prompt }
            ]
        }))
        .send()
        .await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("script API error: {} - {}", status, body);
    }

    let parsed: ChatResponse = res.json().await?;
    let Some(choice) = parsed.choices.into_iter().next() else {
        anyhow::bail!("script API returned no choices");
    };
    Ok(choice.message.content)
}

fn system_prompt(cast: &Cast) -> String {
    let names: Vec<&str> = cast.characters.iter().map(|c| c.name.as_str()).collect();
    format!(
        "You are a scriptwriter for a viral short-video account. Your job is to \
         write funny conversations between {}.",
        names.join(" and ")
    )
}

/// The first cast member explains, the last one asks; with the default
/// two-character roster that reproduces the usual straight-man split.
fn build_prompt(cast: &Cast, headline: &str, context: &str) -> String {
    let names: Vec<&str> = cast.characters.iter().map(|c| c.name.as_str()).collect();
    let explainer = names.first().copied().unwrap_or("the first character");
    let asker = names.last().copied().unwrap_or("the second character");
    let format_lines: Vec<String> = cast
        .characters
        .iter()
        .map(|c| format!("{}: ...", c.name))
        .collect();
    format!(
        "Write a short, funny, conversational exchange between {names}.\n\
         {asker} is asking {explainer} about this news headline and {explainer} is \
         trying to explain what happened using information from the article.\n\
         {asker} should not refer to or quote the headline directly, but should ask \
         questions that relate to the content of the article.\n\
         Headline: \"{headline}\"\n\
         Context: \"{context}\"\n\n\
         {asker} should ask 1-2 sarcastic, curious follow-up questions.\n\
         {explainer} should respond with casual, exaggerated, or comedic \
         explanations that reflect the actual content.\n\
         Keep the tone light and funny, but make sure the conversation includes \
         the key information from the context.\n\n\
         Format:\n{format}\n",
        names = names.join(" and "),
        asker = asker,
        explainer = explainer,
        headline = headline,
        context = context,
        format = format_lines.join("\n"),
    )
}
