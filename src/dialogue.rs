use regex::Regex;
use tracing::debug;

use crate::config::Cast;

/// One spoken line. `raw_text` keeps the writer's punctuation for captions,
/// `clean_text` is what gets synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTurn {
    pub speaker: usize,
    pub raw_text: String,
    pub clean_text: String,
}

/// Splits a transcript into turns. A line becomes a turn when the text
/// before its first `:` matches a cast member; everything else (stage
/// directions, narrator lines, blank lines) is dropped.
pub fn parse_script(script: &str, cast: &Cast) -> Vec<DialogueTurn> {
    let mut turns = Vec::new();
    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(speaker) = cast.match_speaker(label) else {
            debug!("dropping line with unknown speaker: {}", label.trim());
            continue;
        };
        let raw_text = rest.trim().to_string();
        let clean_text = clean_for_speech(&raw_text);
        if clean_text.is_empty() {
            debug!("dropping turn with no speakable text: {}", raw_text);
            continue;
        }
        turns.push(DialogueTurn {
            speaker,
            raw_text,
            clean_text,
        });
    }
    turns
}

/// Normalizes dialogue for the synthesizer: quotes and parenthetical
/// asides go away, runs of `!`/`?` collapse to one, runs of `.` collapse
/// to an ellipsis, a leading ellipsis is stripped, whitespace is
/// single-spaced. Idempotent.
pub fn clean_for_speech(text: &str) -> String {
    let quotes = Regex::new(r#"["'`]"#).unwrap();
    let parens = Regex::new(r"\([^)]*\)").unwrap();
    let bangs = Regex::new(r"!{2,}").unwrap();
    let quests = Regex::new(r"\?{2,}").unwrap();
    let dots = Regex::new(r"\.{2,}").unwrap();
    let leading_ellipsis = Regex::new(r"^\s*(?:\.\.\.\s*)+").unwrap();
    let ws = Regex::new(r"\s+").unwrap();

    let text = quotes.replace_all(text, "");
    let text = parens.replace_all(&text, "");
    let text = bangs.replace_all(&text, "!");
    let text = quests.replace_all(&text, "?");
    let text = dots.replace_all(&text, "...");
    let text = leading_ellipsis.replace_all(&text, "");
    ws.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternating_lines_parse_in_order() {
        let cast = Cast::default();
        let script = "Peter: First line here.\n\
                      Stewie: Second line here.\n\
                      Peter: Third line here.\n\
                      Stewie: Fourth line here.";
        let turns = parse_script(script, &cast);
        assert_eq!(turns.len(), 4);
        assert_eq!(
            turns.iter().map(|t| t.speaker).collect::<Vec<_>>(),
            vec![0, 1, 0, 1]
        );
        assert_eq!(turns[2].raw_text, "Third line here.");
    }

    #[test]
    fn unknown_speaker_lines_are_dropped() {
        let cast = Cast::default();
        let script = "Peter: Hello.\nNarrator: Meanwhile, downtown.\nStewie: Goodbye.";
        let turns = parse_script(script, &cast);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, 0);
        assert_eq!(turns[1].speaker, 1);
    }

    #[test]
    fn full_name_aliases_map_to_the_same_speaker() {
        let cast = Cast::default();
        let turns = parse_script("Peter Griffin: Hey.\nSTEWIE GRIFFIN: What.", &cast);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, 0);
        assert_eq!(turns[1].speaker, 1);
    }

    #[test]
    fn lines_without_a_separator_are_skipped() {
        let cast = Cast::default();
        let turns = parse_script("(Peter walks in)\nPeter: Hi there.", &cast);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].raw_text, "Hi there.");
    }

    #[test]
    fn turns_reduced_to_nothing_by_cleaning_are_dropped() {
        let cast = Cast::default();
        let turns = parse_script("Peter: ...(sighs)...\nStewie: Quite.", &cast);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].clean_text, "Quite.");
    }

    #[test]
    fn cleaning_collapses_repeated_punctuation() {
        assert_eq!(clean_for_speech("Wow!!! Really??"), "Wow! Really?");
        assert_eq!(clean_for_speech("Hold on....."), "Hold on...");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let cases = [
            "Wow!!! Really??",
            "...(shrugs)... Because oil.",
            "He said \"no way\" and left...",
            "Don't    panic!!",
        ];
        for case in cases {
            let once = clean_for_speech(case);
            let twice = clean_for_speech(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", case);
        }
    }

    #[test]
    fn cleaning_strips_quotes_and_parentheticals() {
        assert_eq!(
            clean_for_speech("He said \"fine\" (rolling his eyes) and left."),
            "He said fine and left."
        );
        assert_eq!(clean_for_speech("Don't panic"), "Dont panic");
    }

    #[test]
    fn gas_price_scenario_parses_and_cleans() {
        let cast = Cast::default();
        let script = "Stewie: Why is gas so expensive?\nPeter: ...(shrugs)... Because oil.";
        let turns = parse_script(script, &cast);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, 1);
        assert_eq!(turns[0].clean_text, "Why is gas so expensive?");
        assert_eq!(turns[1].speaker, 0);
        assert_eq!(turns[1].clean_text, "Because oil.");
        assert_eq!(turns[1].raw_text, "...(shrugs)... Because oil.");
    }
}
