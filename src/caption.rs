use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::StyleConfig;

/// One caption card: the phrase text plus when it shows, relative to the
/// start of its segment.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionPhrase {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Splits a turn's on-screen text into phrase cards shown back to back,
/// each for an equal share of the turn. Quote characters are dropped from
/// display, everything else (ellipses, asides) stays as written.
pub fn plan_captions(raw_text: &str, turn_duration: f64, style: &StyleConfig) -> Vec<CaptionPhrase> {
    let display = caption_text(raw_text);
    let phrases = chunk_phrases(&display, style.words_per_phrase);
    if phrases.is_empty() {
        return Vec::new();
    }
    let each = turn_duration / phrases.len() as f64;
    phrases
        .into_iter()
        .enumerate()
        .map(|(i, text)| CaptionPhrase {
            text,
            start: i as f64 * each,
            duration: each,
        })
        .collect()
}

pub fn caption_text(raw: &str) -> String {
    raw.replace('"', "").replace('\'', "")
}

pub fn chunk_phrases(text: &str, words_per_phrase: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_phrase.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Greedy word wrap; a single word longer than the limit gets its own
/// line rather than being split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Rasterized coverage for one line of text, 0.0..=1.0 per pixel.
struct Mask {
    w: usize,
    h: usize,
    data: Vec<f32>,
}

impl Mask {
    fn new(w: usize, h: usize) -> Mask {
        Mask {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    fn put_max(&mut self, x: usize, y: usize, c: f32) {
        if x < self.w && y < self.h {
            let px = &mut self.data[y * self.w + x];
            *px = px.max(c);
        }
    }
}

/// Renders caption cards as white text with a black outline on a
/// transparent background. Uses the first loadable font from the style's
/// candidate list, else the built-in 8x8 glyphs.
pub struct CaptionRenderer {
    font: Option<FontVec>,
    font_px: u32,
    stroke_px: u32,
    wrap_chars: usize,
}

impl CaptionRenderer {
    pub fn new(style: &StyleConfig) -> CaptionRenderer {
        let font = load_font(&style.font_paths);
        if font.is_none() {
            warn!("no caption font found; using built-in glyphs");
        }
        CaptionRenderer {
            font,
            font_px: style.font_px,
            stroke_px: style.stroke_px,
            wrap_chars: style.wrap_chars,
        }
    }

    /// Writes the phrase as a PNG and returns its pixel dimensions.
    pub fn render_phrase(&self, phrase: &str, out_path: &Path) -> anyhow::Result<(u32, u32)> {
        let lines = wrap_text(phrase, self.wrap_chars);
        let masks: Vec<Mask> = lines.iter().map(|l| self.rasterize_line(l)).collect();

        let page_w = masks.iter().map(|m| m.w).max().unwrap_or(1).max(1);
        let page_h = masks.iter().map(|m| m.h).sum::<usize>().max(1);
        let mut page = Mask::new(page_w, page_h);
        let mut top = 0;
        for mask in &masks {
            let left = (page_w - mask.w) / 2;
            for y in 0..mask.h {
                for x in 0..mask.w {
                    page.put_max(left + x, top + y, mask.data[y * mask.w + x]);
                }
            }
            top += mask.h;
        }

        let img = stamp(&page, self.stroke_px as usize);
        img.save(out_path)?;
        debug!("caption {}x{} -> {}", img.width(), img.height(), out_path.display());
        Ok((img.width(), img.height()))
    }

    fn rasterize_line(&self, text: &str) -> Mask {
        match &self.font {
            Some(font) => rasterize_ttf(font, self.font_px, text),
            None => rasterize_builtin(self.font_px, text),
        }
    }
}

fn load_font(paths: &[PathBuf]) -> Option<FontVec> {
    for path in paths {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                debug!("caption font: {}", path.display());
                return Some(font);
            }
        }
    }
    None
}

fn rasterize_ttf(font: &FontVec, font_px: u32, text: &str) -> Mask {
    let scaled = font.as_scaled(PxScale::from(font_px as f32));
    let ascent = scaled.ascent();
    let height = scaled.height().ceil() as usize;

    let mut glyphs = Vec::new();
    let mut caret = 0.0f32;
    let mut last = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = last {
            caret += scaled.kern(prev, id);
        }
        let mut glyph = scaled.scaled_glyph(ch);
        glyph.position = point(caret, ascent);
        caret += scaled.h_advance(id);
        last = Some(id);
        glyphs.push(glyph);
    }

    let mut mask = Mask::new((caret.ceil() as usize).max(1), height.max(1));
    for glyph in glyphs {
        if let Some(outlined) = scaled.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, c| {
                let px = bounds.min.x + x as f32;
                let py = bounds.min.y + y as f32;
                if px >= 0.0 && py >= 0.0 {
                    mask.put_max(px as usize, py as usize, c);
                }
            });
        }
    }
    mask
}

fn rasterize_builtin(font_px: u32, text: &str) -> Mask {
    let scale = (font_px as usize / 8).max(1);
    let glyph = 8 * scale;
    let chars: Vec<char> = text.chars().collect();
    let mut mask = Mask::new((chars.len() * glyph).max(1), glyph);
    for (i, ch) in chars.iter().enumerate() {
        let idx = *ch as usize;
        let rows = if idx < 128 {
            font8x8::legacy::BASIC_LEGACY[idx]
        } else {
            font8x8::legacy::BASIC_LEGACY[b'?' as usize]
        };
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..8 {
                // LSB is the leftmost pixel.
                if (bits >> col) & 1 == 1 {
                    for dy in 0..scale {
                        for dx in 0..scale {
                            mask.put_max(
                                i * glyph + col * scale + dx,
                                row * scale + dy,
                                1.0,
                            );
                        }
                    }
                }
            }
        }
    }
    mask
}

/// White fill ringed by a black outline of `stroke` pixels, alpha taken
/// from glyph coverage.
fn stamp(mask: &Mask, stroke: usize) -> RgbaImage {
    let w = mask.w + 2 * stroke;
    let h = mask.h + 2 * stroke;
    let mut fill = vec![0.0f32; w * h];
    let mut edge = vec![0.0f32; w * h];
    let r2 = (stroke * stroke) as i64;

    for y in 0..mask.h {
        for x in 0..mask.w {
            let c = mask.data[y * mask.w + x];
            if c <= 0.0 {
                continue;
            }
            let cx = x + stroke;
            let cy = y + stroke;
            let f = &mut fill[cy * w + cx];
            *f = f.max(c);
            let s = stroke as i64;
            for dy in -s..=s {
                for dx in -s..=s {
                    if dx * dx + dy * dy > r2 {
                        continue;
                    }
                    let ex = (cx as i64 + dx) as usize;
                    let ey = (cy as i64 + dy) as usize;
                    let e = &mut edge[ey * w + ex];
                    *e = e.max(c);
                }
            }
        }
    }

    let mut img = RgbaImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let f = fill[y * w + x];
            let e = edge[y * w + x];
            let a = f.max(e);
            if a > 0.0 {
                let v = (f * 255.0) as u8;
                img.put_pixel(x as u32, y as u32, Rgba([v, v, v, (a * 255.0) as u8]));
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases_hold_at_most_the_configured_word_count() {
        let text = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen";
        let phrases = chunk_phrases(text, 7);
        assert_eq!(phrases.len(), 3);
        assert_eq!(phrases[0], "one two three four five six seven");
        assert_eq!(phrases[1], "eight nine ten eleven twelve thirteen fourteen");
        assert_eq!(phrases[2], "fifteen sixteen");
    }

    #[test]
    fn empty_text_plans_no_captions() {
        let style = StyleConfig::default();
        assert!(plan_captions("", 3.0, &style).is_empty());
        assert!(chunk_phrases("   ", 7).is_empty());
    }

    #[test]
    fn caption_cards_split_the_turn_evenly() {
        let style = StyleConfig::default();
        let text = "a b c d e f g h i j k l m n o p q r s t u";
        let cards = plan_captions(text, 6.0, &style);
        assert_eq!(cards.len(), 3);
        for (i, card) in cards.iter().enumerate() {
            assert!((card.duration - 2.0).abs() < 1e-9);
            assert!((card.start - i as f64 * 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn display_text_drops_quotes_but_keeps_asides() {
        let cards = plan_captions(
            "\"Sure,\" he said (softly)...",
            2.0,
            &StyleConfig::default(),
        );
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].text, "Sure, he said (softly)...");
    }

    #[test]
    fn wrapping_respects_the_character_limit() {
        let lines = wrap_text(
            "the quick brown fox jumps over the lazy dog again and again and again",
            20,
        );
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 20, "line too long: {:?}", line);
        }
        assert_eq!(
            lines.join(" "),
            "the quick brown fox jumps over the lazy dog again and again and again"
        );
    }

    #[test]
    fn oversized_words_get_their_own_line() {
        let lines = wrap_text("hi incomprehensibilities yes", 10);
        assert_eq!(
            lines,
            vec!["hi", "incomprehensibilities", "yes"]
        );
    }

    #[test]
    fn builtin_glyphs_render_a_stroked_card() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("card.png");
        let style = StyleConfig {
            font_paths: Vec::new(),
            ..StyleConfig::default()
        };
        let renderer = CaptionRenderer::new(&style);
        let (w, h) = renderer.render_phrase("HI", &out).unwrap();
        assert!(w > 0 && h > 0);

        let img = image::open(&out).unwrap().to_rgba8();
        assert_eq!((img.width(), img.height()), (w, h));
        let mut has_white = false;
        let mut has_black_edge = false;
        for px in img.pixels() {
            if px.0[3] > 0 {
                if px.0[0] > 200 {
                    has_white = true;
                }
                if px.0[0] < 50 {
                    has_black_edge = true;
                }
            }
        }
        assert!(has_white, "no white fill pixels");
        assert!(has_black_edge, "no dark outline pixels");
    }

    #[test]
    fn long_phrases_stack_wrapped_lines_vertically() {
        let dir = tempfile::tempdir().unwrap();
        let style = StyleConfig {
            font_paths: Vec::new(),
            wrap_chars: 10,
            ..StyleConfig::default()
        };
        let renderer = CaptionRenderer::new(&style);
        let (_, one_h) = renderer
            .render_phrase("short", &dir.path().join("one.png"))
            .unwrap();
        let (_, two_h) = renderer
            .render_phrase("first line second line", &dir.path().join("two.png"))
            .unwrap();
        assert!(two_h > one_h);
    }
}
