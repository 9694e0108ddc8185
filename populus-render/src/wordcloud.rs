//! Word-cloud rendering.
//!
//! Words are weighted by popularity (minimum 1), sized linearly between the
//! configured font sizes, and placed along an Archimedean spiral from the
//! canvas centre. A word that cannot be placed without overlapping another is
//! dropped. The layout is pure: [`layout`] takes a measuring function, so it
//! can be exercised without a font.
use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use populus_common::{RelatedTerm, Theme};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tried in order when no font is configured or the configured one is unusable.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Viridis, dark to light.
const VIRIDIS: [[u8; 3]; 8] = [
    [68, 1, 84],
    [70, 50, 126],
    [54, 92, 141],
    [39, 127, 142],
    [31, 161, 135],
    [74, 193, 109],
    [160, 218, 57],
    [253, 231, 37],
];

const SPIRAL_STEP: f32 = 0.1;
const SPIRAL_GROWTH: f32 = 1.5;
const PADDING: u32 = 2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot build a word cloud from an empty term set")]
    Empty,
    #[error("no usable font: {0}")]
    Font(String),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordCloudOptions {
    pub width: u32,
    pub height: u32,
    pub font_path: Option<PathBuf>,
    pub max_words: usize,
    pub min_font_size: f32,
    pub max_font_size: f32,
    pub theme: Theme,
}

impl Default for WordCloudOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
            font_path: None,
            max_words: 100,
            min_font_size: 12.0,
            max_font_size: 72.0,
            theme: Theme::Light,
        }
    }
}

/// A word with its final position; `x`/`y` are the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    pub font_size: f32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub color: Rgba<u8>,
}

impl PlacedWord {
    fn overlaps(&self, x: i32, y: i32, w: u32, h: u32) -> bool {
        let pad = PADDING as i32;
        x < self.x + self.width as i32 + pad
            && self.x < x + w as i32 + pad
            && y < self.y + self.height as i32 + pad
            && self.y < y + h as i32 + pad
    }
}

/// Heaviest `max_words` terms with weight `max(score, 1)`; ties keep input order.
pub fn weigh(terms: &[RelatedTerm], max_words: usize) -> Vec<(String, u32)> {
    let mut words: Vec<(String, u32)> = terms
        .iter()
        .filter(|t| !t.term.trim().is_empty())
        .map(|t| (t.term.trim().to_string(), t.popularity_score.max(1)))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1));
    words.truncate(max_words.max(1));
    words
}

/// Place `words` (heaviest first) on the canvas.
pub fn layout<F>(words: &[(String, u32)], options: &WordCloudOptions, measure: F) -> Vec<PlacedWord>
where
    F: Fn(&str, f32) -> (u32, u32),
{
    let Some(max_w) = words.iter().map(|(_, w)| *w).max() else {
        return Vec::new();
    };
    let min_w = words.iter().map(|(_, w)| *w).min().unwrap_or(max_w);
    let (canvas_w, canvas_h) = (options.width as i32, options.height as i32);
    let (cx, cy) = (options.width as f32 / 2.0, options.height as f32 / 2.0);
    let max_radius = (cx * cx + cy * cy).sqrt();

    let mut placed: Vec<PlacedWord> = Vec::with_capacity(words.len());
    for (text, weight) in words {
        let ratio = if max_w == min_w {
            1.0
        } else {
            (*weight - min_w) as f32 / (max_w - min_w) as f32
        };
        let font_size =
            options.min_font_size + ratio * (options.max_font_size - options.min_font_size);
        let (w, h) = measure(text, font_size);
        if w as i32 > canvas_w || h as i32 > canvas_h {
            continue;
        }

        let mut t = 0.0f32;
        loop {
            let r = SPIRAL_GROWTH * t;
            if r > max_radius {
                tracing::debug!(target: "render.wordcloud", word = %text, "wordcloud.word.dropped");
                break;
            }
            let x = (cx + r * t.cos() - w as f32 / 2.0).round() as i32;
            let y = (cy + r * t.sin() - h as f32 / 2.0).round() as i32;
            let inside = x >= 0 && y >= 0 && x + w as i32 <= canvas_w && y + h as i32 <= canvas_h;
            if inside && !placed.iter().any(|p| p.overlaps(x, y, w, h)) {
                placed.push(PlacedWord {
                    text: text.clone(),
                    font_size,
                    x,
                    y,
                    width: w,
                    height: h,
                    color: palette(ratio, options.theme),
                });
                break;
            }
            t += SPIRAL_STEP;
        }
    }
    placed
}

/// Heavier words get the darker end of viridis on light backgrounds and the
/// brighter end on dark ones.
fn palette(ratio: f32, theme: Theme) -> Rgba<u8> {
    let pos = match theme {
        Theme::Light => 1.0 - ratio,
        Theme::Dark => ratio,
    } * 0.85;
    let scaled = pos.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f32;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(VIRIDIS.len() - 1);
    let frac = scaled - lo as f32;
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    Rgba([
        mix(VIRIDIS[lo][0], VIRIDIS[hi][0]),
        mix(VIRIDIS[lo][1], VIRIDIS[hi][1]),
        mix(VIRIDIS[lo][2], VIRIDIS[hi][2]),
        255,
    ])
}

fn background(theme: Theme) -> Rgba<u8> {
    match theme {
        Theme::Light => Rgba([255, 255, 255, 255]),
        Theme::Dark => Rgba([17, 17, 17, 255]),
    }
}

fn load_font(configured: Option<&Path>) -> Result<FontVec, RenderError> {
    let candidates = configured
        .into_iter()
        .map(Path::to_path_buf)
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from));
    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                tracing::debug!(target: "render.wordcloud", path = %path.display(), "wordcloud.font.loaded");
                return Ok(font);
            }
            Err(e) => {
                tracing::warn!(target: "render.wordcloud", path = %path.display(), error = %e, "wordcloud.font.invalid");
            }
        }
    }
    Err(RenderError::Font(match configured {
        Some(p) => format!("{} is not a readable TrueType font and no system font was found", p.display()),
        None => "set wordcloud.font_path; no system font was found".to_string(),
    }))
}

#[derive(Debug, Clone, Default)]
pub struct WordCloudRenderer {
    options: WordCloudOptions,
}

impl WordCloudRenderer {
    pub fn new(options: WordCloudOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WordCloudOptions {
        &self.options
    }

    /// Whether a usable font exists for this renderer's options.
    pub fn has_font(&self) -> bool {
        load_font(self.options.font_path.as_deref()).is_ok()
    }

    /// Same renderer with another background theme.
    pub fn with_theme(&self, theme: Theme) -> Self {
        Self {
            options: WordCloudOptions {
                theme,
                ..self.options.clone()
            },
        }
    }

    fn render_image(&self, terms: &[RelatedTerm]) -> Result<RgbaImage, RenderError> {
        let words = weigh(terms, self.options.max_words);
        if words.is_empty() {
            return Err(RenderError::Empty);
        }
        let font = load_font(self.options.font_path.as_deref())?;
        let placed = layout(&words, &self.options, |text, size| {
            text_size(PxScale::from(size), &font, text)
        });

        let mut canvas = RgbaImage::from_pixel(
            self.options.width.max(1),
            self.options.height.max(1),
            background(self.options.theme),
        );
        for word in &placed {
            draw_text_mut(
                &mut canvas,
                word.color,
                word.x,
                word.y,
                PxScale::from(word.font_size),
                &font,
                &word.text,
            );
        }
        tracing::info!(
            target: "render.wordcloud",
            words = words.len(),
            placed = placed.len(),
            "wordcloud.render.success"
        );
        Ok(canvas)
    }

    /// Encode the cloud as PNG bytes.
    pub fn render_png(&self, terms: &[RelatedTerm]) -> Result<Vec<u8>, RenderError> {
        let canvas = self.render_image(terms)?;
        let mut buf = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    /// Render and write a PNG. Nothing is created when `terms` is empty.
    pub fn render_to_path(&self, terms: &[RelatedTerm], path: &Path) -> Result<(), RenderError> {
        let png = self.render_png(terms)?;
        std::fs::write(path, png).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(target: "render.wordcloud", path = %path.display(), "wordcloud.save.success");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use populus_common::ProviderKind;

    fn term(text: &str, score: u32) -> RelatedTerm {
        RelatedTerm {
            term: text.to_string(),
            peak_date: None,
            popularity_score: score,
            source: ProviderKind::Bing,
        }
    }

    /// Monospace stand-in: 0.6em per char, 1.2em line.
    fn measure(text: &str, size: f32) -> (u32, u32) {
        (
            (text.chars().count() as f32 * size * 0.6).ceil() as u32,
            (size * 1.2).ceil() as u32,
        )
    }

    #[test]
    fn weights_have_a_floor_and_are_capped() {
        let words = weigh(&[term("a", 0), term("b", 40), term("c", 7), term(" ", 99)], 2);
        assert_eq!(words, vec![("b".to_string(), 40), ("c".to_string(), 7)]);
    }

    #[test]
    fn heaviest_word_is_largest_and_centred() {
        let words = weigh(&[term("eclipse", 90), term("moon", 10), term("sun", 50)], 10);
        let opts = WordCloudOptions::default();
        let placed = layout(&words, &opts, measure);

        assert_eq!(placed.len(), 3);
        assert_eq!(placed[0].text, "eclipse");
        assert_eq!(placed[0].font_size, opts.max_font_size);
        assert_eq!(placed[2].font_size, opts.min_font_size);
        let centre_x = placed[0].x + placed[0].width as i32 / 2;
        assert!((centre_x - 400).abs() <= 1);
    }

    #[test]
    fn placed_words_never_overlap_and_stay_inside() {
        let terms: Vec<RelatedTerm> = (0..40).map(|i| term(&format!("word{i}"), i * 2)).collect();
        let opts = WordCloudOptions::default();
        let placed = layout(&weigh(&terms, 100), &opts, measure);

        assert!(!placed.is_empty());
        for (i, a) in placed.iter().enumerate() {
            assert!(a.x >= 0 && a.y >= 0);
            assert!(a.x + a.width as i32 <= opts.width as i32);
            assert!(a.y + a.height as i32 <= opts.height as i32);
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b.x, b.y, b.width, b.height), "{} overlaps {}", a.text, b.text);
            }
        }
    }

    #[test]
    fn oversized_words_are_dropped() {
        let opts = WordCloudOptions {
            width: 50,
            height: 50,
            ..WordCloudOptions::default()
        };
        let placed = layout(&[("a very long phrase indeed".to_string(), 5)], &opts, measure);
        assert!(placed.is_empty());
    }

    #[test]
    fn empty_terms_create_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.png");
        let renderer = WordCloudRenderer::new(WordCloudOptions {
            font_path: Some(dir.path().join("no-such-font.ttf")),
            ..WordCloudOptions::default()
        });

        let err = renderer.render_to_path(&[], &path).unwrap_err();
        assert!(matches!(err, RenderError::Empty));
        assert!(!path.exists());
    }

    #[test]
    fn palette_differs_by_theme() {
        assert_ne!(palette(1.0, Theme::Light), palette(1.0, Theme::Dark));
        assert_eq!(palette(0.0, Theme::Light)[3], 255);
    }

    #[test]
    fn renders_a_png_with_visible_words() {
        let renderer = WordCloudRenderer::default().with_theme(Theme::Dark);
        if !renderer.has_font() {
            eprintln!("no system font found, skipping render check");
            return;
        }
        let terms = [term("solar eclipse", 87), term("eclipse glasses", 40), term("moon", 0)];
        let png = renderer.render_png(&terms).unwrap();
        assert_eq!(&png[..4], &[137, 80, 78, 71]);

        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (800, 400));
        let bg = background(Theme::Dark);
        assert!(img.pixels().any(|p| *p != bg), "only background pixels");
    }

    #[test]
    fn render_to_path_writes_the_file() {
        let renderer = WordCloudRenderer::default();
        if !renderer.has_font() {
            eprintln!("no system font found, skipping render check");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.png");
        renderer.render_to_path(&[term("eclipse", 10)], &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn missing_configured_font_without_fallback_is_a_font_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = WordCloudRenderer::new(WordCloudOptions {
            font_path: Some(dir.path().join("no-such-font.ttf")),
            ..WordCloudOptions::default()
        });
        if renderer.has_font() {
            // A system font covers the missing one.
            return;
        }
        let err = renderer.render_png(&[term("eclipse", 10)]).unwrap_err();
        assert!(matches!(err, RenderError::Font(_)));
    }
}
