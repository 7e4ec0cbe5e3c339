//! Document rendering: the renderer seam and the PDF implementation.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::font::{FontError, TitleFont};
use super::page::{DocumentPage, TitleBlock};

/// Margin around full-page images, in points.
pub const IMAGE_MARGIN: f32 = 10.0;
/// Margin around title page content, in points.
pub const TITLE_MARGIN: f32 = 30.0;

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.55;

/// Page canvas in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    /// Width in points.
    pub width: f32,
    /// Height in points.
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait.
    pub const A4: Self = Self {
        width: 595.28,
        height: 841.89,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// The output document could not be produced.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An image could not be read.
    #[error("cannot read image {path}: {source}")]
    Io {
        /// Image path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An image could not be decoded.
    #[error("cannot decode image {path}: {source}")]
    Decode {
        /// Image path.
        path: PathBuf,
        /// The decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A page content stream could not be encoded.
    #[error("cannot encode document {path}: {source}")]
    Pdf {
        /// Output path.
        path: PathBuf,
        /// The PDF library error.
        #[source]
        source: lopdf::Error,
    },

    /// The finished document could not be written.
    #[error("cannot write document {path}: {source}")]
    Write {
        /// Output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The title font could not be loaded.
    #[error(transparent)]
    Font(#[from] FontError),
}

/// Renders an ordered page stream into a document file.
pub trait DocumentRenderer: Send + Sync {
    /// Writes `pages` to `output`, one physical page each, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when an image cannot be embedded or the output
    /// cannot be written. A partially written file is left in place.
    fn render(&self, output: &Path, pages: &[DocumentPage], size: PageSize)
    -> Result<(), RenderError>;
}

/// Scales `(width, height)` to fit inside `(max_width, max_height)`.
///
/// Aspect ratio is preserved and the result is never larger than the input.
#[must_use]
pub fn fit_within(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let ratio = (max_width / width).min(max_height / height).min(1.0);
    (width * ratio, height * ratio)
}

/// Greedy word wrap using an average glyph width estimate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn wrap_text(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let max_chars = ((max_width / (size * AVG_GLYPH_EM)).floor() as usize).max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        // Hard-break words longer than a full line.
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(max_chars)
                .map_or(word.len(), |(i, _)| i);
            lines.push(word[..split].to_string());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }
        let needed =
            current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encodes text for the built-in WinAnsi font; characters outside Latin-1
/// become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// An image ready to be embedded as an XObject.
struct EmbeddedImage {
    width: u32,
    height: u32,
    stream: Stream,
}

fn load_image(path: &Path) -> Result<EmbeddedImage, RenderError> {
    let io_err = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };
    let decode_err = |source| RenderError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let bytes = std::fs::read(path).map_err(io_err)?;
    let format = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(io_err)?
        .format();

    if format == Some(ImageFormat::Jpeg) {
        let decoder = JpegDecoder::new(Cursor::new(&bytes)).map_err(decode_err)?;
        let (width, height) = decoder.dimensions();
        let color_space = if decoder.color_type() == ColorType::L8 {
            "DeviceGray"
        } else {
            "DeviceRGB"
        };
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        return Ok(EmbeddedImage {
            width,
            height,
            stream: Stream::new(dict, bytes),
        });
    }

    let rgb = image::load_from_memory(&bytes)
        .map_err(decode_err)?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    Ok(EmbeddedImage {
        width,
        height,
        stream: Stream::new(dict, rgb.into_raw()),
    })
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Draws `image` at `(x, y)` (bottom-left origin) scaled to `(w, h)`.
fn draw_image(ops: &mut Vec<Operation>, name: &str, x: f32, y: f32, w: f32, h: f32) {
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![real(w), real(0.0), real(0.0), real(h), real(x), real(y)],
    ));
    ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
    ops.push(Operation::new("Q", vec![]));
}

/// PDF [`DocumentRenderer`] built on `lopdf`.
///
/// Title text uses the standard Helvetica font with WinAnsi encoding unless a
/// [`TitleFont`] is set; that font is embedded and covers whatever scripts it
/// has glyphs for.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    title_font: Option<Arc<TitleFont>>,
}

impl PdfRenderer {
    /// Renderer using the built-in Helvetica for title text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Embeds `font` for title text.
    #[must_use]
    pub fn with_title_font(mut self, font: TitleFont) -> Self {
        self.title_font = Some(Arc::new(font));
        self
    }
}

struct PdfBuilder<'a> {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    title_font: Option<&'a TitleFont>,
    used_glyphs: BTreeMap<u16, char>,
    kids: Vec<Object>,
    size: PageSize,
}

impl<'a> PdfBuilder<'a> {
    fn new(size: PageSize, title_font: Option<&'a TitleFont>) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        // An embedded font is written in `finish`, once the used glyphs are known.
        let font_id = if title_font.is_some() {
            doc.new_object_id()
        } else {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })
        };
        Self {
            doc,
            pages_id,
            font_id,
            title_font,
            used_glyphs: BTreeMap::new(),
            kids: Vec::new(),
            size,
        }
    }

    fn text(&mut self, line: &str) -> Object {
        match self.title_font {
            Some(font) => {
                let missing = line.chars().find(|&c| !c.is_whitespace() && !font.covers(c));
                if let Some(missing) = missing {
                    warn!(font = font.name(), %missing, "title font has no glyph");
                }
                Object::String(
                    font.encode(line, &mut self.used_glyphs),
                    StringFormat::Hexadecimal,
                )
            }
            None => Object::string_literal(win_ansi(line)),
        }
    }

    fn add_page(
        &mut self,
        ops: Vec<Operation>,
        images: Vec<(String, ObjectId)>,
        output: &Path,
    ) -> Result<(), RenderError> {
        let encoded = Content { operations: ops }
            .encode()
            .map_err(|source| RenderError::Pdf {
                path: output.to_path_buf(),
                source,
            })?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), encoded));

        let mut xobjects = Dictionary::new();
        for (name, id) in images {
            xobjects.set(name, id);
        }
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
            "XObject" => xobjects,
        };

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    fn title_page(&mut self, block: &TitleBlock, output: &Path) -> Result<(), RenderError> {
        let mut ops = Vec::new();
        let mut images = Vec::new();
        let text_width = self.size.width - TITLE_MARGIN * 2.0;
        // Distance from the top edge.
        let mut cursor = TITLE_MARGIN;

        if let Some(cover) = &block.cover {
            let image = load_image(cover)?;
            #[allow(clippy::cast_precision_loss)]
            let (w, h) = fit_within(
                image.width as f32 / 2.0,
                image.height as f32 / 2.0,
                text_width,
                self.size.height * 0.45,
            );
            let id = self.doc.add_object(image.stream);
            images.push(("Cover".to_string(), id));
            let x = (self.size.width - w) / 2.0;
            draw_image(&mut ops, "Cover", x, self.size.height - cursor - h, w, h);
            cursor += h + 16.0;
        }

        for (index, heading) in block.headings.iter().enumerate() {
            for line in wrap_text(&heading.text, heading.size, text_width) {
                cursor += heading.size;
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec!["F1".into(), real(heading.size)]));
                ops.push(Operation::new(
                    "Td",
                    vec![real(TITLE_MARGIN), real(self.size.height - cursor)],
                ));
                let text = self.text(&line);
                ops.push(Operation::new("Tj", vec![text]));
                ops.push(Operation::new("ET", vec![]));
            }
            if index == 0 {
                // Dashed rule under the work name.
                cursor += 12.0;
                let y = self.size.height - cursor;
                ops.push(Operation::new("w", vec![real(1.0)]));
                ops.push(Operation::new(
                    "d",
                    vec![
                        Object::Array(vec![Object::Integer(4), Object::Integer(3)]),
                        Object::Integer(0),
                    ],
                ));
                ops.push(Operation::new("m", vec![real(TITLE_MARGIN), real(y)]));
                ops.push(Operation::new(
                    "l",
                    vec![real(self.size.width - TITLE_MARGIN), real(y)],
                ));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("d", vec![Object::Array(vec![]), Object::Integer(0)]));
            }
            cursor += 8.0;
        }

        self.add_page(ops, images, output)
    }

    #[allow(clippy::cast_precision_loss)]
    fn image_page(&mut self, path: &Path, output: &Path) -> Result<(), RenderError> {
        let image = load_image(path)?;
        let (w, h) = fit_within(
            image.width as f32,
            image.height as f32,
            self.size.width - IMAGE_MARGIN * 2.0,
            self.size.height - IMAGE_MARGIN * 2.0,
        );
        debug!(path = %path.display(), width = image.width, height = image.height, "adding image");

        let id = self.doc.add_object(image.stream);
        let mut ops = Vec::new();
        let x = (self.size.width - w) / 2.0;
        let y = (self.size.height - h) / 2.0;
        draw_image(&mut ops, "Im", x, y, w, h);
        self.add_page(ops, vec![("Im".to_string(), id)], output)
    }

    fn finish(mut self, output: &Path) -> Result<(), RenderError> {
        let count = i64::try_from(self.kids.len()).unwrap_or(i64::MAX);
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
            "MediaBox" => vec![real(0.0), real(0.0), real(self.size.width), real(self.size.height)],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        if let Some(font) = self.title_font {
            font.embed(&mut self.doc, self.font_id, &self.used_glyphs);
        }
        self.doc.compress();
        self.doc
            .save(output)
            .map_err(|source| RenderError::Write {
                path: output.to_path_buf(),
                source,
            })?;
        Ok(())
    }
}

impl DocumentRenderer for PdfRenderer {
    #[instrument(skip(self, pages), fields(output = %output.display(), pages = pages.len()))]
    fn render(
        &self,
        output: &Path,
        pages: &[DocumentPage],
        size: PageSize,
    ) -> Result<(), RenderError> {
        let mut builder = PdfBuilder::new(size, self.title_font.as_deref());
        for page in pages {
            match page {
                DocumentPage::Title(block) => builder.title_page(block, output)?,
                DocumentPage::Image(block) => builder.image_page(&block.path, output)?,
            }
        }
        builder.finish(output)?;
        info!("document written");
        Ok(())
    }
}
