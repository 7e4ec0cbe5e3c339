//! TrueType title fonts, embedded as Type0 / Identity-H.
//!
//! The built-in Helvetica only covers WinAnsi. A configured TrueType font is
//! embedded whole and addressed by glyph id, with a `ToUnicode` map so the
//! text stays searchable and copyable.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use thiserror::Error;
use ttf_parser::{Face, FaceParsingError, GlyphId, name_id};

/// Name used when the font carries no usable PostScript name.
const FALLBACK_NAME: &str = "TitleFont";

/// `bfchar` entries per block; the CMap format caps blocks at 100.
const BFCHAR_BLOCK: usize = 100;

/// A title font could not be loaded.
#[derive(Debug, Error)]
pub enum FontError {
    /// The font file could not be read.
    #[error("cannot read font {path}: {source}")]
    Io {
        /// Font path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a TrueType/OpenType font.
    #[error("cannot parse font {path}: {source}")]
    Parse {
        /// Font path.
        path: PathBuf,
        /// The parser error.
        #[source]
        source: FaceParsingError,
    },
}

/// Font metrics scaled to 1000 units per em.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Metrics {
    ascent: i64,
    descent: i64,
    cap_height: i64,
    bbox: [i64; 4],
}

/// A parsed TrueType font ready to embed.
#[derive(Clone)]
pub struct TitleFont {
    name: String,
    data: Vec<u8>,
    metrics: Metrics,
    glyphs: HashMap<char, u16>,
    widths: HashMap<u16, i64>,
}

impl std::fmt::Debug for TitleFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("glyphs", &self.glyphs.len())
            .finish_non_exhaustive()
    }
}

impl TitleFont {
    /// Reads and parses a TrueType font file.
    ///
    /// # Errors
    ///
    /// Returns [`FontError::Io`] when the file cannot be read and
    /// [`FontError::Parse`] when it is not a font.
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data).map_err(|source| FontError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses font bytes, collecting the Unicode cmap and advance widths.
    ///
    /// # Errors
    ///
    /// Returns the parser error when `data` is not a font.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FaceParsingError> {
        let face = Face::parse(&data, 0)?;
        let scale = 1000.0 / f32::from(face.units_per_em().max(1));
        #[allow(clippy::cast_possible_truncation)]
        let to_pdf = |value: f32| (value * scale).round() as i64;

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code_point| {
                    if let Some(c) = char::from_u32(code_point)
                        && let Some(GlyphId(gid)) = subtable.glyph_index(code_point)
                        && gid != 0
                    {
                        glyphs.entry(c).or_insert(gid);
                    }
                });
            }
        }

        let widths = glyphs
            .values()
            .map(|&gid| {
                let advance = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
                (gid, to_pdf(f32::from(advance)))
            })
            .collect();

        let bbox = face.global_bounding_box();
        let ascent = to_pdf(f32::from(face.ascender()));
        let metrics = Metrics {
            ascent,
            descent: to_pdf(f32::from(face.descender())),
            cap_height: face
                .capital_height()
                .map_or(ascent, |height| to_pdf(f32::from(height))),
            bbox: [
                to_pdf(f32::from(bbox.x_min)),
                to_pdf(f32::from(bbox.y_min)),
                to_pdf(f32::from(bbox.x_max)),
                to_pdf(f32::from(bbox.y_max)),
            ],
        };

        let name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .map(|name| sanitize_name(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_NAME.to_string());

        Ok(Self {
            name,
            data,
            metrics,
            glyphs,
            widths,
        })
    }

    /// PostScript name used as the embedded `BaseFont`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the font has a glyph for `c`.
    #[must_use]
    pub fn covers(&self, c: char) -> bool {
        self.glyphs.contains_key(&c)
    }

    /// Glyph id for `c`; 0 (`.notdef`) when the font lacks it.
    pub(super) fn glyph(&self, c: char) -> u16 {
        self.glyphs.get(&c).copied().unwrap_or(0)
    }

    /// Encodes `text` as big-endian glyph ids, recording each glyph used.
    pub(super) fn encode(&self, text: &str, used: &mut BTreeMap<u16, char>) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let gid = self.glyph(c);
            if gid != 0 {
                used.entry(gid).or_insert(c);
            }
            bytes.extend_from_slice(&gid.to_be_bytes());
        }
        bytes
    }

    /// Writes the font program, descriptor, CID font, `ToUnicode` map and the
    /// Type0 dictionary; the Type0 font lands at `font_id`.
    pub(super) fn embed(&self, doc: &mut Document, font_id: ObjectId, used: &BTreeMap<u16, char>) {
        let length = i64::try_from(self.data.len()).unwrap_or(i64::MAX);
        let file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => length },
            self.data.clone(),
        ));

        let [x_min, y_min, x_max, y_max] = self.metrics.bbox;
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(self.name.as_bytes().to_vec()),
            "Flags" => 32,
            "FontBBox" => vec![
                Object::Integer(x_min),
                Object::Integer(y_min),
                Object::Integer(x_max),
                Object::Integer(y_max),
            ],
            "ItalicAngle" => 0,
            "Ascent" => self.metrics.ascent,
            "Descent" => self.metrics.descent,
            "CapHeight" => self.metrics.cap_height,
            "StemV" => 80,
            "FontFile2" => file_id,
        });

        let mut widths = Vec::with_capacity(used.len() * 2);
        for gid in used.keys() {
            let width = self.widths.get(gid).copied().unwrap_or(1000);
            widths.push(Object::Integer(i64::from(*gid)));
            widths.push(Object::Array(vec![Object::Integer(width)]));
        }

        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => Object::Name(self.name.as_bytes().to_vec()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let to_unicode_id = doc.add_object(Stream::new(
            Dictionary::new(),
            to_unicode_cmap(used).into_bytes(),
        ));

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => Object::Name(self.name.as_bytes().to_vec()),
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(cid_font_id)],
                "ToUnicode" => to_unicode_id,
            }),
        );
    }

    /// Font with glyph ids assigned in order of first appearance in `text`.
    #[cfg(test)]
    pub(crate) fn synthetic(text: &str) -> Self {
        let mut glyphs = HashMap::new();
        let mut widths = HashMap::new();
        for c in text.chars() {
            let next = u16::try_from(glyphs.len() + 1).unwrap_or(u16::MAX);
            let gid = *glyphs.entry(c).or_insert(next);
            widths.insert(gid, 600);
        }
        Self {
            name: FALLBACK_NAME.to_string(),
            data: b"synthetic font program".to_vec(),
            metrics: Metrics {
                ascent: 800,
                descent: -200,
                cap_height: 700,
                bbox: [0, -200, 1000, 800],
            },
            glyphs,
            widths,
        }
    }
}

/// Keeps the characters a PDF name can carry unescaped.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
        .collect()
}

/// Builds a `ToUnicode` CMap from glyph ids to UTF-16BE.
fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );
    let entries: Vec<_> = used.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        let _ = writeln!(cmap, "{} beginbfchar", block.len());
        for (gid, c) in block {
            let mut units = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
