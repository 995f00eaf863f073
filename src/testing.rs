//! In-memory PDF fixtures for unit tests.

use lopdf::{
    Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, ObjectId,
    Stream as LoStream, dictionary,
};

pub(crate) struct PdfBuilder {
    pub doc: LoDocument,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    info: Option<LoDictionary>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = LoDocument::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            info: None,
        }
    }

    pub fn add_object(&mut self, obj: impl Into<LoObject>) -> ObjectId {
        self.doc.add_object(obj)
    }

    pub fn add_stream(&mut self, dict: LoDictionary, content: &[u8]) -> ObjectId {
        self.doc.add_object(LoStream::new(dict, content.to_vec()))
    }

    /// Adds a page whose dictionary is `extra` plus the content stream.
    /// `extra` must carry `MediaBox` unless the test relies on the fallback.
    pub fn add_page(&mut self, content: &[u8], mut extra: LoDictionary) -> ObjectId {
        let content_id = self.add_stream(LoDictionary::new(), content);
        extra.set("Type", "Page");
        extra.set("Parent", self.pages_id);
        extra.set("Contents", content_id);
        let page_id = self.doc.add_object(extra);
        self.kids.push(page_id);
        page_id
    }

    pub fn add_simple_page(&mut self, content: &[u8], width: i64, height: i64) -> ObjectId {
        self.add_page(content, media_box(width, height))
    }

    pub fn set_info(&mut self, info: LoDictionary) {
        self.info = Some(info);
    }

    pub fn finish(mut self) -> Vec<u8> {
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids.iter().map(|id| LoObject::Reference(*id)).collect::<Vec<_>>(),
            "Count" => self.kids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, LoObject::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        if let Some(info) = self.info.take() {
            let info_id = self.doc.add_object(info);
            self.doc.trailer.set("Info", info_id);
        }
        let mut out = Vec::new();
        self.doc.save_to(&mut out).expect("save pdf");
        out
    }
}

pub(crate) fn media_box(width: i64, height: i64) -> LoDictionary {
    dictionary! {
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    }
}

/// A one-page document with the given content.
pub(crate) fn single_page_pdf(content: &[u8], width: i64, height: i64) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder.add_simple_page(content, width, height);
    builder.finish()
}

/// A Type3 font whose glyph `A` (code 65) is a filled 600x700 box and whose
/// glyph `B` (code 66) is a 300-unit-wide box, in a 1/1000 glyph space.
pub(crate) fn add_box_type3_font(builder: &mut PdfBuilder) -> ObjectId {
    let a_proc = builder.add_stream(LoDictionary::new(), b"600 0 0 0 600 700 d1\n0 0 600 700 re f\n");
    let b_proc = builder.add_stream(LoDictionary::new(), b"300 0 0 0 300 700 d1\n0 0 300 700 re f\n");
    builder.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type3",
        "FontBBox" => vec![0.into(), 0.into(), 600.into(), 700.into()],
        "FontMatrix" => vec![
            LoObject::Real(0.001), 0.into(), 0.into(), LoObject::Real(0.001), 0.into(), 0.into(),
        ],
        "CharProcs" => dictionary! { "boxA" => a_proc, "boxB" => b_proc },
        "Encoding" => dictionary! {
            "Type" => "Encoding",
            "Differences" => vec![
                65.into(),
                LoObject::Name(b"boxA".to_vec()),
                LoObject::Name(b"boxB".to_vec()),
            ],
        },
        "FirstChar" => 65,
        "LastChar" => 66,
        "Widths" => vec![600.into(), 300.into()],
    })
}

fn be16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Format 4 subtable mapping `first` and `first + 1` to glyphs 1 and 2.
fn cmap_segment_subtable(first: u16) -> Vec<u8> {
    let mut t = Vec::new();
    for v in [4, 32, 0, 4, 4, 1, 0] {
        be16(&mut t, v);
    }
    for v in [first + 1, 0xFFFF, 0, first, 0xFFFF, 1u16.wrapping_sub(first), 1, 0, 0] {
        be16(&mut t, v);
    }
    t
}

/// A TrueType program on a 1000-unit em with two filled boxes: glyph 1 is
/// 600x600 with a 600 advance, glyph 2 is 300x600 with a 300 advance. The
/// (3,1) cmap maps `A` and `B` to them, the (3,0) symbol cmap U+F041 and
/// U+F042.
pub(crate) fn box_truetype_program() -> Vec<u8> {
    let boxes: [(i16, i16); 2] = [(600, 600), (300, 600)];

    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    be32(&mut loca, 0);
    be32(&mut loca, 0);
    for (w, h) in boxes {
        for v in [1, 0, 0, w, h] {
            be16(&mut glyf, v as u16);
        }
        be16(&mut glyf, 3);
        be16(&mut glyf, 0);
        glyf.extend_from_slice(&[1; 4]);
        for dx in [0, w, 0, -w] {
            be16(&mut glyf, dx as u16);
        }
        for dy in [0, 0, h, 0] {
            be16(&mut glyf, dy as u16);
        }
        be32(&mut loca, glyf.len() as u32);
    }

    let mut head = Vec::new();
    for v in [0x0001_0000, 0x0001_0000, 0, 0x5F0F_3CF5] {
        be32(&mut head, v);
    }
    be16(&mut head, 0);
    be16(&mut head, 1000);
    head.extend_from_slice(&[0; 16]);
    for v in [0, 0, 600, 600, 0, 8, 2, 1, 0] {
        be16(&mut head, v);
    }

    let mut hhea = Vec::new();
    be32(&mut hhea, 0x0001_0000);
    for v in [800, (-200i16) as u16, 0, 600, 0, 0, 600, 1, 0, 0, 0, 0, 0, 0, 0, 3] {
        be16(&mut hhea, v);
    }

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x0001_0000);
    be16(&mut maxp, 3);
    maxp.extend_from_slice(&[0; 26]);

    let mut hmtx = Vec::new();
    for advance in [500, 600, 300] {
        be16(&mut hmtx, advance);
        be16(&mut hmtx, 0);
    }

    let symbol = cmap_segment_subtable(0xF041);
    let unicode = cmap_segment_subtable(0x41);
    let mut cmap = Vec::new();
    for v in [0, 2, 3, 0] {
        be16(&mut cmap, v);
    }
    be32(&mut cmap, 20);
    be16(&mut cmap, 3);
    be16(&mut cmap, 1);
    be32(&mut cmap, 20 + symbol.len() as u32);
    cmap.extend_from_slice(&symbol);
    cmap.extend_from_slice(&unicode);

    // Table records must be sorted by tag.
    let tables: [(&[u8; 4], Vec<u8>); 7] = [
        (b"cmap", cmap),
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
    ];
    let mut out = Vec::new();
    be32(&mut out, 0x0001_0000);
    for v in [tables.len() as u16, 64, 2, 48] {
        be16(&mut out, v);
    }
    let data_start = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        be32(&mut out, 0);
        be32(&mut out, (data_start + body.len()) as u32);
        be32(&mut out, data.len() as u32);
        body.extend_from_slice(data);
        body.resize(body.len().next_multiple_of(4), 0);
    }
    out.extend_from_slice(&body);
    out
}

/// A simple TrueType font embedding [`box_truetype_program`]. The symbolic
/// variant has no `/Encoding` and resolves codes through the symbol cmap.
pub(crate) fn add_box_truetype_font(builder: &mut PdfBuilder, symbolic: bool) -> ObjectId {
    let program = box_truetype_program();
    let file = builder.add_stream(dictionary! { "Length1" => program.len() as i64 }, &program);
    let descriptor = builder.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "BoxSans",
        "Flags" => if symbolic { 4i64 } else { 32 },
        "FontBBox" => vec![0.into(), 0.into(), 600.into(), 600.into()],
        "ItalicAngle" => 0,
        "Ascent" => 800,
        "Descent" => -200,
        "CapHeight" => 600,
        "StemV" => 80,
        "FontFile2" => file,
    });
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => "BoxSans",
        "FontDescriptor" => descriptor,
    };
    if !symbolic {
        font.set("Encoding", "WinAnsiEncoding");
    }
    builder.add_object(font)
}
