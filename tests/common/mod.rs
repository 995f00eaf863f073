//! PDF fixtures shared by the integration tests.

#![allow(dead_code)]

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};

pub struct Fixture {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Fixture {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// `extra` carries the page boxes and anything else the test needs.
    pub fn page(mut self, content: &str, mut extra: Dictionary) -> Self {
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));
        extra.set("Type", "Page");
        extra.set("Parent", self.pages_id);
        extra.set("Contents", content_id);
        let id = self.doc.add_object(extra);
        self.kids.push(id);
        self
    }

    pub fn sized_page(self, content: &str, width: i64, height: i64) -> Self {
        self.page(content, media_box(0, 0, width, height))
    }

    pub fn info(mut self, info: Dictionary) -> Self {
        let id = self.doc.add_object(info);
        self.doc.trailer.set("Info", id);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog);
        let mut out = Vec::new();
        self.doc.save_to(&mut out).expect("save fixture");
        out
    }

    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).expect("write fixture");
        path
    }
}

pub fn media_box(x0: i64, y0: i64, x1: i64, y1: i64) -> Dictionary {
    dictionary! {
        "MediaBox" => vec![x0.into(), y0.into(), x1.into(), y1.into()],
    }
}

/// Three 200x100 pages filled red, green and blue.
pub fn three_color_pages() -> Fixture {
    Fixture::new()
        .sized_page("1 0 0 rg 0 0 200 100 re f", 200, 100)
        .sized_page("0 1 0 rg 0 0 200 100 re f", 200, 100)
        .sized_page("0 0 1 rg 0 0 200 100 re f", 200, 100)
}

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
