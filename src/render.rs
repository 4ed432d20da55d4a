use std::fmt::Write;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::store::{write_atomic, Catalog};

/// Expands a catalog into the published document, one linked thumbnail
/// per record in catalog order.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    thumbnail_size: u32,
}

impl Renderer {
    pub fn new(thumbnail_size: u32) -> Self {
        Renderer { thumbnail_size }
    }

    pub fn render(&self, catalog: &Catalog) -> String {
        let mut out = String::new();
        for record in catalog.iter() {
            writeln!(
                out,
                r#"<a href="{href}"><img src="{src}" alt="{alt}" width="{size}" height="{size}"></a>"#,
                href = escape_attr(&record.id),
                src = escape_attr(&record.asset_path),
                alt = escape_attr(&record.display_name),
                size = self.thumbnail_size,
            )
            .expect("write to String");
        }
        out
    }
}

/// Overwrite the output document in one step.
pub fn write_document(path: &Path, document: &str) -> Result<()> {
    write_atomic(path, document.as_bytes())?;
    info!("Wrote {} bytes to {:?}", document.len(), path);
    Ok(())
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
