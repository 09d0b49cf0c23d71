//! Completions over local images.
//!
//! Images are sent inline as base64 `data:` URLs. Multi-page documents are first turned
//! into page images by a [`PageRenderer`]; this crate ships no renderer of its own.

use crate::threadline::error::{ClientError, DocumentError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_VISION_MODEL: &str = "gpt-4-vision-preview";
pub const DEFAULT_VISION_MAX_TOKENS: u32 = 4096;

/// Extensions recognised as images, lowercase and without the dot.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "tif"];

/// Base64 (standard alphabet) of the file at `path`.
pub fn encode_image(path: impl AsRef<Path>) -> Result<String, ClientError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ClientError::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BASE64.encode(bytes))
}

/// One prompt plus the images it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub prompt: String,
    pub image_paths: Vec<PathBuf>,
    pub model: String,
    pub max_tokens: u32,
}

impl VisionRequest {
    pub fn new(prompt: impl Into<String>, image_paths: Vec<PathBuf>) -> Self {
        VisionRequest {
            prompt: prompt.into(),
            image_paths,
            model: DEFAULT_VISION_MODEL.to_string(),
            max_tokens: DEFAULT_VISION_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request body for `POST /chat/completions`: a single user message whose content is
    /// the prompt followed by one image part per file. Reads every image.
    pub fn to_payload(&self) -> Result<Value, ClientError> {
        let mut content = vec![json!({ "type": "text", "text": self.prompt })];
        for path in &self.image_paths {
            let encoded = encode_image(path)?;
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/jpeg;base64,{}", encoded) },
            }));
        }

        Ok(json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": self.max_tokens,
        }))
    }
}

fn has_extension(path: &Path, candidates: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| candidates.iter().any(|c| ext.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

/// Names of the image files in `dir` whose name starts with `stem`, sorted.
pub fn list_image_files(dir: impl AsRef<Path>, stem: &str) -> Result<Vec<String>, ClientError> {
    let dir = dir.as_ref();
    let io_err = |source| ClientError::File {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with(stem) && has_extension(Path::new(&name), &IMAGE_EXTENSIONS) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Name a renderer gives page `page` (1-based) of a document with stem `stem`.
pub fn page_image_name(stem: &str, page: usize) -> String {
    format!("{}_{}.png", stem, page)
}

/// Turns a multi-page document into one image per page.
pub trait PageRenderer {
    /// Render `document` and return the page images in page order.
    fn render_pages(&self, document: &Path) -> Result<Vec<PathBuf>, DocumentError>;
}

/// Images to send for `document`: PDFs go through `renderer`, anything else is sent as
/// a single image.
pub fn images_for_document(
    document: &Path,
    renderer: &dyn PageRenderer,
) -> Result<Vec<PathBuf>, DocumentError> {
    if !has_extension(document, &["pdf"]) {
        return Ok(vec![document.to_path_buf()]);
    }

    let pages = renderer.render_pages(document)?;
    if pages.is_empty() {
        return Err(DocumentError::NoPages {
            path: document.to_path_buf(),
        });
    }
    log::debug!(
        "images_for_document(...): {} rendered into {} page(s)",
        document.display(),
        pages.len()
    );
    Ok(pages)
}
