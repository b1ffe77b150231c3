//! File-backed editor used by the command line.
//! 命令列使用的檔案式編輯器。
//!
//! Nothing is ever "open" from the engine's point of view: every handle is a
//! short-lived view over a file on disk or a blank canvas.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use projectpages_core::{
    DocumentHandle, EditorError, EditorService, FlatRender, NewDocument, Rect,
};

const CANVAS_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug)]
enum Source {
    Blank { width: u32, height: u32 },
    File(PathBuf),
}

#[derive(Debug, Default)]
pub struct ImageEditor {
    next_handle: u64,
    documents: HashMap<DocumentHandle, Source>,
}

impl ImageEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, source: Source) -> DocumentHandle {
        self.next_handle += 1;
        let handle = DocumentHandle::new(self.next_handle);
        self.documents.insert(handle, source);
        handle
    }

    fn source(&self, handle: DocumentHandle) -> Result<&Source, EditorError> {
        self.documents
            .get(&handle)
            .ok_or(EditorError::UnknownHandle(handle))
    }

    fn pixels(&self, handle: DocumentHandle) -> Result<DynamicImage, EditorError> {
        match self.source(handle)? {
            Source::Blank { width, height } => Ok(DynamicImage::ImageRgba8(
                RgbaImage::from_pixel(*width, *height, CANVAS_COLOR),
            )),
            Source::File(path) => decode(path).map_err(|reason| EditorError::Open {
                path: path.clone(),
                reason,
            }),
        }
    }
}

/// Decodes by content so PNG-encoded `.kra` pages load too.
fn decode(path: &Path) -> Result<DynamicImage, String> {
    ImageReader::open(path)
        .map_err(|err| err.to_string())?
        .with_guessed_format()
        .map_err(|err| err.to_string())?
        .decode()
        .map_err(|err| err.to_string())
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, String> {
    let rgba = image.to_rgba8();
    let mut data = Vec::new();
    PngEncoder::new(&mut data)
        .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
        .map_err(|err| err.to_string())?;
    Ok(data)
}

impl EditorService for ImageEditor {
    fn list_open_documents(&self) -> BTreeSet<PathBuf> {
        BTreeSet::new()
    }

    fn render_thumbnail(&self, path: &Path, rect: Rect) -> Result<Vec<u8>, EditorError> {
        let render_error = |reason: String| EditorError::Render {
            path: path.to_path_buf(),
            reason,
        };
        let image = decode(path).map_err(render_error)?;
        encode_png(&image.thumbnail(rect.width, rect.height)).map_err(render_error)
    }

    fn create_document(&mut self, template: &NewDocument) -> Result<DocumentHandle, EditorError> {
        if template.width == 0 || template.height == 0 {
            return Err(EditorError::Create(format!(
                "invalid canvas {}x{}",
                template.width, template.height
            )));
        }
        Ok(self.register(Source::Blank {
            width: template.width,
            height: template.height,
        }))
    }

    fn open_document(&mut self, path: &Path) -> Result<DocumentHandle, EditorError> {
        if !path.is_file() {
            return Err(EditorError::Open {
                path: path.to_path_buf(),
                reason: "not a file".to_string(),
            });
        }
        Ok(self.register(Source::File(path.to_path_buf())))
    }

    fn save_document_as(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), EditorError> {
        let save_error = |reason: String| EditorError::Save {
            path: path.to_path_buf(),
            reason,
        };
        match self.source(handle)? {
            Source::File(source) => {
                fs::copy(source, path).map_err(|err| save_error(err.to_string()))?;
            }
            Source::Blank { .. } => {
                let data = encode_png(&self.pixels(handle)?).map_err(save_error)?;
                fs::write(path, data).map_err(|err| save_error(err.to_string()))?;
            }
        }
        self.documents.insert(handle, Source::File(path.to_path_buf()));
        Ok(())
    }

    fn close_document(&mut self, handle: DocumentHandle) -> Result<(), EditorError> {
        self.documents
            .remove(&handle)
            .map(|_| ())
            .ok_or(EditorError::UnknownHandle(handle))
    }

    fn animation_frames(&self, _handle: DocumentHandle) -> Option<RangeInclusive<u32>> {
        None
    }

    fn export_flat(
        &mut self,
        handle: DocumentHandle,
        destination: &Path,
        render: FlatRender,
    ) -> Result<(), EditorError> {
        let mut image = self.pixels(handle)?;
        if let Some(edge) = render.max_edge {
            if image.width().max(image.height()) > edge {
                image = image.resize(edge, edge, FilterType::Lanczos3);
            }
        }
        let format = ImageFormat::from_path(destination).unwrap_or(ImageFormat::Png);
        image
            .save_with_format(destination, format)
            .map_err(|err| EditorError::Save {
                path: destination.to_path_buf(),
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn template(width: u32, height: u32) -> NewDocument {
        NewDocument {
            name: "page_0001".into(),
            width,
            height,
            colorspace: "RGBA".into(),
            bitdepth: "U8".into(),
            dpi: 300,
        }
    }

    #[test]
    fn blank_page_round_trips_through_kra_file() {
        let dir = tempdir().unwrap();
        let page = dir.path().join("page_0001.kra");
        let mut editor = ImageEditor::new();

        let handle = editor.create_document(&template(40, 20)).unwrap();
        editor.save_document_as(handle, &page).unwrap();
        editor.close_document(handle).unwrap();

        let thumb = editor.render_thumbnail(&page, Rect::square(10)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 5));
    }

    #[test]
    fn export_caps_longest_edge() {
        let dir = tempdir().unwrap();
        let page = dir.path().join("page.kra");
        let out = dir.path().join("page.png");
        let mut editor = ImageEditor::new();
        let blank = editor.create_document(&template(300, 150)).unwrap();
        editor.save_document_as(blank, &page).unwrap();

        let handle = editor.open_document(&page).unwrap();
        editor
            .export_flat(
                handle,
                &out,
                FlatRender {
                    frame: None,
                    max_edge: Some(60),
                },
            )
            .unwrap();
        let exported = image::open(&out).unwrap();
        assert_eq!((exported.width(), exported.height()), (60, 30));
    }

    #[test]
    fn undecodable_file_fails_to_render() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        fs::write(&bogus, b"not an image").unwrap();
        let editor = ImageEditor::new();
        assert!(matches!(
            editor.render_thumbnail(&bogus, Rect::square(16)),
            Err(EditorError::Render { .. })
        ));
    }
}
