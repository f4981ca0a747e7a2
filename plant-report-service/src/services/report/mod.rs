//! PDF report rendering.
//!
//! The report is a fixed A4 template: title, generation date, divider, the
//! analysed image in a 250pt square, a heading and the analysis paragraphs.
//! Layout math is done top-down in points and converted to printpdf's
//! bottom-up millimetres only when drawing.

pub mod file;
pub mod layout;

pub use file::ReportFile;

use chrono::NaiveDate;
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const IMAGE_BOX: f32 = 250.0;
const IMAGE_GAP_AFTER: f32 = 30.0;
const IMAGE_DPI: f32 = 300.0;

const TITLE: &str = "Plant Analysis Report";
const HEADING: &str = "Plant Analysis";
const TITLE_SIZE: f32 = 22.0;
const HEADING_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 12.0;
const BODY_LINE_GAP: f32 = 4.0;

const ACCENT: (u8, u8, u8) = (0x2e, 0x7d, 0x32);
const BLACK: (u8, u8, u8) = (0, 0, 0);
const DIVIDER: (u8, u8, u8) = (0xaa, 0xaa, 0xaa);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that goes into one report.
#[derive(Debug, Clone)]
pub struct ReportContent {
    pub analysis: String,
    /// Encoded image bytes (PNG, JPEG, WebP, ...).
    pub image: Option<Vec<u8>>,
    pub generated_on: NaiveDate,
}

/// Renders [`ReportContent`] into the fixed report template.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render the report into a file at `path`, which is created or truncated.
    /// Returns the number of pages written.
    pub fn render_to_path(
        &self,
        content: &ReportContent,
        path: &Path,
    ) -> Result<usize, RenderError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let pages = self.render(content, &mut writer)?;
        writer.flush()?;
        Ok(pages)
    }

    /// Render into the file owned by `report` and hand the guard back with
    /// the page count. On error the guard is dropped here, removing the file.
    pub fn render_into(
        &self,
        content: &ReportContent,
        report: ReportFile,
    ) -> Result<(usize, ReportFile), RenderError> {
        let pages = self.render_to_path(content, report.path())?;
        Ok((pages, report))
    }

    /// Render the report into any writer. Returns the number of pages.
    pub fn render<W: Write>(
        &self,
        content: &ReportContent,
        writer: &mut BufWriter<W>,
    ) -> Result<usize, RenderError> {
        // Decode before touching the document so a bad image fails fast
        let decoded = content
            .image
            .as_deref()
            .map(|bytes| image::load_from_memory(bytes).map(normalize_pixels))
            .transpose()?;

        let (doc, page, layer) =
            PdfDocument::new(TITLE, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?;
        let layer = doc.get_page(page).get_layer(layer);

        let mut composer = Composer {
            doc: &doc,
            layer,
            font,
            y: MARGIN,
            pages: 1,
        };

        composer.centered_line(TITLE, TITLE_SIZE, ACCENT);
        composer.move_down(0.5, TITLE_SIZE);
        composer.centered_line(
            &format!("Generated on: {}", content.generated_on.format("%a %b %d %Y")),
            BODY_SIZE,
            BLACK,
        );
        composer.move_down(1.0, BODY_SIZE);
        composer.divider();
        composer.move_down(1.5, BODY_SIZE);

        if let Some(picture) = decoded {
            composer.image(picture);
        }

        composer.underlined_line(HEADING, HEADING_SIZE, ACCENT);
        composer.move_down(1.0, HEADING_SIZE);

        let text = layout::to_printable(&content.analysis);
        for paragraph in layout::split_paragraphs(&text) {
            for line in layout::wrap_text(&paragraph, BODY_SIZE, CONTENT_WIDTH) {
                composer.body_line(&line);
            }
            composer.move_down(0.8, BODY_SIZE);
        }

        let pages = composer.pages;
        doc.save(writer).map_err(pdf_error)?;
        Ok(pages)
    }
}

/// Reduce any decoded image to 8-bit RGB, or RGBA when it carries an alpha
/// channel so printpdf can emit a soft mask for the transparent areas.
fn normalize_pixels(picture: DynamicImage) -> DynamicImage {
    if picture.color().has_alpha() {
        DynamicImage::ImageRgba8(picture.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(picture.to_rgb8())
    }
}

fn pdf_error<E: std::fmt::Debug>(e: E) -> RenderError {
    RenderError::Pdf(format!("{:?}", e))
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

/// A top-down cursor over the document that starts new pages as needed.
struct Composer<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    /// Distance of the cursor from the top edge of the page.
    y: f32,
    pages: usize,
}

impl Composer<'_> {
    fn move_down(&mut self, lines: f32, font_size: f32) {
        self.y += lines * layout::line_height(font_size);
    }

    /// Start a new page unless `height` still fits above the bottom margin.
    fn ensure_space(&mut self, height: f32) {
        if self.y + height <= PAGE_HEIGHT - MARGIN {
            return;
        }
        let (page, layer) = self
            .doc
            .add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = MARGIN;
        self.pages += 1;
    }

    fn text_at(&self, text: &str, font_size: f32, x: f32, color: (u8, u8, u8)) {
        let baseline = self.y + font_size * layout::ASCENT;
        self.layer.set_fill_color(rgb(color));
        self.layer.use_text(
            text,
            font_size,
            mm(x),
            mm(PAGE_HEIGHT - baseline),
            &self.font,
        );
    }

    fn horizontal_rule(&self, y: f32, x1: f32, x2: f32, color: (u8, u8, u8), thickness: f32) {
        self.layer.set_outline_color(rgb(color));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(mm(x1), mm(PAGE_HEIGHT - y)), false),
                (Point::new(mm(x2), mm(PAGE_HEIGHT - y)), false),
            ],
            is_closed: false,
        });
    }

    fn centered_line(&mut self, text: &str, font_size: f32, color: (u8, u8, u8)) {
        let height = layout::line_height(font_size);
        self.ensure_space(height);
        let x = MARGIN + (CONTENT_WIDTH - layout::text_width(text, font_size)).max(0.0) / 2.0;
        self.text_at(text, font_size, x, color);
        self.y += height;
    }

    fn underlined_line(&mut self, text: &str, font_size: f32, color: (u8, u8, u8)) {
        let height = layout::line_height(font_size);
        self.ensure_space(height);
        self.text_at(text, font_size, MARGIN, color);

        let underline_y = self.y + font_size * layout::ASCENT + font_size * 0.1;
        let width = layout::text_width(text, font_size);
        self.horizontal_rule(underline_y, MARGIN, MARGIN + width, color, font_size / 16.0);
        self.y += height;
    }

    fn body_line(&mut self, text: &str) {
        let height = layout::line_height(BODY_SIZE) + BODY_LINE_GAP;
        self.ensure_space(height);
        if !text.is_empty() {
            self.text_at(text, BODY_SIZE, MARGIN, BLACK);
        }
        self.y += height;
    }

    fn divider(&mut self) {
        self.horizontal_rule(self.y, MARGIN, PAGE_WIDTH - MARGIN, DIVIDER, 1.0);
    }

    /// Draw the image stretched into the fixed square box, centred.
    fn image(&mut self, picture: DynamicImage) {
        self.ensure_space(IMAGE_BOX);

        let (width_px, height_px) = (picture.width().max(1), picture.height().max(1));
        // Natural size at the chosen DPI, in points
        let natural_width = width_px as f32 * 72.0 / IMAGE_DPI;
        let natural_height = height_px as f32 * 72.0 / IMAGE_DPI;

        let x = (PAGE_WIDTH - IMAGE_BOX) / 2.0;
        let bottom = self.y + IMAGE_BOX;

        Image::from_dynamic_image(&picture).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(x)),
                translate_y: Some(mm(PAGE_HEIGHT - bottom)),
                scale_x: Some(IMAGE_BOX / natural_width),
                scale_y: Some(IMAGE_BOX / natural_height),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );

        self.y = bottom + IMAGE_GAP_AFTER;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb as Pixel, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Pixel([46, 125, 50]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn transparent_png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgba([46, 125, 50, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn pdf_files(dir: &Path) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    fn render(content: &ReportContent) -> Result<(usize, Vec<u8>), RenderError> {
        let mut writer = BufWriter::new(Vec::new());
        let pages = ReportRenderer::new().render(content, &mut writer)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| RenderError::Io(e.into_error()))?;
        Ok((pages, bytes))
    }

    fn content(analysis: &str, image: Option<Vec<u8>>) -> ReportContent {
        ReportContent {
            analysis: analysis.to_string(),
            image,
            generated_on: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        }
    }

    #[test]
    fn renders_pdf_with_image() {
        let (pages, pdf) = render(&content("A\n\nB", Some(png_bytes()))).unwrap();
        assert_eq!(pages, 1);
        assert!(pdf.starts_with(b"%PDF"));
        assert!(pdf.len() > 500);
    }

    #[test]
    fn renders_without_image() {
        let (pages, pdf) = render(&content("Only text", None)).unwrap();
        assert_eq!(pages, 1);
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn long_analysis_spills_onto_more_pages() {
        let long = vec!["Water when the top inch of soil is dry."; 400].join("\n\n");
        let (pages, pdf) = render(&content(&long, Some(png_bytes()))).unwrap();

        assert!(pages > 1, "expected pagination, got {pages} page(s)");
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn rejects_undecodable_image() {
        let result = render(&content("A", Some(b"definitely not an image".to_vec())));
        assert!(matches!(result, Err(RenderError::Image(_))));
    }

    #[test]
    fn render_to_path_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");

        ReportRenderer::new()
            .render_to_path(&content("A\n\nB", Some(png_bytes())), &path)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_western_european_text() {
        let (pages, pdf) = render(&content(
            "Caf\u{e9} Phal\u{e6}nopsis\n\nEspa\u{f1}a, gr\u{fc}n, 18\u{b0}C",
            None,
        ))
        .unwrap();
        assert_eq!(pages, 1);
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn keeps_alpha_channel_of_transparent_images() {
        let decoded = image::load_from_memory(&transparent_png_bytes()).unwrap();
        assert!(normalize_pixels(decoded).color().has_alpha());

        let opaque = image::load_from_memory(&png_bytes()).unwrap();
        assert!(!normalize_pixels(opaque).color().has_alpha());
    }

    #[test]
    fn renders_transparent_png() {
        let (pages, pdf) = render(&content("A", Some(transparent_png_bytes()))).unwrap();
        assert_eq!(pages, 1);
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn guard_outlives_write_in_abandoned_blocking_task() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportFile::create(dir.path()).await.unwrap();
        let doc = content("A\n\nB", Some(png_bytes()));
        let renderer = ReportRenderer::new();

        // Nobody awaits the task, as when the client has gone away
        let task = tokio::task::spawn_blocking(move || renderer.render_into(&doc, report));
        drop(task);

        let mut leftovers = pdf_files(dir.path());
        for _ in 0..200 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            leftovers = pdf_files(dir.path());
            if leftovers.is_empty() {
                break;
            }
        }
        assert!(leftovers.is_empty(), "leftover files: {leftovers:?}");
    }

    #[tokio::test]
    async fn render_into_keeps_file_until_guard_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportFile::create(dir.path()).await.unwrap();
        let path = report.path().to_path_buf();

        let (pages, report) = ReportRenderer::new()
            .render_into(&content("A", None), report)
            .unwrap();
        assert_eq!(pages, 1);
        assert!(path.exists());

        drop(report);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn render_into_failure_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportFile::create(dir.path()).await.unwrap();

        let result =
            ReportRenderer::new().render_into(&content("A", Some(b"not an image".to_vec())), report);

        assert!(matches!(result, Err(RenderError::Image(_))));
        assert!(pdf_files(dir.path()).is_empty());
    }
}
