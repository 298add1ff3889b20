// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document renderer — the full pipeline from uploaded documents to one
// watermarked, signed PDF.
//
// normalize -> crop -> fit -> watermark -> assemble -> sign

use image::RgbImage;
use pagemark_core::error::Result;
use pagemark_core::{
    FeatureFlags, InputDocument, MessageProvider, RenderId, RenderParameters, StaticFeatureFlags,
    StaticMessages,
};
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::crop::{CropPolicy, IdentityCrop};
use crate::fit::PageFitter;
use crate::normalize::{DefaultRasterizer, PageRasterizer, SourceNormalizer, default_rasterizer};
use crate::pdf::{PageAssembler, Signer, UnsignedSigner};
use crate::watermark::{WatermarkOptions, Watermarker};

/// Message key of the tenant watermark.
pub const WATERMARK_KEY: &str = "tenant.pdf.watermark";
/// Message key used when a caller supplies a blank custom watermark.
pub const DEFAULT_WATERMARK_KEY: &str = "tenant.pdf.watermark.default";

/// Separator appended to custom watermark text between repetitions.
const CUSTOM_TEXT_SUFFIX: &str = "   ";

/// Renders input documents into a single watermarked PDF.
///
/// Configuration and collaborators are read-only after construction, so one
/// renderer can serve concurrent calls; every call draws its randomness from
/// its own generator.
pub struct DocumentRenderer<R, S, F, M> {
    params: RenderParameters,
    normalizer: SourceNormalizer<R>,
    crop: Box<dyn CropPolicy>,
    fitter: PageFitter,
    watermarker: Watermarker,
    assembler: PageAssembler,
    signer: S,
    flags: F,
    messages: M,
}

impl DocumentRenderer<DefaultRasterizer, UnsignedSigner, StaticFeatureFlags, StaticMessages> {
    /// Renderer with the default rasterizer, no signing, all flags off and
    /// no localised messages.
    ///
    /// With the `pdfium` feature this binds pdfium and fails when the library
    /// cannot be found. Without it, PDF pages that paint text or vectors are
    /// omitted from the output.
    pub fn with_defaults(params: RenderParameters) -> Result<Self> {
        Self::new(
            params,
            default_rasterizer()?,
            UnsignedSigner,
            StaticFeatureFlags::default(),
            StaticMessages::new(),
        )
    }
}

impl<R, S, F, M> DocumentRenderer<R, S, F, M>
where
    R: PageRasterizer,
    S: Signer,
    F: FeatureFlags,
    M: MessageProvider,
{
    pub fn new(params: RenderParameters, rasterizer: R, signer: S, flags: F, messages: M) -> Result<Self> {
        params.validate()?;
        // Pages take the output media box's proportions; the raster page
        // only caps their width.
        let max_width = params.max_page.width;
        Ok(Self {
            normalizer: SourceNormalizer::new(rasterizer, params.media_box, max_width),
            crop: Box::new(IdentityCrop),
            fitter: PageFitter::new(params.media_box, max_width),
            watermarker: Watermarker::new(max_width, params.qr_margin)?,
            assembler: PageAssembler::from_parameters(&params),
            params,
            signer,
            flags,
            messages,
        })
    }

    /// Replace the crop policy.
    pub fn with_crop(mut self, crop: impl CropPolicy + 'static) -> Self {
        self.crop = Box::new(crop);
        self
    }

    pub fn parameters(&self) -> &RenderParameters {
        &self.params
    }

    /// Render with the tenant's configured watermark.
    pub fn render(&self, inputs: &[InputDocument]) -> Result<Vec<u8>> {
        let text = self.default_text();
        self.render_with_rng(inputs, &text, &mut rand::rng())
    }

    /// Render with a caller-supplied watermark. Blank text selects the
    /// generic default watermark.
    pub fn render_with_text(&self, inputs: &[InputDocument], text: &str) -> Result<Vec<u8>> {
        let text = self.custom_text(text);
        self.render_with_rng(inputs, &text, &mut rand::rng())
    }

    /// Watermark text used by [`render`](Self::render).
    pub fn default_text(&self) -> String {
        self.messages
            .message_or(WATERMARK_KEY, &self.params.locale, &self.params.default_watermark)
    }

    /// Watermark text used by [`render_with_text`](Self::render_with_text).
    pub fn custom_text(&self, text: &str) -> String {
        if text.trim().is_empty() {
            self.messages.message_or(
                DEFAULT_WATERMARK_KEY,
                &self.params.locale,
                &self.params.fallback_watermark,
            )
        } else {
            format!("{text}{CUSTOM_TEXT_SUFFIX}")
        }
    }

    /// Run the pipeline with `text` as the exact watermark and `rng` as the
    /// source of every random choice.
    ///
    /// Any stage failure aborts the whole call; no partial PDF is produced.
    #[instrument(skip_all, fields(render_id = %RenderId::new(), inputs = inputs.len()))]
    pub fn render_with_rng<G: Rng + ?Sized>(
        &self,
        inputs: &[InputDocument],
        text: &str,
        rng: &mut G,
    ) -> Result<Vec<u8>> {
        let mut pages: Vec<RgbImage> = Vec::new();

        for (index, input) in inputs.iter().enumerate() {
            let images = self.normalizer.normalize(input)?;
            debug!(index, images = images.len(), "Input normalised");

            for image in images {
                let Some(cropped) = self.crop.crop(image) else {
                    debug!(index, "Image dropped by crop policy");
                    continue;
                };
                let fitted = self.fitter.fit(cropped)?;
                let options = WatermarkOptions::from_flags(&self.flags);
                pages.push(self.watermarker.apply(fitted, text, options, rng)?);
            }
        }

        let mut document = self.assembler.assemble(&pages)?;
        drop(pages);

        let mut output = Vec::new();
        self.signer.sign(&mut document, &mut output)?;

        info!(bytes_len = output.len(), "Document rendered");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::EmbeddedImageRasterizer;
    use image::{DynamicImage, ImageFormat, Rgb};
    use lopdf::{Document, Object};
    use pagemark_core::{PagemarkError, PageDimension, Stage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    fn small_params() -> RenderParameters {
        RenderParameters {
            max_page: PageDimension::with_dpi(124, 175, 15),
            ..RenderParameters::default()
        }
    }

    fn png(w: u32, h: u32) -> InputDocument {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([30, 90, 150])))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        InputDocument::from_mime(out, "image/png")
    }

    fn renderer(
        params: RenderParameters,
    ) -> DocumentRenderer<EmbeddedImageRasterizer, UnsignedSigner, StaticFeatureFlags, StaticMessages>
    {
        DocumentRenderer::new(
            params,
            EmbeddedImageRasterizer,
            UnsignedSigner,
            StaticFeatureFlags::default(),
            StaticMessages::new(),
        )
        .unwrap()
    }

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).unwrap().get_pages().len()
    }

    #[test]
    fn default_text_comes_from_messages_then_config() {
        let renderer = renderer(RenderParameters::default());
        assert_eq!(renderer.default_text(), RenderParameters::default().default_watermark);

        let messages = StaticMessages::new().with("fr", WATERMARK_KEY, "LOCATION ");
        let renderer = DocumentRenderer::new(
            RenderParameters::default(),
            EmbeddedImageRasterizer,
            UnsignedSigner,
            StaticFeatureFlags::default(),
            messages,
        )
        .unwrap();
        assert_eq!(renderer.default_text(), "LOCATION ");
    }

    #[test]
    fn custom_text_gets_a_separator() {
        let renderer = renderer(RenderParameters::default());
        assert_eq!(renderer.custom_text("DOSSIER 42"), "DOSSIER 42   ");
    }

    #[test]
    fn blank_custom_text_falls_back() {
        let renderer = renderer(RenderParameters::default());
        assert_eq!(renderer.custom_text("  \t "), RenderParameters::default().fallback_watermark);

        let messages = StaticMessages::new().with("fr", DEFAULT_WATERMARK_KEY, "GENERIQUE ");
        let renderer = DocumentRenderer::new(
            RenderParameters::default(),
            EmbeddedImageRasterizer,
            UnsignedSigner,
            StaticFeatureFlags::default(),
            messages,
        )
        .unwrap();
        assert_eq!(renderer.custom_text(""), "GENERIQUE ");
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let params = RenderParameters {
            compression_quality: 0,
            ..RenderParameters::default()
        };
        let err = DocumentRenderer::new(
            params,
            EmbeddedImageRasterizer,
            UnsignedSigner,
            StaticFeatureFlags::default(),
            StaticMessages::new(),
        )
        .err()
        .unwrap();
        assert_eq!(err.stage(), Stage::Setup);
    }

    #[test]
    fn images_become_pages_in_order() {
        let renderer = renderer(small_params());
        let mut rng = StdRng::seed_from_u64(5);
        let pdf = renderer
            .render_with_rng(&[png(60, 80), png(90, 40)], "TEST   ", &mut rng)
            .unwrap();
        assert_eq!(page_count(&pdf), 2);
    }

    #[test]
    fn crop_policy_can_drop_images() {
        let renderer = renderer(small_params())
            .with_crop(|image: DynamicImage| (image.width() > 70).then_some(image));
        let mut rng = StdRng::seed_from_u64(5);
        let pdf = renderer
            .render_with_rng(&[png(60, 80), png(90, 40)], "TEST   ", &mut rng)
            .unwrap();
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn pages_take_the_media_box_proportions() {
        // US Letter output, raster page capped at 200 px wide.
        let params = RenderParameters {
            media_box: PageDimension::new(612, 792),
            max_page: PageDimension::with_dpi(200, 259, 24),
            ..RenderParameters::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let pdf = renderer(params)
            .render_with_rng(&[png(60, 200), png(300, 100)], "LETTER   ", &mut rng)
            .unwrap();

        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);
        for page_id in pages.values() {
            let page = doc.get_dictionary(*page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            assert_eq!(media_box[2].as_i64().unwrap(), 612);
            assert_eq!(media_box[3].as_i64().unwrap(), 792);

            let image_id = page
                .get(b"Resources")
                .and_then(Object::as_dict)
                .and_then(|r| r.get(b"XObject"))
                .and_then(Object::as_dict)
                .and_then(|x| x.get(b"Im0"))
                .and_then(Object::as_reference)
                .unwrap();
            let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
            let width = image.dict.get(b"Width").unwrap().as_i64().unwrap() as f32;
            let height = image.dict.get(b"Height").unwrap().as_i64().unwrap() as f32;
            assert!(width <= 200.0);

            // Drawn full width, the image fills the page height exactly.
            let drawn_height = height * 612.0 / width;
            assert!((drawn_height - 792.0).abs() <= 792.0 / width, "drawn {drawn_height}");
        }
    }

    #[test]
    fn no_inputs_gives_an_empty_document() {
        let renderer = renderer(small_params());
        let pdf = renderer.render(&[]).unwrap();
        assert_eq!(page_count(&pdf), 0);
    }

    #[test]
    fn blank_resolved_text_fails_in_the_watermark_stage() {
        let renderer = renderer(small_params());
        let mut rng = StdRng::seed_from_u64(5);
        let err = renderer
            .render_with_rng(&[png(10, 10)], "", &mut rng)
            .unwrap_err();
        assert!(matches!(err, PagemarkError::Watermark(_)));
        assert_eq!(err.stage(), Stage::Watermark);
    }

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _: &mut Document, _: &mut dyn std::io::Write) -> Result<()> {
            Err(PagemarkError::Signing("key unavailable".into()))
        }
    }

    #[test]
    fn signer_failure_is_propagated() {
        let renderer = DocumentRenderer::new(
            small_params(),
            EmbeddedImageRasterizer,
            FailingSigner,
            StaticFeatureFlags::default(),
            StaticMessages::new(),
        )
        .unwrap();
        let err = renderer.render(&[png(20, 20)]).unwrap_err();
        assert_eq!(err.stage(), Stage::Sign);
    }
}
