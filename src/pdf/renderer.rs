// src/pdf/renderer.rs
//! Render contract for the printable certificate.
//!
//! The orchestration layer only depends on the [`CertificateRenderer`]
//! trait: holder data plus the normalized photo and signature images in,
//! PDF bytes out. [`TemplateRenderer`] is the default single-page
//! implementation; anything beyond this contract (layout, typography,
//! localization) is a presentation concern.

use crate::models::certificate::Certificate;
use printpdf::{BuiltinFont, ImageTransform, Mm, PdfDocument};
use thiserror::Error;

/// A failure while producing PDF bytes.
#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Renders a certificate record into printable PDF bytes.
///
/// `photo` and `signature` are the normalized PNG blobs from the local
/// blob store.
pub trait CertificateRenderer: Send + Sync {
    fn render(
        &self,
        certificate: &Certificate,
        photo: &[u8],
        signature: &[u8],
    ) -> Result<Vec<u8>, RenderError>;
}

/// Default template: one F4-sized portrait page with the institution
/// header, holder fields, the holder photo and the signing-authority
/// signature.
pub struct TemplateRenderer;

impl CertificateRenderer for TemplateRenderer {
    fn render(
        &self,
        certificate: &Certificate,
        photo: &[u8],
        signature: &[u8],
    ) -> Result<Vec<u8>, RenderError> {
        // F4 ("folio") paper, the size ijazah documents are printed on.
        let (doc, page, layer) = PdfDocument::new(
            format!("Ijazah {}", certificate.certificate_number),
            Mm(215.0),
            Mm(330.0),
            "certificate",
        );
        let canvas = doc.get_page(page).get_layer(layer);

        let serif = doc
            .add_builtin_font(BuiltinFont::TimesRoman)
            .map_err(|e| RenderError(e.to_string()))?;
        let serif_bold = doc
            .add_builtin_font(BuiltinFont::TimesBold)
            .map_err(|e| RenderError(e.to_string()))?;

        canvas.use_text("IJAZAH", 28.0, Mm(88.0), Mm(300.0), &serif_bold);
        canvas.use_text(
            format!("Nomor: {}", certificate.certificate_number),
            12.0,
            Mm(80.0),
            Mm(290.0),
            &serif,
        );

        let fields = [
            ("Nama", certificate.holder_name.as_str()),
            ("NIM", certificate.nim.as_str()),
            ("Program Studi", certificate.study_program.as_str()),
            ("Fakultas", certificate.faculty.as_str()),
            ("Tanggal Lulus", certificate.graduation_date.as_str()),
        ];
        let mut y = 250.0;
        for (label, value) in fields {
            canvas.use_text(label, 12.0, Mm(30.0), Mm(y), &serif);
            canvas.use_text(format!(": {}", value), 12.0, Mm(75.0), Mm(y), &serif_bold);
            y -= 10.0;
        }

        let photo_image = printpdf::image_crate::load_from_memory(photo)
            .map_err(|e| RenderError(format!("photo decode: {}", e)))?;
        printpdf::Image::from_dynamic_image(&photo_image).add_to_layer(
            canvas.clone(),
            ImageTransform {
                translate_x: Some(Mm(150.0)),
                translate_y: Some(Mm(210.0)),
                dpi: Some(300.0),
                ..Default::default()
            },
        );

        let signature_image = printpdf::image_crate::load_from_memory(signature)
            .map_err(|e| RenderError(format!("signature decode: {}", e)))?;
        printpdf::Image::from_dynamic_image(&signature_image).add_to_layer(
            canvas.clone(),
            ImageTransform {
                translate_x: Some(Mm(130.0)),
                translate_y: Some(Mm(60.0)),
                dpi: Some(300.0),
                ..Default::default()
            },
        );

        canvas.use_text("Rektor", 12.0, Mm(140.0), Mm(50.0), &serif);

        doc.save_to_bytes().map_err(|e| RenderError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::CertificateStatus;
    use image::ImageOutputFormat;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    fn sample() -> Certificate {
        Certificate {
            id: "ijazah_1700000000000".to_string(),
            holder_name: "Jane Doe".to_string(),
            nim: "12345678901".to_string(),
            study_program: "Informatika".to_string(),
            faculty: "Teknik".to_string(),
            graduation_date: "2023-09-16".to_string(),
            certificate_number: "IJZ/2023/0001".to_string(),
            content_address: String::new(),
            signature_id: "signature_1".to_string(),
            photo_reference: "photo_1.png".to_string(),
            status: CertificateStatus::Active,
            created_at: "2023-09-16T08:00:00+00:00".to_string(),
            updated_at: "2023-09-16T08:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = TemplateRenderer
            .render(&sample(), &png(496, 659), &png(667, 276))
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 1_000);
    }

    #[test]
    fn rejects_non_image_photo() {
        let err = TemplateRenderer
            .render(&sample(), b"not an image", &png(667, 276))
            .unwrap_err();
        assert!(err.to_string().contains("photo decode"));
    }
}
