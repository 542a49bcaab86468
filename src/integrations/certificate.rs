//! One-page PDF certificates of authenticity, issued per purchased artwork.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("pdf error: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone)]
pub struct CertificateData {
    pub certificate_no: String,
    pub artwork_title: String,
    pub artist_name: String,
    pub buyer_name: String,
    pub invoice_number: String,
    pub quantity: i32,
    pub price: i64,
    pub issued_at: DateTime<Utc>,
}

pub fn certificate_number(invoice_number: &str, line: usize) -> String {
    format!("CERT-{}-{:02}", invoice_number.trim_start_matches("INV-"), line + 1)
}

/// Renders the certificate. With a TrueType `font` every script prints as given;
/// without one the built-in Helvetica is used and text is limited to Latin-1.
pub fn render_certificate(
    data: &CertificateData,
    font: Option<&[u8]>,
) -> Result<Vec<u8>, CertificateError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Certificate {}", data.certificate_no),
        Mm(297.0),
        Mm(210.0),
        "certificate",
    );
    let (regular, bold) = match font {
        Some(bytes) => {
            let regular = doc
                .add_external_font(Cursor::new(bytes))
                .map_err(pdf_error)?;
            (regular.clone(), regular)
        }
        None => (
            doc.add_builtin_font(BuiltinFont::Helvetica)
                .map_err(pdf_error)?,
            doc.add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(pdf_error)?,
        ),
    };
    let printable = |text: &str| {
        if font.is_some() {
            text.to_string()
        } else {
            latin1(text)
        }
    };
    let layer = doc.get_page(page).get_layer(layer);

    layer.use_text("Certificate of Authenticity", 30.0, Mm(30.0), Mm(170.0), &bold);
    layer.use_text(
        format!("No. {}", printable(&data.certificate_no)),
        12.0,
        Mm(30.0),
        Mm(160.0),
        &regular,
    );

    let rows = [
        ("Artwork", printable(&data.artwork_title)),
        ("Artist", printable(&data.artist_name)),
        ("Collector", printable(&data.buyer_name)),
        ("Invoice", printable(&data.invoice_number)),
        ("Quantity", data.quantity.to_string()),
        ("Price", data.price.to_string()),
        ("Issued", data.issued_at.format("%Y-%m-%d").to_string()),
    ];
    let mut y = 135.0;
    for (label, value) in rows {
        write_row(&layer, &bold, &regular, label, &value, y);
        y -= 12.0;
    }

    layer.use_text(
        "This document certifies that the artwork above is an original sold through ArtMarket.",
        10.0,
        Mm(30.0),
        Mm(30.0),
        &regular,
    );

    doc.save_to_bytes().map_err(pdf_error)
}

fn write_row(
    layer: &PdfLayerReference,
    label_font: &IndirectFontRef,
    value_font: &IndirectFontRef,
    label: &str,
    value: &str,
    y: f32,
) {
    layer.use_text(label, 14.0, Mm(30.0), Mm(y), label_font);
    layer.use_text(value, 14.0, Mm(80.0), Mm(y), value_font);
}

/// Built-in PDF fonts only cover Latin-1; anything outside it is replaced.
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
        .collect()
}

fn pdf_error(err: printpdf::Error) -> CertificateError {
    CertificateError::Pdf(format!("{err:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CertificateData {
        CertificateData {
            certificate_no: certificate_number("INV-20260101-abcdef12", 0),
            artwork_title: "Morning on the Perfume River".into(),
            artist_name: "Lê Thị Hà".into(),
            buyer_name: "Jane Doe".into(),
            invoice_number: "INV-20260101-abcdef12".into(),
            quantity: 1,
            price: 1_500_000,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = render_certificate(&sample(), None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn unreadable_font_is_an_error() {
        assert!(matches!(
            render_certificate(&sample(), Some(&b"not a font"[..])),
            Err(CertificateError::Pdf(_))
        ));
    }

    #[test]
    fn certificate_numbers_are_per_line() {
        assert_eq!(
            certificate_number("INV-20260101-abcdef12", 2),
            "CERT-20260101-abcdef12-03"
        );
    }

    #[test]
    fn non_latin1_characters_are_replaced() {
        assert_eq!(latin1("Lê Hà"), "Lê Hà");
        assert_eq!(latin1("Lê Thị"), "Lê Th?");
    }
}
