//! # Tienda Receipt - PNG Rasterizer
//!
//! Draws a [`ReceiptData`] into a fixed-width grayscale image and encodes it
//! as PNG. The same receipt data always produces the same bytes.
//!
//! ## Page Layout
//! ```text
//! ┌────────────────────────────────────┐  ◄── WIDTH = 400
//! │            TIENDA NORTE            │  header: store name,
//! │        COMPROBANTE DE VENTA        │          document type,
//! │          tiendanorte.com           │          site
//! ├────────────────────────────────────┤
//! │ Nro: V-000042                      │  metadata: reference,
//! │ Fecha: 19/10/2026 14:05            │            local date,
//! │ Cliente: Ana Gómez                 │            customer
//! ├────────────────────────────────────┤
//! │ Remera Lisa (M) x3         $300.00 │  body: one LINE_HEIGHT block
//! │   Desc. 10%                 -$5.00 │        per sale line
//! │ ...                                │
//! │ Subtotal                   $350.00 │
//! │ Medio de pago             Efectivo │
//! ├────────────────────────────────────┤
//! │ TOTAL                  $327.75     │  footer: total,
//! │       Gracias por su compra        │          thank-you message
//! └────────────────────────────────────┘
//!
//! height = base (sale | payment) + lines × LINE_HEIGHT
//! ```
//!
//! Text is drawn from the public-domain `font8x8` bitmaps, scaled by whole
//! pixels. Latin-1 characters (á, ñ, °) come from the Latin table; anything
//! else prints as a solid box.

use std::io::Cursor;

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{GrayImage, ImageFormat, Luma};
use thiserror::Error;
use tracing::debug;

use tienda_core::receipt::{ReceiptBody, ReceiptData};
use tienda_core::Money;

// =============================================================================
// Layout Constants
// =============================================================================

/// Image width in pixels.
pub const WIDTH: u32 = 400;

/// Height of a sale receipt with no lines.
pub const SALE_BASE_HEIGHT: u32 = 330;

/// Height of a payment receipt.
pub const PAYMENT_BASE_HEIGHT: u32 = 350;

/// Vertical space taken by each sale line.
pub const LINE_HEIGHT: u32 = 36;

/// Hard cap on the image height.
pub const MAX_HEIGHT: u32 = 16_384;

const MARGIN: u32 = 16;
const GLYPH: u32 = 8;

const PAPER: Luma<u8> = Luma([255]);
const INK: Luma<u8> = Luma([0]);
const RULE: Luma<u8> = Luma([150]);

/// Printed for characters neither table knows.
const UNKNOWN_GLYPH: [u8; 8] = [0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x00];

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ReceiptError {
    /// ## When This Occurs
    /// A sale with so many lines the page would exceed [`MAX_HEIGHT`].
    #[error("Receipt with {lines} lines is too tall to render")]
    TooTall { lines: usize },

    #[error("Failed to encode receipt image: {0}")]
    Encode(#[from] image::ImageError),
}

// =============================================================================
// Public API
// =============================================================================

/// Final image height for a receipt.
pub fn page_height(receipt: &ReceiptData) -> Result<u32, ReceiptError> {
    let lines = receipt.line_count();
    let base = match receipt.body {
        ReceiptBody::Sale { .. } => SALE_BASE_HEIGHT,
        ReceiptBody::Payment { .. } => PAYMENT_BASE_HEIGHT,
    };
    u32::try_from(lines)
        .ok()
        .and_then(|n| n.checked_mul(LINE_HEIGHT))
        .and_then(|body| body.checked_add(base))
        .filter(|height| *height <= MAX_HEIGHT)
        .ok_or(ReceiptError::TooTall { lines })
}

/// Draws the receipt.
pub fn render(receipt: &ReceiptData) -> Result<GrayImage, ReceiptError> {
    let height = page_height(receipt)?;
    let image = ReceiptRenderer::new(receipt, height).render();
    debug!(
        reference = %receipt.reference,
        kind = receipt.kind.file_tag(),
        height,
        "Receipt rendered"
    );
    Ok(image)
}

/// Draws the receipt and encodes it as PNG.
pub fn render_png(receipt: &ReceiptData) -> Result<Vec<u8>, ReceiptError> {
    let image = render(receipt)?;
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

// =============================================================================
// Renderer
// =============================================================================

struct ReceiptRenderer<'a> {
    receipt: &'a ReceiptData,
    page: Page,
}

impl<'a> ReceiptRenderer<'a> {
    fn new(receipt: &'a ReceiptData, height: u32) -> Self {
        ReceiptRenderer {
            receipt,
            page: Page::new(WIDTH, height),
        }
    }

    fn render(mut self) -> GrayImage {
        self.header();
        self.metadata();
        match &self.receipt.body {
            ReceiptBody::Sale {
                lines,
                subtotal_cents,
                discount_cents,
                payment_method,
            } => {
                for line in lines {
                    let top = self.page.y;
                    self.page
                        .line_lr(&line.description, &money(line.amount_cents), 1);
                    if let Some(discount) = &line.discount {
                        self.page.line_lr(
                            &format!("  Desc. {}", discount.rate),
                            &money(-discount.amount_cents),
                            1,
                        );
                    }
                    self.page.y = top + LINE_HEIGHT;
                }
                self.page.rule();
                self.page.line_lr("Subtotal", &money(*subtotal_cents), 1);
                self.page.line_lr("Descuento", &money(-discount_cents), 1);
                self.page.line_lr("Medio de pago", payment_method, 1);
            }
            ReceiptBody::Payment {
                payment_method,
                description,
            } => {
                self.page.line_lr("Medio de pago", payment_method, 1);
                self.page.gap(4);
                self.page.line("Concepto:", 1);
                for part in wrap(description, self.page.columns(1)).iter().take(3) {
                    self.page.line(&format!("  {part}"), 1);
                }
            }
        }
        self.footer();
        self.page.image
    }

    fn header(&mut self) {
        self.page.y = 20;
        let name = self.receipt.store_name.to_uppercase();
        let scale = if name.chars().count() as u32 <= self.page.columns(3) { 3 } else { 2 };
        self.page.centered(&name, scale);
        self.page.gap(2);
        self.page.centered(self.receipt.kind.document_label(), 2);
        self.page.gap(2);
        self.page.centered(&self.receipt.site_url, 1);
        self.page.gap(6);
        self.page.rule();
    }

    fn metadata(&mut self) {
        let receipt = self.receipt;
        self.page.line(&format!("Nro: {}", receipt.reference), 1);
        self.page.line(&format!("Fecha: {}", receipt.date), 1);
        let customer = receipt.customer_name.as_deref().unwrap_or("Consumidor final");
        self.page.line(&format!("Cliente: {customer}"), 1);
        if let Some(email) = &receipt.customer_email {
            self.page.line(&format!("  {email}"), 1);
        } else {
            self.page.gap(GLYPH + 8);
        }
        self.page.rule();
    }

    fn footer(&mut self) {
        let bottom = self.page.height();
        self.page.y = bottom - 72;
        self.page.rule();
        self.page.line_lr("TOTAL", &self.receipt.total().to_string(), 2);
        self.page.y = bottom - 28;
        self.page.centered(&self.receipt.thank_you, 1);
    }
}

fn money(cents: i64) -> String {
    Money::from_cents(cents).to_string()
}

// =============================================================================
// Page Canvas
// =============================================================================

/// Grayscale page with a top-down text cursor.
struct Page {
    image: GrayImage,
    y: u32,
}

impl Page {
    fn new(width: u32, height: u32) -> Self {
        Page {
            image: GrayImage::from_pixel(width, height, PAPER),
            y: 0,
        }
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    /// Characters that fit between the margins at `scale`.
    fn columns(&self, scale: u32) -> u32 {
        (self.width() - 2 * MARGIN) / (GLYPH * scale)
    }

    fn gap(&mut self, pixels: u32) {
        self.y += pixels;
    }

    fn line(&mut self, text: &str, scale: u32) {
        let text = fit(text, self.columns(scale) as usize);
        self.draw_text(MARGIN, self.y, &text, scale);
        self.y += GLYPH * scale + 8;
    }

    fn centered(&mut self, text: &str, scale: u32) {
        let text = fit(text, self.columns(scale) as usize);
        let text_width = text.chars().count() as u32 * GLYPH * scale;
        let x = (self.width().saturating_sub(text_width)) / 2;
        self.draw_text(x, self.y, &text, scale);
        self.y += GLYPH * scale + 8;
    }

    /// Left text and right-aligned text on one row; the left side is cut
    /// short before it can touch the right side.
    fn line_lr(&mut self, left: &str, right: &str, scale: u32) {
        let columns = self.columns(scale) as usize;
        let right = fit(right, columns);
        let right_len = right.chars().count();
        let left = fit(left, columns.saturating_sub(right_len + 1));

        self.draw_text(MARGIN, self.y, &left, scale);
        let right_width = right_len as u32 * GLYPH * scale;
        let x = self.width().saturating_sub(MARGIN + right_width);
        self.draw_text(x, self.y, &right, scale);
        self.y += GLYPH * scale + 8;
    }

    fn rule(&mut self) {
        let y = self.y + 4;
        for x in MARGIN..self.width() - MARGIN {
            self.put(x, y, RULE);
        }
        self.y += 12;
    }

    fn draw_text(&mut self, x: u32, y: u32, text: &str, scale: u32) {
        for (index, c) in text.chars().enumerate() {
            let origin = x + index as u32 * GLYPH * scale;
            self.draw_glyph(origin, y, glyph(c), scale);
        }
    }

    fn draw_glyph(&mut self, x: u32, y: u32, rows: [u8; 8], scale: u32) {
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = x + col * scale;
                let py = y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        self.put(px + dx, py + dy, INK);
                    }
                }
            }
        }
    }

    fn put(&mut self, x: u32, y: u32, color: Luma<u8>) {
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, color);
        }
    }
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .unwrap_or(UNKNOWN_GLYPH)
}

/// Cuts `text` to `max` characters, marking the cut with `..`.
fn fit(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&"..".chars().take(max - keep).collect::<String>());
    out
}

/// Word-wraps `text` into rows of at most `columns` characters.
fn wrap(text: &str, columns: u32) -> Vec<String> {
    let columns = (columns as usize).saturating_sub(2).max(1);
    let mut rows = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > columns && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tienda_core::receipt::{ReceiptKind, ReceiptLine, ReceiptLineDiscount};
    use tienda_core::Percentage;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn sale_receipt(lines: usize) -> ReceiptData {
        ReceiptData {
            kind: ReceiptKind::Sale,
            record_id: "1a2b3c4d-0000-0000-0000-000000000000".to_string(),
            reference: "V-000042".to_string(),
            store_name: "Tienda Norte".to_string(),
            site_url: "tiendanorte.com".to_string(),
            thank_you: "Gracias por su compra".to_string(),
            customer_name: Some("Ana Gómez".to_string()),
            customer_email: None,
            date: "19/10/2026 14:05".to_string(),
            body: ReceiptBody::Sale {
                lines: (0..lines)
                    .map(|i| ReceiptLine {
                        description: format!("Remera Lisa (M) x{}", i + 1),
                        amount_cents: 10_000 * (i as i64 + 1),
                        discount: (i == 0).then(|| ReceiptLineDiscount {
                            rate: Percentage::from_percent(10),
                            amount_cents: 1_000,
                        }),
                    })
                    .collect(),
                subtotal_cents: 35_000,
                discount_cents: 2_225,
                payment_method: "Efectivo".to_string(),
            },
            total_cents: 32_775,
        }
    }

    fn payment_receipt() -> ReceiptData {
        ReceiptData {
            kind: ReceiptKind::Payment,
            record_id: "9f8e7d6c-0000-0000-0000-000000000000".to_string(),
            reference: "9f8e7d6c".to_string(),
            store_name: "Tienda Norte".to_string(),
            site_url: "tiendanorte.com".to_string(),
            thank_you: "Gracias por su compra".to_string(),
            customer_name: Some("Luis Pérez".to_string()),
            customer_email: Some("luis@example.com".to_string()),
            date: "19/10/2026 14:05".to_string(),
            body: ReceiptBody::Payment {
                payment_method: "Transferencia".to_string(),
                description: "Pago - Transferencia".to_string(),
            },
            total_cents: 20_000,
        }
    }

    fn ink_rows(image: &GrayImage, from: u32, to: u32) -> usize {
        (from..to.min(image.height()))
            .filter(|y| (0..image.width()).any(|x| image.get_pixel(x, *y)[0] == 0))
            .count()
    }

    #[test]
    fn test_page_height() {
        assert_eq!(page_height(&sale_receipt(0)).unwrap(), 330);
        assert_eq!(page_height(&sale_receipt(3)).unwrap(), 330 + 3 * 36);
        assert_eq!(page_height(&payment_receipt()).unwrap(), 350);

        let image = render(&sale_receipt(2)).unwrap();
        assert_eq!(image.dimensions(), (WIDTH, 402));
    }

    #[test]
    fn test_png_output_is_deterministic() {
        let receipt = sale_receipt(3);
        let first = render_png(&receipt).unwrap();
        let second = render_png(&receipt).unwrap();

        assert_eq!(&first[..8], &PNG_SIGNATURE);
        assert_eq!(first, second);

        let decoded = image::load_from_memory(&first).unwrap();
        assert_eq!(decoded.width(), WIDTH);
        assert_eq!(decoded.height(), 330 + 3 * 36);
    }

    #[test]
    fn test_sale_and_payment_differ() {
        let sale = render_png(&sale_receipt(1)).unwrap();
        let payment = render_png(&payment_receipt()).unwrap();
        assert_ne!(sale, payment);

        let mut renamed = sale_receipt(1);
        renamed.customer_name = Some("Otra Persona".to_string());
        assert_ne!(render_png(&renamed).unwrap(), sale);
    }

    #[test]
    fn test_every_block_has_ink() {
        let image = render(&sale_receipt(2)).unwrap();
        let height = image.height();

        assert!(ink_rows(&image, 0, 100) > 20, "header");
        assert!(ink_rows(&image, 100, 190) > 10, "metadata");
        assert!(ink_rows(&image, 190, 190 + 2 * LINE_HEIGHT) > 10, "lines");
        assert!(ink_rows(&image, height - 30, height) > 4, "thank-you");
    }

    #[test]
    fn test_odd_text_does_not_panic() {
        let mut receipt = sale_receipt(1);
        receipt.store_name = "Una tienda con un nombre larguísimo de verdad".to_string();
        receipt.customer_name = None;
        if let ReceiptBody::Sale { lines, .. } = &mut receipt.body {
            lines[0].description = "Campera 🧥 con descripción muy, muy, muy larga x1".repeat(3);
        }
        let bytes = render_png(&receipt).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let mut payment = payment_receipt();
        payment.body = ReceiptBody::Payment {
            payment_method: "Efectivo".to_string(),
            description: "palabra ".repeat(60),
        };
        assert!(render_png(&payment).is_ok());
    }

    #[test]
    fn test_too_tall() {
        let receipt = sale_receipt(1_000);
        assert!(matches!(
            render_png(&receipt),
            Err(ReceiptError::TooTall { lines: 1_000 })
        ));
    }

    #[test]
    fn test_fit_and_wrap() {
        assert_eq!(fit("Remera", 10), "Remera");
        assert_eq!(fit("Remera Lisa", 8), "Remera..");
        assert_eq!(fit("ab", 1), ".");

        let rows = wrap("Pago parcial de la cuenta de marzo", 14);
        assert_eq!(rows, vec!["Pago parcial", "de la cuenta", "de marzo"]);
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn test_latin_glyphs_are_drawn() {
        assert_ne!(glyph('ñ'), UNKNOWN_GLYPH);
        assert_ne!(glyph('é'), UNKNOWN_GLYPH);
        assert_eq!(glyph('🧥'), UNKNOWN_GLYPH);
        assert_eq!(glyph(' '), [0; 8]);
    }
}
