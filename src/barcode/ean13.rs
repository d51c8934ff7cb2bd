// SPDX-License-Identifier: GPL-3.0-only

//! EAN-13 scan-line decoder and label renderer
//!
//! A symbol is 95 modules wide: start guard (3), six left digits (7 each),
//! middle guard (5), six right digits (7 each), end guard (3). Every digit is
//! two bars and two spaces, so a full symbol is 59 alternating runs starting
//! with a bar. Left digits use the L or G code; the L/G pattern of the six
//! left digits encodes the leading (13th) digit.

use crate::constants::decoder;
use image::{GrayImage, Luma};
use tracing::trace;

/// Run widths of the L code, space first
const L_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// L/G pattern of the left half for each leading digit (bit set = G, MSB first)
const PARITY_PATTERNS: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

const SYMBOL_MODULES: u32 = 95;
const SYMBOL_RUNS: usize = 59;
const MIN_ROW_CONTRAST: u8 = 40;

/// Check digit for the first twelve digits
pub fn check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn parse_digits(code: &str) -> Option<Vec<u8>> {
    if code.len() != 13 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(code.bytes().map(|b| b - b'0').collect())
}

/// Whether `code` is 13 digits with a correct check digit
pub fn is_valid(code: &str) -> bool {
    parse_digits(code).is_some_and(|digits| check_digit(&digits) == digits[12])
}

fn push_runs(modules: &mut Vec<bool>, widths: &[u8; 4], starts_with_bar: bool) {
    let mut bar = starts_with_bar;
    for &width in widths {
        modules.extend(std::iter::repeat_n(bar, width as usize));
        bar = !bar;
    }
}

/// The 95-module bar pattern of a valid code (`true` = bar)
pub fn encode_modules(code: &str) -> Option<Vec<bool>> {
    let digits = parse_digits(code)?;
    if check_digit(&digits) != digits[12] {
        return None;
    }

    let parity = PARITY_PATTERNS[digits[0] as usize];
    let mut modules = Vec::with_capacity(SYMBOL_MODULES as usize);
    modules.extend([true, false, true]);

    for (position, &digit) in digits[1..7].iter().enumerate() {
        let mut widths = L_WIDTHS[digit as usize];
        if (parity >> (5 - position)) & 1 == 1 {
            widths.reverse();
        }
        push_runs(&mut modules, &widths, false);
    }

    modules.extend([false, true, false, true, false]);

    for &digit in &digits[7..13] {
        push_runs(&mut modules, &L_WIDTHS[digit as usize], true);
    }

    modules.extend([true, false, true]);
    Some(modules)
}

/// Render a printable label: black bars on white with quiet zones
pub fn render_label(code: &str) -> Option<GrayImage> {
    let modules = encode_modules(code)?;
    let module_width = decoder::LABEL_MODULE_WIDTH;
    let quiet = decoder::LABEL_QUIET_MODULES;
    let width = (SYMBOL_MODULES + 2 * quiet) * module_width;
    let margin = decoder::LABEL_BAR_HEIGHT / 6;
    let height = decoder::LABEL_BAR_HEIGHT + 2 * margin;

    Some(GrayImage::from_fn(width, height, |x, y| {
        let module = (x / module_width) as i64 - quiet as i64;
        let in_bars = y >= margin && y < margin + decoder::LABEL_BAR_HEIGHT;
        let bar = in_bars
            && module >= 0
            && modules.get(module as usize).copied().unwrap_or(false);
        if bar { Luma([0]) } else { Luma([255]) }
    }))
}

/// Scan rows of an upright image for an EAN-13 symbol
///
/// Each row is read left to right and right to left, so a symbol upside
/// down still decodes.
pub fn decode(image: &GrayImage) -> Option<String> {
    let (width, height) = image.dimensions();
    if width < SYMBOL_MODULES || height == 0 {
        return None;
    }

    let lines = decoder::EAN13_SCAN_LINES.min(height);
    // Start from the centre row, where a framed barcode usually is
    let mut rows: Vec<u32> = (0..lines).map(|i| height * (i + 1) / (lines + 1)).collect();
    rows.sort_by_key(|&y| (y as i64 - height as i64 / 2).abs());
    rows.dedup();

    for y in rows {
        let row: Vec<u8> = (0..width).map(|x| image.get_pixel(x, y).0[0]).collect();
        let Some(mut runs) = binarize_runs(&row) else {
            continue;
        };
        if let Some(code) = decode_runs(&runs) {
            trace!(row = y, "EAN-13 found");
            return Some(code);
        }
        runs.reverse();
        if let Some(code) = decode_runs(&runs) {
            trace!(row = y, "EAN-13 found (reversed)");
            return Some(code);
        }
    }
    None
}

/// Run-length encode a row after thresholding at its mid-level
fn binarize_runs(row: &[u8]) -> Option<Vec<(bool, u32)>> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    if max - min < MIN_ROW_CONTRAST {
        return None;
    }
    let threshold = ((min as u16 + max as u16) / 2) as u8;

    let mut runs: Vec<(bool, u32)> = Vec::new();
    for &value in row {
        let bar = value < threshold;
        match runs.last_mut() {
            Some((color, len)) if *color == bar => *len += 1,
            _ => runs.push((bar, 1)),
        }
    }
    Some(runs)
}

fn decode_runs(runs: &[(bool, u32)]) -> Option<String> {
    if runs.len() < SYMBOL_RUNS + 1 {
        return None;
    }
    (1..=runs.len() - SYMBOL_RUNS)
        .filter(|&start| runs[start].0)
        .find_map(|start| decode_at(runs, start))
}

fn decode_at(runs: &[(bool, u32)], start: usize) -> Option<String> {
    let widths: Vec<f32> = runs[start..start + SYMBOL_RUNS]
        .iter()
        .map(|&(_, len)| len as f32)
        .collect();
    let module = widths.iter().sum::<f32>() / SYMBOL_MODULES as f32;
    if module < 1.0 {
        return None;
    }

    // Quiet zone before the start guard
    if (runs[start - 1].1 as f32) < 3.0 * module {
        return None;
    }

    let guards = [0..3, 27..32, 56..59];
    for range in guards {
        if widths[range]
            .iter()
            .any(|&w| w < 0.5 * module || w > 1.5 * module)
        {
            return None;
        }
    }

    let mut digits = Vec::with_capacity(13);
    digits.push(0);
    let mut parity = 0u8;

    for position in 0..6 {
        let offset = 3 + position * 4;
        let (digit, is_g) = match_digit(&widths[offset..offset + 4], true)?;
        parity = (parity << 1) | is_g as u8;
        digits.push(digit);
    }

    for position in 0..6 {
        let offset = 32 + position * 4;
        let (digit, _) = match_digit(&widths[offset..offset + 4], false)?;
        digits.push(digit);
    }

    digits[0] = PARITY_PATTERNS.iter().position(|&p| p == parity)? as u8;
    if check_digit(&digits) != digits[12] {
        return None;
    }

    Some(digits.iter().map(|d| char::from(b'0' + d)).collect())
}

/// Match four run widths against the digit tables
///
/// Returns the digit and whether it was G-coded. Right-half digits only
/// accept the R code, whose widths equal the L code's.
fn match_digit(widths: &[f32], left_half: bool) -> Option<(u8, bool)> {
    let total: f32 = widths.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let normalized: Vec<f32> = widths.iter().map(|w| w * 7.0 / total).collect();

    let score = |pattern: &[u8; 4], reversed: bool| -> f32 {
        (0..4)
            .map(|i| {
                let expected = if reversed { pattern[3 - i] } else { pattern[i] };
                (normalized[i] - expected as f32).abs()
            })
            .sum::<f32>()
            / 4.0
    };

    let mut best: Option<(f32, u8, bool)> = None;
    for (digit, pattern) in L_WIDTHS.iter().enumerate() {
        let mut candidates = vec![(score(pattern, false), false)];
        if left_half {
            candidates.push((score(pattern, true), true));
        }
        for (error, is_g) in candidates {
            if best.is_none_or(|(best_error, _, _)| error < best_error) {
                best = Some((error, digit as u8, is_g));
            }
        }
    }

    let (error, digit, is_g) = best?;
    (error <= decoder::EAN13_MAX_DIGIT_ERROR).then_some((digit, is_g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_digit() {
        assert!(is_valid("9780131103627"));
        assert!(is_valid("4006381333931"));
        assert!(!is_valid("9780131103628"));
        assert!(!is_valid("978013110362"));
        assert!(!is_valid("97801311036x7"));
    }

    #[test]
    fn test_encode_modules_layout() {
        let modules = encode_modules("9780131103627").unwrap();
        assert_eq!(modules.len(), 95);
        assert_eq!(&modules[0..3], &[true, false, true]);
        assert_eq!(&modules[45..50], &[false, true, false, true, false]);
        assert_eq!(&modules[92..95], &[true, false, true]);
        // Leading 9 puts the first left digit (7) in the L code: 0111011
        assert_eq!(
            &modules[3..10],
            &[false, true, true, true, false, true, true]
        );
        assert!(encode_modules("9780131103628").is_none());
    }

    #[test]
    fn test_rendered_label_decodes() {
        for code in ["9780131103627", "4006381333931", "0012345678905"] {
            let label = render_label(code).unwrap();
            assert_eq!(decode(&label).as_deref(), Some(code));
        }
    }

    #[test]
    fn test_upside_down_label_decodes() {
        let label = image::imageops::rotate180(&render_label("9780131103627").unwrap());
        assert_eq!(decode(&label).as_deref(), Some("9780131103627"));
    }

    #[test]
    fn test_scaled_label_decodes() {
        let label = render_label("4006381333931").unwrap();
        let (w, h) = label.dimensions();
        let scaled = image::imageops::resize(
            &label,
            w * 5 / 3,
            h,
            image::imageops::FilterType::Triangle,
        );
        assert_eq!(decode(&scaled).as_deref(), Some("4006381333931"));
    }

    #[test]
    fn test_blank_image_has_no_code() {
        let blank = GrayImage::from_pixel(400, 100, Luma([255]));
        assert_eq!(decode(&blank), None);
    }
}
