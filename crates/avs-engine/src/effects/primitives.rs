//! Line/disc/triangle drawers and the built-in 5x7 bitmap font.
//!
//! Every drawer routes through [`blend_pixel`], which honors the shared
//! legacy line-blend table when `globals.legacy_render` is active.

use crate::context::FrameView;
use crate::globals::LegacyRender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::opaque(0, 0, 0)
    }
}

impl Rgba {
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Unpack a 24-bit `0xRRGGBB` value.
    pub fn from_u32(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
            a: 255,
        }
    }

    /// Linear blend between two palette entries with integer weights out of
    /// `cycle` (the palette-cursor convention).
    pub fn cycle_blend(a: Self, b: Self, weight_b: i32, cycle: i32) -> Self {
        let weight_a = (cycle - 1) - weight_b;
        let mix = |x: u8, y: u8| {
            ((i32::from(x) * weight_a + i32::from(y) * weight_b) / cycle).clamp(0, 255) as u8
        };
        Self {
            r: mix(a.r, b.r),
            g: mix(a.g, b.g),
            b: mix(a.b, b.b),
            a: 255,
        }
    }
}

/// Parse a color token: `#rrggbb`, `0x…`, bare hex, or decimal.
pub fn parse_color_token(token: &str) -> Option<Rgba> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (digits, base) = if let Some(rest) = trimmed.strip_prefix('#') {
        (rest, 16)
    } else if let Some(rest) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        (rest, 16)
    } else if trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        (trimmed, 16)
    } else {
        (trimmed, 10)
    };
    u32::from_str_radix(digits, base).ok().map(Rgba::from_u32)
}

/// Split a `colors=` list on commas/semicolons/whitespace.
pub fn parse_color_list(raw: &str) -> Vec<Rgba> {
    raw.split([',', ';', '\n', ' ', '\t'])
        .filter(|t| !t.is_empty())
        .filter_map(parse_color_token)
        .collect()
}

#[inline]
fn scale_channel(value: u8, alpha: u8) -> u8 {
    ((i32::from(value) * i32::from(alpha) + 127) / 255) as u8
}

#[inline]
fn blend_adjust_channel(dst: u8, src: u8, alpha: u8) -> u8 {
    let inv = 255 - alpha;
    ((i32::from(dst) * i32::from(inv) + i32::from(src) * i32::from(alpha) + 127) / 255) as u8
}

/// Line width override carried in byte 2 of the legacy render mode.
pub fn legacy_line_width(legacy: &LegacyRender) -> Option<i32> {
    if !legacy.line_blend_mode_active {
        return None;
    }
    let width = ((legacy.line_blend_mode >> 16) & 0xFF) as i32;
    if width > 0 { Some(width) } else { None }
}

/// Composite one pixel. Without an active legacy mode this is a plain alpha
/// blend weighted by `coverage`; with it, the mode byte selects one of the
/// ten legacy line-blend entries and `coverage` pre-scales the source.
pub fn blend_pixel(fb: &mut FrameView<'_>, legacy: &LegacyRender, x: i32, y: i32, color: Rgba, coverage: u8) {
    if x < 0 || y < 0 || x >= fb.width || y >= fb.height {
        return;
    }
    let offset = fb.offset(x, y);
    if offset + 4 > fb.data.len() {
        return;
    }
    let effective = scale_channel(color.a, coverage);
    if effective == 0 {
        return;
    }
    let px = &mut fb.data[offset..offset + 4];

    if !legacy.line_blend_mode_active {
        px[0] = blend_adjust_channel(px[0], color.r, effective);
        px[1] = blend_adjust_channel(px[1], color.g, effective);
        px[2] = blend_adjust_channel(px[2], color.b, effective);
        px[3] = px[3].saturating_add(effective);
        return;
    }

    let mode = (legacy.line_blend_mode & 0xFF) as u8;
    let adjustable = ((legacy.line_blend_mode >> 8) & 0xFF) as u8;
    let source = [
        scale_channel(color.r, effective),
        scale_channel(color.g, effective),
        scale_channel(color.b, effective),
        effective,
    ];
    match mode {
        0 => px.copy_from_slice(&source),
        1 => {
            for c in 0..4 {
                px[c] = px[c].saturating_add(source[c]);
            }
        }
        2 => {
            for c in 0..4 {
                px[c] = px[c].max(source[c]);
            }
        }
        3 => {
            for c in 0..4 {
                px[c] = ((i32::from(px[c]) + i32::from(source[c]) + 1) / 2) as u8;
            }
        }
        4 => {
            for c in 0..4 {
                px[c] = px[c].saturating_sub(source[c]);
            }
        }
        5 => {
            for c in 0..4 {
                px[c] = source[c].saturating_sub(px[c]);
            }
        }
        6 => {
            for c in 0..4 {
                px[c] = ((i32::from(px[c]) * i32::from(source[c]) + 127) / 255) as u8;
            }
        }
        7 => {
            for c in 0..4 {
                px[c] = blend_adjust_channel(px[c], source[c], adjustable);
            }
        }
        8 => {
            for c in 0..4 {
                px[c] ^= source[c];
            }
        }
        9 => {
            for c in 0..4 {
                px[c] = px[c].min(source[c]);
            }
        }
        _ => {
            px[0] = blend_adjust_channel(px[0], color.r, effective);
            px[1] = blend_adjust_channel(px[1], color.g, effective);
            px[2] = blend_adjust_channel(px[2], color.b, effective);
            px[3] = px[3].saturating_add(effective);
        }
    }
}

/// Write a pixel unconditionally (no blend table).
pub fn put_pixel(fb: &mut FrameView<'_>, x: i32, y: i32, color: Rgba) {
    if x < 0 || y < 0 || x >= fb.width || y >= fb.height {
        return;
    }
    let offset = fb.offset(x, y);
    if offset + 4 > fb.data.len() {
        return;
    }
    fb.data[offset..offset + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
}

pub fn get_pixel(fb: &FrameView<'_>, x: i32, y: i32) -> Option<[u8; 4]> {
    if x < 0 || y < 0 || x >= fb.width || y >= fb.height {
        return None;
    }
    let offset = fb.offset(x, y);
    fb.data.get(offset..offset + 4).map(|s| [s[0], s[1], s[2], s[3]])
}

/// Bresenham line through `blend_pixel`.
pub fn draw_line(
    fb: &mut FrameView<'_>,
    legacy: &LegacyRender,
    mut x0: i32,
    mut y0: i32,
    x1: i32,
    y1: i32,
    color: Rgba,
) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        blend_pixel(fb, legacy, x0, y0, color, 255);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let twice = err * 2;
        if twice >= dy {
            err += dy;
            x0 += sx;
        }
        if twice <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_hspan(fb: &mut FrameView<'_>, legacy: &LegacyRender, mut x0: i32, mut x1: i32, y: i32, color: Rgba) {
    if y < 0 || y >= fb.height {
        return;
    }
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
    }
    for x in x0.max(0)..=x1.min(fb.width - 1) {
        blend_pixel(fb, legacy, x, y, color, 255);
    }
}

/// Midpoint-circle filled disc.
pub fn draw_filled_circle(
    fb: &mut FrameView<'_>,
    legacy: &LegacyRender,
    cx: i32,
    cy: i32,
    radius: i32,
    color: Rgba,
) {
    if radius < 0 {
        return;
    }
    let mut x = 0;
    let mut y = radius;
    let mut decision = 1 - radius;
    while y >= x {
        draw_hspan(fb, legacy, cx - y, cx + y, cy + x, color);
        draw_hspan(fb, legacy, cx - x, cx + x, cy + y, color);
        draw_hspan(fb, legacy, cx - y, cx + y, cy - x, color);
        draw_hspan(fb, legacy, cx - x, cx + x, cy - y, color);
        x += 1;
        if decision < 0 {
            decision += 2 * x + 1;
        } else {
            y -= 1;
            decision += 2 * (x - y) + 1;
        }
    }
}

/// Line stamped with a disc per step. The legacy width override wins over
/// the requested width.
pub fn draw_thick_line(
    fb: &mut FrameView<'_>,
    legacy: &LegacyRender,
    mut x0: i32,
    mut y0: i32,
    x1: i32,
    y1: i32,
    width: i32,
    color: Rgba,
) {
    let width = legacy_line_width(legacy).unwrap_or(width);
    let radius = (width / 2).max(0);
    if radius == 0 {
        draw_line(fb, legacy, x0, y0, x1, y1, color);
        return;
    }
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        draw_filled_circle(fb, legacy, x0, y0, radius, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let twice = err * 2;
        if twice >= dy {
            err += dy;
            x0 += sx;
        }
        if twice <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn edge(ax: i64, ay: i64, bx: i64, by: i64, px: i64, py: i64) -> i64 {
    (px - ax) * (by - ay) - (py - ay) * (bx - ax)
}

/// Filled triangle via half-plane test; degenerate triangles fall back to
/// their outline.
pub fn draw_filled_triangle(
    fb: &mut FrameView<'_>,
    legacy: &LegacyRender,
    p0: (i32, i32),
    p1: (i32, i32),
    p2: (i32, i32),
    color: Rgba,
) {
    let area = edge(
        i64::from(p0.0),
        i64::from(p0.1),
        i64::from(p1.0),
        i64::from(p1.1),
        i64::from(p2.0),
        i64::from(p2.1),
    );
    if area == 0 {
        draw_line(fb, legacy, p0.0, p0.1, p1.0, p1.1, color);
        draw_line(fb, legacy, p1.0, p1.1, p2.0, p2.1, color);
        draw_line(fb, legacy, p2.0, p2.1, p0.0, p0.1, color);
        return;
    }
    let positive = area > 0;

    let min_x = p0.0.min(p1.0).min(p2.0).max(0);
    let max_x = p0.0.max(p1.0).max(p2.0).min(fb.width - 1);
    let min_y = p0.1.min(p1.1).min(p2.1).max(0);
    let max_y = p0.1.max(p1.1).max(p2.1).min(fb.height - 1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let w0 = edge(
                i64::from(p1.0),
                i64::from(p1.1),
                i64::from(p2.0),
                i64::from(p2.1),
                i64::from(x),
                i64::from(y),
            );
            let w1 = edge(
                i64::from(p2.0),
                i64::from(p2.1),
                i64::from(p0.0),
                i64::from(p0.1),
                i64::from(x),
                i64::from(y),
            );
            let w2 = edge(
                i64::from(p0.0),
                i64::from(p0.1),
                i64::from(p1.0),
                i64::from(p1.1),
                i64::from(x),
                i64::from(y),
            );
            let inside = if positive {
                w0 >= 0 && w1 >= 0 && w2 >= 0
            } else {
                w0 <= 0 && w1 <= 0 && w2 <= 0
            };
            if inside {
                blend_pixel(fb, legacy, x, y, color, 255);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in 5x7 bitmap font (digits, uppercase letters, a few symbols).
// ---------------------------------------------------------------------------

pub const FONT_HEIGHT: i32 = 7;
const FONT_MAX_WIDTH: usize = 5;
const GLYPH_SPACING: i32 = 1;

struct Glyph {
    width: i32,
    columns: [u8; FONT_MAX_WIDTH],
}

fn make_glyph(rows: [&str; 7]) -> Glyph {
    let mut glyph = Glyph {
        width: 0,
        columns: [0; FONT_MAX_WIDTH],
    };
    for (row_index, row) in rows.iter().enumerate() {
        glyph.width = (row.len() as i32).min(FONT_MAX_WIDTH as i32).max(glyph.width);
        for (col, ch) in row.bytes().take(FONT_MAX_WIDTH).enumerate() {
            if ch != b' ' {
                glyph.columns[col] |= 1 << row_index;
            }
        }
    }
    glyph
}

fn glyph_for(c: char) -> Option<Glyph> {
    let rows: [&str; 7] = match c {
        '0' => [" ### ", "#   #", "#  ##", "# # #", "##  #", "#   #", " ### "],
        '1' => ["  #  ", " ##  ", "  #  ", "  #  ", "  #  ", "  #  ", " ### "],
        '2' => [" ### ", "#   #", "    #", "   # ", "  #  ", " #   ", "#####"],
        '3' => [" ### ", "#   #", "    #", " ### ", "    #", "#   #", " ### "],
        '4' => ["   # ", "  ## ", " # # ", "#  # ", "#####", "   # ", "   # "],
        '5' => ["#####", "#    ", "#    ", "#### ", "    #", "#   #", " ### "],
        '6' => [" ### ", "#   #", "#    ", "#### ", "#   #", "#   #", " ### "],
        '7' => ["#####", "    #", "   # ", "  #  ", " #   ", " #   ", " #   "],
        '8' => [" ### ", "#   #", "#   #", " ### ", "#   #", "#   #", " ### "],
        '9' => [" ### ", "#   #", "#   #", " ####", "    #", "#   #", " ### "],
        'A' => [" ### ", "#   #", "#   #", "#####", "#   #", "#   #", "#   #"],
        'B' => ["#### ", "#   #", "#   #", "#### ", "#   #", "#   #", "#### "],
        'C' => [" ### ", "#   #", "#    ", "#    ", "#    ", "#   #", " ### "],
        'D' => ["#### ", "#   #", "#   #", "#   #", "#   #", "#   #", "#### "],
        'E' => ["#####", "#    ", "#    ", "#### ", "#    ", "#    ", "#####"],
        'F' => ["#####", "#    ", "#    ", "#### ", "#    ", "#    ", "#    "],
        'G' => [" ### ", "#   #", "#    ", "# ###", "#   #", "#   #", " ####"],
        'H' => ["#   #", "#   #", "#   #", "#####", "#   #", "#   #", "#   #"],
        'I' => [" ### ", "  #  ", "  #  ", "  #  ", "  #  ", "  #  ", " ### "],
        'J' => ["  ###", "   # ", "   # ", "   # ", "   # ", "#  # ", " ##  "],
        'K' => ["#   #", "#  # ", "# #  ", "##   ", "# #  ", "#  # ", "#   #"],
        'L' => ["#    ", "#    ", "#    ", "#    ", "#    ", "#    ", "#####"],
        'M' => ["#   #", "## ##", "# # #", "# # #", "#   #", "#   #", "#   #"],
        'N' => ["#   #", "##  #", "##  #", "# # #", "#  ##", "#  ##", "#   #"],
        'O' => [" ### ", "#   #", "#   #", "#   #", "#   #", "#   #", " ### "],
        'P' => ["#### ", "#   #", "#   #", "#### ", "#    ", "#    ", "#    "],
        'Q' => [" ### ", "#   #", "#   #", "#   #", "# # #", "#  # ", " ## #"],
        'R' => ["#### ", "#   #", "#   #", "#### ", "# #  ", "#  # ", "#   #"],
        'S' => [" ####", "#    ", "#    ", " ### ", "    #", "    #", "#### "],
        'T' => ["#####", "  #  ", "  #  ", "  #  ", "  #  ", "  #  ", "  #  "],
        'U' => ["#   #", "#   #", "#   #", "#   #", "#   #", "#   #", " ### "],
        'V' => ["#   #", "#   #", "#   #", "#   #", "#   #", " # # ", "  #  "],
        'W' => ["#   #", "#   #", "#   #", "# # #", "# # #", "## ##", "#   #"],
        'X' => ["#   #", "#   #", " # # ", "  #  ", " # # ", "#   #", "#   #"],
        'Y' => ["#   #", "#   #", " # # ", "  #  ", "  #  ", "  #  ", "  #  "],
        'Z' => ["#####", "    #", "   # ", "  #  ", " #   ", "#    ", "#####"],
        '=' => ["     ", "#####", "     ", "#####", "     ", "     ", "     "],
        '-' => ["     ", "     ", "#####", "     ", "     ", "     ", "     "],
        '+' => ["  #  ", "  #  ", "#####", "  #  ", "  #  ", "     ", "     "],
        '.' => ["     ", "     ", "     ", "     ", "     ", " ##  ", " ##  "],
        ':' => ["     ", " ##  ", " ##  ", "     ", " ##  ", " ##  ", "     "],
        '%' => ["##  #", "## # ", "  #  ", "  #  ", " #   ", "# ## ", "#  ##"],
        ' ' => ["     ", "     ", "     ", "     ", "     ", "     ", "     "],
        _ => return None,
    };
    Some(make_glyph(rows))
}

fn sanitize_char(c: char) -> char {
    if c.is_ascii_alphabetic() {
        c.to_ascii_uppercase()
    } else if c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | '=' | ':' | '%' | ' ') {
        c
    } else {
        ' '
    }
}

/// Draw text with the built-in bitmap font. Unknown characters advance the
/// cursor; everything is clipped to the frame.
pub fn draw_text(fb: &mut FrameView<'_>, origin_x: i32, origin_y: i32, text: &str, color: Rgba) {
    let mut cursor_x = origin_x;
    for raw in text.chars() {
        let c = sanitize_char(raw);
        let Some(glyph) = glyph_for(c) else {
            cursor_x += GLYPH_SPACING + 2;
            continue;
        };
        for col in 0..glyph.width {
            let bits = glyph.columns[col as usize];
            for row in 0..FONT_HEIGHT {
                if bits & (1 << row) == 0 {
                    continue;
                }
                put_pixel(fb, cursor_x + col, origin_y + row, color);
            }
        }
        cursor_x += glyph.width + GLYPH_SPACING;
    }
}

/// Pixel width of `text` as `draw_text` renders it.
pub fn text_width(text: &str) -> i32 {
    let mut width = 0;
    for raw in text.chars() {
        match glyph_for(sanitize_char(raw)) {
            Some(glyph) => width += glyph.width + GLYPH_SPACING,
            None => width += GLYPH_SPACING + 2,
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: i32, h: i32) -> (Vec<u8>, i32, i32) {
        (vec![0u8; (w * h * 4) as usize], w, h)
    }

    #[test]
    fn color_token_parsing() {
        assert_eq!(parse_color_token("#ff0000"), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(parse_color_token("0x00FF00"), Some(Rgba::opaque(0, 255, 0)));
        assert_eq!(parse_color_token("255"), Some(Rgba::opaque(0, 2, 85)));
        assert_eq!(parse_color_token(""), None);
        assert_eq!(parse_color_list("ff0000, 00ff00").len(), 2);
    }

    #[test]
    fn line_endpoints_are_painted() {
        let (mut pixels, w, h) = frame(8, 8);
        let mut fb = FrameView {
            data: &mut pixels,
            width: w,
            height: h,
        };
        let legacy = LegacyRender::default();
        draw_line(&mut fb, &legacy, 0, 0, 7, 7, Rgba::WHITE);
        assert_ne!(get_pixel(&fb, 0, 0).unwrap()[0], 0);
        assert_ne!(get_pixel(&fb, 7, 7).unwrap()[0], 0);
    }

    #[test]
    fn drawing_clips_outside_frame() {
        let (mut pixels, w, h) = frame(4, 4);
        let mut fb = FrameView {
            data: &mut pixels,
            width: w,
            height: h,
        };
        let legacy = LegacyRender::default();
        draw_line(&mut fb, &legacy, -10, -10, 20, 20, Rgba::WHITE);
        draw_filled_circle(&mut fb, &legacy, -2, -2, 5, Rgba::WHITE);
        // reached here without panicking; frame corner painted by the line
        assert!(get_pixel(&fb, 0, 0).unwrap()[0] > 0);
    }

    #[test]
    fn legacy_xor_mode_routes_through_table() {
        let (mut pixels, w, h) = frame(2, 2);
        let mut fb = FrameView {
            data: &mut pixels,
            width: w,
            height: h,
        };
        let legacy = LegacyRender {
            line_blend_mode_active: true,
            line_blend_mode: 8, // XOR
        };
        blend_pixel(&mut fb, &legacy, 0, 0, Rgba::opaque(0xF0, 0, 0), 255);
        blend_pixel(&mut fb, &legacy, 0, 0, Rgba::opaque(0xF0, 0, 0), 255);
        // XOR twice cancels out
        assert_eq!(get_pixel(&fb, 0, 0).unwrap()[0], 0);
    }

    #[test]
    fn triangle_fills_interior() {
        let (mut pixels, w, h) = frame(16, 16);
        let mut fb = FrameView {
            data: &mut pixels,
            width: w,
            height: h,
        };
        let legacy = LegacyRender::default();
        draw_filled_triangle(&mut fb, &legacy, (1, 1), (14, 1), (7, 14), Rgba::WHITE);
        assert!(get_pixel(&fb, 7, 5).unwrap()[0] > 0);
        assert_eq!(get_pixel(&fb, 0, 15).unwrap()[0], 0);
    }

    #[test]
    fn text_marks_pixels_and_reports_width() {
        let (mut pixels, w, h) = frame(64, 10);
        let mut fb = FrameView {
            data: &mut pixels,
            width: w,
            height: h,
        };
        draw_text(&mut fb, 1, 1, "A1", Rgba::WHITE);
        let lit = pixels.chunks_exact(4).filter(|px| px[0] > 0).count();
        assert!(lit > 5);
        assert!(text_width("A1") > 0);
        assert!(text_width("WW") > text_width("I"));
    }
}
