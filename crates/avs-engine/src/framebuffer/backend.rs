//! Presentation backends the core can hand a finished frame to.

use std::path::{Path, PathBuf};

use crate::error::EngineError;

use super::CHANNELS;

/// Surface offered to the core. `data` may require a download on GPU-style
/// backends; the two backends shipped here are both direct-access.
pub trait FramebufferBackend {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn data(&mut self) -> &[u8];
    fn upload(&mut self, bytes: &[u8]) -> Result<(), EngineError>;
    fn download(&self, bytes: &mut [u8]) -> Result<(), EngineError>;
    fn clear(&mut self, r: u8, g: u8, b: u8, a: u8);
    fn resize(&mut self, width: i32, height: i32) -> Result<(), EngineError>;
    fn present(&mut self) -> Result<(), EngineError>;
    fn supports_direct_access(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

/// Plain in-memory RGBA8 surface.
pub struct CpuFramebuffer {
    width: i32,
    height: i32,
    pixels: Vec<u8>,
}

impl CpuFramebuffer {
    pub fn new(width: i32, height: i32) -> Result<Self, EngineError> {
        if width <= 0 || height <= 0 {
            return Err(EngineError::InvalidArgument(format!(
                "invalid framebuffer dimensions {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * CHANNELS],
        })
    }

    fn size_bytes(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

impl FramebufferBackend for CpuFramebuffer {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn data(&mut self) -> &[u8] {
        &self.pixels
    }

    fn upload(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        if bytes.len() != self.size_bytes() {
            return Err(EngineError::InvalidArgument(format!(
                "upload size mismatch: expected {}, got {}",
                self.size_bytes(),
                bytes.len()
            )));
        }
        self.pixels.copy_from_slice(bytes);
        Ok(())
    }

    fn download(&self, bytes: &mut [u8]) -> Result<(), EngineError> {
        if bytes.len() != self.size_bytes() {
            return Err(EngineError::InvalidArgument(format!(
                "download size mismatch: expected {}, got {}",
                self.size_bytes(),
                bytes.len()
            )));
        }
        bytes.copy_from_slice(&self.pixels);
        Ok(())
    }

    fn clear(&mut self, r: u8, g: u8, b: u8, a: u8) {
        for px in self.pixels.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&[r, g, b, a]);
        }
    }

    fn resize(&mut self, width: i32, height: i32) -> Result<(), EngineError> {
        if width <= 0 || height <= 0 {
            return Err(EngineError::InvalidArgument(format!(
                "invalid resize {width}x{height}"
            )));
        }
        self.width = width;
        self.height = height;
        self.pixels.resize(self.size_bytes(), 0);
        Ok(())
    }

    fn present(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn supports_direct_access(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "CPU"
    }
}

/// Writes one PNG per `present()`, flipping vertically. The output path is
/// either a printf-style `%…d` pattern or a stem that gets a `_%05d` suffix.
pub struct PngFramebuffer {
    inner: CpuFramebuffer,
    pattern: String,
    frame_count: u32,
}

impl PngFramebuffer {
    pub fn new(width: i32, height: i32, output_path: &str) -> Result<Self, EngineError> {
        if output_path.is_empty() {
            return Err(EngineError::InvalidArgument(
                "empty output path".to_string(),
            ));
        }
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EngineError::InvalidArgument(format!(
                        "cannot create output directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(Self {
            inner: CpuFramebuffer::new(width, height)?,
            pattern: output_path.to_string(),
            frame_count: 0,
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn filename(&self) -> PathBuf {
        if let Some(formatted) = format_frame_pattern(&self.pattern, self.frame_count) {
            return PathBuf::from(formatted);
        }
        let path = Path::new(&self.pattern);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        let ext = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        let name = format!("{stem}_{:05}.{ext}", self.frame_count);
        path.parent()
            .map_or_else(|| PathBuf::from(&name), |p| p.join(&name))
    }
}

/// Expand a single `%d`/`%05d` style placeholder, or `None` if the pattern
/// has no placeholder.
fn format_frame_pattern(pattern: &str, frame: u32) -> Option<String> {
    let percent = pattern.find('%')?;
    let rest = &pattern[percent + 1..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
    if rest.as_bytes().get(digits_end) != Some(&b'd') {
        return None;
    }
    let width_spec = &rest[..digits_end];
    let pad = width_spec.trim_start_matches('0').parse::<usize>().ok();
    let zero_pad = width_spec.starts_with('0');
    let number = match (pad, zero_pad) {
        (Some(width), true) => format!("{frame:0width$}"),
        (Some(width), false) => format!("{frame:width$}"),
        _ => frame.to_string(),
    };
    let mut out = String::with_capacity(pattern.len() + number.len());
    out.push_str(&pattern[..percent]);
    out.push_str(&number);
    out.push_str(&rest[digits_end + 1..]);
    Some(out)
}

impl FramebufferBackend for PngFramebuffer {
    fn width(&self) -> i32 {
        self.inner.width()
    }

    fn height(&self) -> i32 {
        self.inner.height()
    }

    fn data(&mut self) -> &[u8] {
        self.inner.data()
    }

    fn upload(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        self.inner.upload(bytes)
    }

    fn download(&self, bytes: &mut [u8]) -> Result<(), EngineError> {
        self.inner.download(bytes)
    }

    fn clear(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.inner.clear(r, g, b, a);
    }

    fn resize(&mut self, width: i32, height: i32) -> Result<(), EngineError> {
        self.inner.resize(width, height)
    }

    fn present(&mut self) -> Result<(), EngineError> {
        let filename = self.filename();
        let width = self.inner.width() as u32;
        let height = self.inner.height() as u32;
        let row_bytes = width as usize * CHANNELS;

        // The frame is stored top-to-bottom; flip for the on-disk format.
        let pixels = self.inner.data();
        let mut flipped = vec![0u8; pixels.len()];
        for y in 0..height as usize {
            let src = y * row_bytes;
            let dst = (height as usize - 1 - y) * row_bytes;
            flipped[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }

        image::save_buffer(
            &filename,
            &flipped,
            width,
            height,
            image::ColorType::Rgba8,
        )
        .map_err(|e| {
            EngineError::Internal(format!("failed to write PNG {}: {e}", filename.display()))
        })?;
        self.frame_count += 1;
        Ok(())
    }

    fn supports_direct_access(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "File"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_upload_download_round_trip() {
        let mut fb = CpuFramebuffer::new(2, 2).unwrap();
        let bytes: Vec<u8> = (0..16).collect();
        fb.upload(&bytes).unwrap();
        let mut out = vec![0u8; 16];
        fb.download(&mut out).unwrap();
        assert_eq!(out, bytes);
        assert!(fb.upload(&[0u8; 3]).is_err());
    }

    #[test]
    fn cpu_rejects_bad_dimensions() {
        assert!(CpuFramebuffer::new(0, 10).is_err());
        assert!(CpuFramebuffer::new(10, -1).is_err());
    }

    #[test]
    fn pattern_expansion() {
        assert_eq!(
            format_frame_pattern("out/frame_%05d.png", 7).as_deref(),
            Some("out/frame_00007.png")
        );
        assert_eq!(
            format_frame_pattern("out/f%d.png", 42).as_deref(),
            Some("out/f42.png")
        );
        assert_eq!(format_frame_pattern("out/frame.png", 0), None);
    }

    #[test]
    fn png_backend_writes_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("cap.png");
        let mut fb = PngFramebuffer::new(2, 2, pattern.to_str().unwrap()).unwrap();
        fb.clear(255, 0, 0, 255);
        fb.present().unwrap();
        fb.present().unwrap();
        assert!(dir.path().join("cap_00000.png").exists());
        assert!(dir.path().join("cap_00001.png").exists());
        assert_eq!(fb.frame_count(), 2);
    }

    #[test]
    fn png_flips_rows_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("flip_%d.png");
        let mut fb = PngFramebuffer::new(1, 2, pattern.to_str().unwrap()).unwrap();
        // top row red, bottom row blue
        fb.upload(&[255, 0, 0, 255, 0, 0, 255, 255]).unwrap();
        fb.present().unwrap();
        let img = image::open(dir.path().join("flip_0.png")).unwrap().into_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }
}
