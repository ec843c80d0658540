//! Shared pixel buffer that clients draw into and the display presents.

/// A single pixel. Channel values are full range, no premultiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Row-major RGB framebuffer plus the frame counter the tick loop advances.
///
/// The canvas itself is not thread-safe; callers share it behind a mutex and
/// keep each operation short.
#[derive(Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    scale: u32,
    frame: u64,
    pixels: Vec<Rgb>,
}

impl Canvas {
    /// Create a canvas of `width` x `height` logical pixels, all black.
    /// `scale` is the integer zoom factor a display applies when presenting.
    pub fn new(width: u32, height: u32, scale: u32) -> Self {
        Self {
            width,
            height,
            scale,
            frame: 0,
            pixels: vec![Rgb::BLACK; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Logical size as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Frames presented since startup.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    /// Read a pixel, or `None` outside the canvas.
    pub fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Write a pixel with alpha compositing over the existing value.
    ///
    /// `alpha` 0 leaves the canvas untouched, 255 overwrites outright, and
    /// anything in between blends with integer truncation. Out-of-bounds
    /// writes are dropped silently so hostile coordinates cost nothing.
    pub fn set(&mut self, x: u32, y: u32, color: Rgb, alpha: u8) {
        let Some(i) = self.index(x, y) else { return };
        match alpha {
            0 => {}
            0xff => self.pixels[i] = color,
            a => {
                let old = self.pixels[i];
                self.pixels[i] = Rgb {
                    r: blend(old.r, color.r, a),
                    g: blend(old.g, color.g, a),
                    b: blend(old.b, color.b, a),
                };
            }
        }
    }

    /// Fill the whole buffer with a solid color, no blending.
    pub fn clear(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// Resize the buffer, keeping the overlapping region's contents.
    /// Newly exposed pixels start black.
    pub fn resize(&mut self, width: u32, height: u32) {
        let mut next = vec![Rgb::BLACK; width as usize * height as usize];
        let keep_w = width.min(self.width) as usize;
        let keep_h = height.min(self.height) as usize;
        for y in 0..keep_h {
            let src = y * self.width as usize;
            let dst = y * width as usize;
            next[dst..dst + keep_w].copy_from_slice(&self.pixels[src..src + keep_w]);
        }
        self.width = width;
        self.height = height;
        self.pixels = next;
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}

/// Composite one channel: `(old * (255 - a) + new * a) / 255`, truncated.
fn blend(old: u8, new: u8, a: u8) -> u8 {
    ((old as u32 * (0xff - a) as u32 + new as u32 * a as u32) / 0xff) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_black() {
        let canvas = Canvas::new(4, 4, 1);
        assert_eq!(canvas.get(0, 0), Some(Rgb::BLACK));
        assert_eq!(canvas.get(3, 3), Some(Rgb::BLACK));
        assert_eq!(canvas.size(), (4, 4));
    }

    #[test]
    fn opaque_set_overwrites() {
        let mut canvas = Canvas::new(4, 4, 1);
        canvas.set(1, 2, Rgb::new(10, 20, 30), 0xff);
        assert_eq!(canvas.get(1, 2), Some(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn zero_alpha_is_a_noop() {
        let mut canvas = Canvas::new(4, 4, 1);
        canvas.set(1, 1, Rgb::new(50, 50, 50), 0xff);
        canvas.set(1, 1, Rgb::new(200, 200, 200), 0);
        assert_eq!(canvas.get(1, 1), Some(Rgb::new(50, 50, 50)));
    }

    #[test]
    fn partial_alpha_blends() {
        let mut canvas = Canvas::new(4, 4, 1);
        canvas.set(0, 0, Rgb::new(255, 255, 255), 128);
        // (0 * 127 + 255 * 128) / 255 = 128 exactly
        assert_eq!(canvas.get(0, 0), Some(Rgb::new(128, 128, 128)));
    }

    #[test]
    fn blend_truncates_instead_of_rounding() {
        // (0 * 127 + 251 * 128) / 255 = 125.99..., so 125 rather than 126
        assert_eq!(blend(0, 251, 128), 125);
        assert_eq!(blend(255, 255, 1), 255);
        assert_eq!(blend(0, 0, 200), 0);
    }

    #[test]
    fn out_of_bounds_reads_and_writes() {
        let mut canvas = Canvas::new(4, 4, 1);
        assert_eq!(canvas.get(4, 0), None);
        assert_eq!(canvas.get(0, 4), None);
        canvas.set(100, 100, Rgb::new(1, 2, 3), 0xff);
        canvas.set(4, 0, Rgb::new(1, 2, 3), 128);
        assert_eq!(canvas.get(3, 3), Some(Rgb::BLACK));
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut canvas = Canvas::new(3, 2, 1);
        canvas.clear(Rgb::new(9, 8, 7));
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(canvas.get(x, y), Some(Rgb::new(9, 8, 7)));
            }
        }
    }

    #[test]
    fn resize_keeps_the_overlap() {
        let mut canvas = Canvas::new(4, 4, 1);
        canvas.set(1, 1, Rgb::new(11, 11, 11), 0xff);
        canvas.set(3, 3, Rgb::new(33, 33, 33), 0xff);

        canvas.resize(6, 2);
        assert_eq!(canvas.size(), (6, 2));
        assert_eq!(canvas.get(1, 1), Some(Rgb::new(11, 11, 11)));
        assert_eq!(canvas.get(3, 3), None);
        assert_eq!(canvas.get(5, 1), Some(Rgb::BLACK));

        canvas.resize(2, 2);
        assert_eq!(canvas.get(1, 1), Some(Rgb::new(11, 11, 11)));
    }

    #[test]
    fn frame_counter_advances() {
        let mut canvas = Canvas::new(1, 1, 1);
        assert_eq!(canvas.frame(), 0);
        assert_eq!(canvas.advance_frame(), 1);
        assert_eq!(canvas.advance_frame(), 2);
    }
}
