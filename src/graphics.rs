//! The 64x32 monochrome display buffer. Written only by the sprite blit and
//! the clear-screen instruction; rasterizers read it between ticks.
use std::ops::Index;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Color handed to rasterizers for a lit pixel, in 0RGB.
pub const PIXEL_ON: u32 = 0xFFFFFF;
pub const PIXEL_OFF: u32 = 0;

pub struct Graphics {
    buffer: [bool; WIDTH * HEIGHT], // row-major
}

impl Graphics {
    pub fn new() -> Self {
        Graphics {
            buffer: [false; WIDTH * HEIGHT],
        }
    }

    pub fn len(&self) -> usize {
        WIDTH * HEIGHT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Given x and y coordinate for a pixel in the buffer, return the
    /// corresponding index of that pixel. Coordinates wrap around the edges.
    pub fn get_graphics_idx(x: usize, y: usize) -> usize {
        (y % HEIGHT) * WIDTH + (x % WIDTH)
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.buffer[Self::get_graphics_idx(x, y)]
    }

    /// XOR `on` into the pixel at (x, y). Returns true if the pixel was lit
    /// and is now dark.
    pub fn xor_set(&mut self, x: usize, y: usize, on: bool) -> bool {
        let idx = Self::get_graphics_idx(x, y);
        let was_on = self.buffer[idx];
        self.buffer[idx] = was_on ^ on;
        was_on && on
    }

    /// XOR an 8-pixel-wide sprite onto the buffer with its top-left corner at
    /// (origin_x, origin_y). Each pixel wraps independently, so a sprite
    /// drawn near an edge continues on the opposite side. Returns true if
    /// any lit pixel was turned off.
    pub fn draw_sprite(&mut self, origin_x: u8, origin_y: u8, rows: &[u8]) -> bool {
        let mut collision = false;

        for (row, byte) in rows.iter().enumerate() {
            for bit in 0..8 {
                if (byte >> (7 - bit)) & 1 == 1 {
                    let x = origin_x as usize + bit;
                    let y = origin_y as usize + row;
                    collision |= self.xor_set(x, y, true);
                }
            }
        }

        collision
    }

    pub fn clear(&mut self) {
        self.buffer = [false; WIDTH * HEIGHT];
    }

    /// The buffer as one 0RGB value per pixel, the layout framebuffer
    /// windows like minifb expect.
    pub fn to_rgb(&self) -> Vec<u32> {
        self.buffer
            .iter()
            .map(|on| if *on { PIXEL_ON } else { PIXEL_OFF })
            .collect()
    }

    /// Render as text, one line per row, `#` for lit pixels.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((WIDTH + 1) * HEIGHT);
        for row in self.buffer.chunks(WIDTH) {
            out.extend(row.iter().map(|on| if *on { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }
}

impl Default for Graphics {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Graphics {
    type Output = bool;

    #[inline]
    fn index(&self, bit: usize) -> &Self::Output {
        &self.buffer[bit]
    }
}
