pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// What the VM needs from a screen. The host owns rendering; the VM only
/// flips and reads cells.
pub trait Display {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn clear(&mut self);
    fn get_pixel(&self, x: usize, y: usize) -> bool;
    fn toggle_pixel(&mut self, x: usize, y: usize);
}

/// XOR `sprite` onto the display with its top-left corner at (x, y).
///
/// Each byte is one row of 8 pixels, most significant bit leftmost. The
/// origin and every pixel wrap around the edges independently. Returns true
/// if any lit pixel was switched off.
pub fn draw_sprite<D: Display + ?Sized>(display: &mut D, x: u8, y: u8, sprite: &[u8]) -> bool {
    let (width, height) = (display.width(), display.height());
    let (x, y) = (x as usize % width, y as usize % height);

    let mut collision = false;
    for (i, row) in sprite.iter().enumerate() {
        let ny = (y + i) % height;
        for j in 0..8 {
            if (row >> (7 - j)) & 1 == 0 {
                continue;
            }
            let nx = (x + j) % width;
            if display.get_pixel(nx, ny) {
                collision = true;
            }
            display.toggle_pixel(nx, ny);
        }
    }
    collision
}

/// 64x32 monochrome cells, row major
#[derive(Clone)]
pub struct FrameBuffer {
    bit_buffer: [bool; WIDTH * HEIGHT],
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            bit_buffer: [false; WIDTH * HEIGHT],
        }
    }

    pub fn cells(&self) -> &[bool] {
        &self.bit_buffer
    }

    /// Expand into 0RGB pixels for a window buffer
    pub fn render_into(&self, pixel_buffer: &mut [u32], on: u32, off: u32) {
        for (pixel, &bit) in pixel_buffer.iter_mut().zip(self.bit_buffer.iter()) {
            *pixel = if bit { on } else { off };
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FrameBuffer {
    fn width(&self) -> usize {
        WIDTH
    }

    fn height(&self) -> usize {
        HEIGHT
    }

    fn clear(&mut self) {
        self.bit_buffer = [false; WIDTH * HEIGHT];
    }

    fn get_pixel(&self, x: usize, y: usize) -> bool {
        self.bit_buffer[(y % HEIGHT) * WIDTH + (x % WIDTH)]
    }

    fn toggle_pixel(&mut self, x: usize, y: usize) {
        self.bit_buffer[(y % HEIGHT) * WIDTH + (x % WIDTH)] ^= true;
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.bit_buffer.chunks(WIDTH) {
            let line: String = row.iter().map(|&b| if b { '#' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
