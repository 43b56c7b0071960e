//! Terminal cells from rendered pixel buffers
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use orthoview_core::{ImageSize, RgbaImage};
use std::io::Write;

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '%', '@'];
/// Character for cells crossed by an outline edge
const OUTLINE_CHAR: char = '#';
const OUTLINE_COLOR: Color = Color::Yellow;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    ch: char,
    color: Color,
}

impl Cell {
    const EMPTY: Self = Self {
        ch: ' ',
        color: Color::Reset,
    };
}

/// Converts images of `cols x 2·rows` pixels into `cols x rows` colored characters.
///
/// Each character cell covers two vertically stacked pixels, which keeps the
/// pixels roughly square in a typical terminal font.
pub struct AsciiRenderer {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl AsciiRenderer {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::EMPTY; cols * rows],
        }
    }

    /// Pixel size the images passed to [`compose`](Self::compose) must have.
    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.cols as u32, (self.rows * 2) as u32)
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::EMPTY);
    }

    /// Fill every cell from the shaded pixels, letting outline pixels win.
    pub fn compose(&mut self, pixels: &RgbaImage, outline: Option<&RgbaImage>) {
        self.clear();
        let width = (self.cols as u32).min(pixels.width());
        let height = (self.rows as u32).min(pixels.height() / 2);
        for row in 0..height {
            for col in 0..width {
                let (top, bottom) = (row * 2, row * 2 + 1);
                let on_outline = outline.is_some_and(|overlay| {
                    overlay.pixel(col, top)[3] != 0 || overlay.pixel(col, bottom)[3] != 0
                });
                let cell = if on_outline {
                    Cell {
                        ch: OUTLINE_CHAR,
                        color: OUTLINE_COLOR,
                    }
                } else {
                    shade_cell(pixels.pixel(col, top), pixels.pixel(col, bottom))
                };
                self.cells[row as usize * self.cols + col as usize] = cell;
            }
        }
    }

    /// Characters of one row, without colors.
    pub fn line(&self, row: usize) -> String {
        self.cells[row * self.cols..(row + 1) * self.cols]
            .iter()
            .map(|cell| cell.ch)
            .collect()
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for row in self.cells.chunks(self.cols.max(1)) {
            for cell in row {
                writer.queue(SetForegroundColor(cell.color))?;
                writer.queue(Print(cell.ch))?;
            }
            writer.queue(Print("\r\n"))?;
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Average the covered pixels of a cell and pick a ramp character for them.
fn shade_cell(top: [u8; 4], bottom: [u8; 4]) -> Cell {
    let covered: Vec<[u8; 4]> = [top, bottom].into_iter().filter(|px| px[3] != 0).collect();
    if covered.is_empty() {
        return Cell::EMPTY;
    }
    let n = covered.len() as u32;
    let avg = |channel: usize| (covered.iter().map(|px| px[channel] as u32).sum::<u32>() / n) as u8;
    let (r, g, b) = (avg(0), avg(1), avg(2));

    let luminance = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0;
    // Covered cells never use the blank first ramp entry
    let steps = (LUMINOSITY_RAMP.len() - 1) as f64;
    let index = 1 + (luminance * (steps - 1.0)).round() as usize;
    Cell {
        ch: LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)],
        color: Color::Rgb { r, g, b },
    }
}
