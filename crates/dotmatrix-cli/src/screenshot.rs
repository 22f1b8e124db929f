use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use dotmatrix_core::FrameBuffer;
use dotmatrix_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

fn frame_to_rgb(frame: &FrameBuffer) -> Vec<u8> {
    frame.iter().flatten().flatten().copied().collect()
}

/// Write `frame` as an 8-bit RGB PNG.
pub fn save_png(path: &Path, frame: &FrameBuffer) -> Result<(), png::EncodingError> {
    let file = File::create(path)?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame_to_rgb(frame))?;
    writer.finish()
}
