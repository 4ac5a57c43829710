use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::backbuffer::ColorBuffer;

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;
const PIXELS_PER_METER: i32 = 2835;

/// Writes `buffer` as an uncompressed 32-bit bottom-up BMP.
pub fn write_bmp<W: Write>(writer: &mut W, buffer: &ColorBuffer) -> io::Result<()> {
    let width = buffer.get_width();
    let height = buffer.get_height();
    let image_size = u32::try_from(width * height * 4).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "image too large for BMP"))?;
    let offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE;

    writer.write_all(b"BM")?;
    writer.write_u32::<LittleEndian>(offset + image_size)?;
    writer.write_u16::<LittleEndian>(0)?;
    writer.write_u16::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(offset)?;

    writer.write_u32::<LittleEndian>(INFO_HEADER_SIZE)?;
    writer.write_i32::<LittleEndian>(width as i32)?;
    writer.write_i32::<LittleEndian>(height as i32)?;
    writer.write_u16::<LittleEndian>(1)?;
    writer.write_u16::<LittleEndian>(32)?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(image_size)?;
    writer.write_i32::<LittleEndian>(PIXELS_PER_METER)?;
    writer.write_i32::<LittleEndian>(PIXELS_PER_METER)?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(0)?;

    for y in (0..height).rev() {
        for pixel in buffer.row(y) {
            writer.write_u32::<LittleEndian>(pixel.to_u32())?;
        }
    }

    Ok(())
}

pub fn save_bmp<P: AsRef<Path>>(path: P, buffer: &ColorBuffer) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_bmp(&mut writer, buffer)?;
    writer.flush()?;
    log::info!("saved screenshot {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    #[test]
    fn header_and_rows_are_bottom_up_bgra() {
        let mut buffer = ColorBuffer::new(2, 2, Color::BLACK);
        buffer.set_pixel(0, 0, Color::from_u8(1, 2, 3, 4));
        buffer.set_pixel(1, 1, Color::from_u8(9, 8, 7, 6));

        let mut bytes = Vec::new();
        write_bmp(&mut bytes, &buffer).unwrap();
        assert_eq!(bytes.len(), 54 + 16);
        assert_eq!(&bytes[0..2], b"BM");

        let mut cursor = Cursor::new(&bytes[2..]);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 70);
        cursor.set_position(8);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 54);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 40);
        assert_eq!(cursor.read_i32::<LittleEndian>().unwrap(), 2);
        assert_eq!(cursor.read_i32::<LittleEndian>().unwrap(), 2);

        // first stored row is the bottom one, pixel (1, 1) last in it
        assert_eq!(&bytes[54 + 4..54 + 8], &[7, 8, 9, 6]);
        // top-left pixel opens the second stored row
        assert_eq!(&bytes[54 + 8..54 + 12], &[3, 2, 1, 4]);
    }
}
