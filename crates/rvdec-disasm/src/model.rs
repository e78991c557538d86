use anyhow::Result;
use std::path::Path;

/// Contiguous bytes loaded at `base` in the target address space.
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub base: u32,
    pub bytes: Vec<u8>,
}

impl Segment {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && ((addr - self.base) as usize) < self.bytes.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Image {
    pub segments: Vec<Segment>,
}

impl Image {
    pub fn from_bytes(base: u32, bytes: Vec<u8>) -> Self {
        Self { segments: vec![Segment { name: "segment0".into(), base, bytes }] }
    }
}

pub fn load_raw_bin(path: &Path, base: u32, skip: usize, len: Option<usize>) -> Result<Image> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    Ok(Image::from_bytes(base, payload.to_vec()))
}

pub fn read_u8(img: &Image, addr: u32) -> Option<u8> {
    img.segments
        .iter()
        .find(|s| s.contains(addr))
        .map(|s| s.bytes[(addr - s.base) as usize])
}

pub fn read_u16(img: &Image, addr: u32) -> Option<u16> {
    let b0 = read_u8(img, addr)?;
    let b1 = read_u8(img, addr.wrapping_add(1))?;
    Some(u16::from_le_bytes([b0, b1]))
}

pub fn read_u32(img: &Image, addr: u32) -> Option<u32> {
    let lo = read_u16(img, addr)?;
    let hi = read_u16(img, addr.wrapping_add(2))?;
    Some(u32::from(lo) | (u32::from(hi) << 16))
}

/// Word to decode at `addr`: 32 bits, or the last 16 bits of the image zero-extended.
pub fn fetch(img: &Image, addr: u32) -> Option<u32> {
    read_u32(img, addr).or_else(|| read_u16(img, addr).map(u32::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loader_maps_skip_and_len() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8, 1, 2, 3, 4, 5]).unwrap();
        let img = load_raw_bin(file.path(), 0x1000_0000, 2, Some(3)).unwrap();
        assert_eq!(img.segments.len(), 1);
        let s = &img.segments[0];
        assert_eq!(s.base, 0x1000_0000);
        assert_eq!(s.bytes, vec![2, 3, 4]);
        assert!(read_u32(&img, 0x1000_0000).is_none());
        assert_eq!(fetch(&img, 0x1000_0000), Some(0x0302));
        assert_eq!(read_u8(&img, 0x1000_0002), Some(4));
        assert!(read_u8(&img, 0x1000_0003).is_none());
    }

    #[test]
    fn skip_past_end_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 4]).unwrap();
        assert!(load_raw_bin(file.path(), 0, 5, None).is_err());
        assert!(load_raw_bin(file.path(), 0, 2, Some(3)).is_err());
    }
}
