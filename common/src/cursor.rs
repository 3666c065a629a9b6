use byteorder::{BigEndian, ByteOrder};

/// All multi-byte quantities in a class image are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    UnexpectedEof { wanted: usize, remaining: usize },
}

impl std::fmt::Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorError::UnexpectedEof { wanted, remaining } => {
                write!(f, "unexpected end of input: wanted {wanted} bytes, {remaining} remaining")
            }
        }
    }
}

pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CursorError> {
        if self.remaining() < len {
            return Err(CursorError::UnexpectedEof {
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        Ok(self.read_u32()? as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let mut cursor = Cursor::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x2E]);
        assert_eq!(cursor.read_u32().unwrap(), 0xCAFE_BABE);
        assert_eq!(cursor.read_u16().unwrap(), 0x2E);
        assert!(cursor.is_empty());
    }

    #[test]
    fn reports_truncation() {
        let mut cursor = Cursor::new(&[0x01]);
        assert_eq!(
            cursor.read_u32(),
            Err(CursorError::UnexpectedEof { wanted: 4, remaining: 1 })
        );
    }
}
