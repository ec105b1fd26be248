use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else { None }
    }
    pub fn as_str_lossy(&self) -> String {
        self.0.iter().map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}
impl From<u32> for FourCC { fn from(v: u32) -> Self { FourCC(v.to_be_bytes()) } }
impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

/// Decoded box header.
///
/// `size` is `None` for boxes that run to the end of their enclosing region
/// (a zero size field on the wire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub typ: FourCC,
    pub size: Option<u64>,  // total size including header
    pub header_size: u64,   // 8, 16, 24 or 32
    pub uuid: Option<[u8; 16]>,
}

impl BoxHeader {
    /// Payload length, when the header fixes one.
    pub fn content_size(&self) -> Option<u64> {
        self.size.map(|s| s - self.header_size)
    }
}
