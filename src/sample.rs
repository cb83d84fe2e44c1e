/*!
    encoding of the recorded values in the sampling controller memory

    width and byte order are properties of each sampling controller family, they are never assumed: the AVR and Pico2+BU79100G controllers store 16 bit big-endian values, the ADS131M04 boards 32 bit little-endian ones.
*/

use packbytes::{FromBytes, ToBytes, ByteArray};


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// width of one signed value
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    I16,
    I32,
}
impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::I32 => 4,
        }
    }
}

/// how one channel value is laid out in a sample set
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleFormat {
    pub width: Width,
    pub order: ByteOrder,
}
impl SampleFormat {
    pub const I16_BE: Self = Self {width: Width::I16, order: ByteOrder::Big};
    pub const I32_LE: Self = Self {width: Width::I32, order: ByteOrder::Little};

    pub const fn value_size(&self) -> usize {self.width.bytes()}

    /// decode the value at the start of `bytes`, `None` if there is not enough bytes
    pub fn decode(&self, bytes: &[u8]) -> Option<i32> {
        match self.width {
            Width::I16 => decode::<i16>(bytes, self.order).map(i32::from),
            Width::I32 => decode::<i32>(bytes, self.order),
        }
    }
    /// decode the `values.len()` consecutive values at the start of `bytes`
    pub fn decode_set(&self, bytes: &[u8], values: &mut [i32]) -> Option<()> {
        let size = self.value_size();
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.decode(bytes.get(i*size ..)?)?;
        }
        Some(())
    }
    /// encode a value at the start of `dst`, `None` if it does not fit
    pub fn encode(&self, value: i32, dst: &mut [u8]) -> Option<()> {
        match self.width {
            Width::I16 => encode(i16::try_from(value).ok()?, self.order, dst),
            Width::I32 => encode(value, self.order, dst),
        }
    }
}

fn decode<T: FromBytes>(bytes: &[u8], order: ByteOrder) -> Option<T> {
    let mut raw = T::Bytes::zeroed();
    raw.as_mut().copy_from_slice(bytes.get(.. T::Bytes::SIZE)?);
    Some(match order {
        ByteOrder::Big => T::from_be_bytes(raw),
        ByteOrder::Little => T::from_le_bytes(raw),
    })
}
fn encode<T: ToBytes>(value: T, order: ByteOrder, dst: &mut [u8]) -> Option<()> {
    let raw = match order {
        ByteOrder::Big => value.to_be_bytes(),
        ByteOrder::Little => value.to_le_bytes(),
    };
    let raw = raw.as_ref();
    dst.get_mut(.. raw.len())?.copy_from_slice(raw);
    Some(())
}

/// parse hexadecimal text (as sent for memory pages) into `dst`, the text must fill it exactly with hex digits
pub fn parse_hex(text: &str, dst: &mut [u8]) -> Option<()> {
    let text = text.trim().as_bytes();
    if text.len() != 2 * dst.len() || ! text.iter().all(u8::is_ascii_hexdigit)
        {return None}
    for (byte, digits) in dst.iter_mut().zip(text.chunks_exact(2)) {
        *byte = nibble(digits[0])? << 4 | nibble(digits[1])?;
    }
    Some(())
}
fn nibble(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).map(|value| value as u8)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_i16() {
        let format = SampleFormat::I16_BE;
        assert_eq!(format.decode(&[0x01, 0x02]), Some(0x0102));
        assert_eq!(format.decode(&[0xff, 0xfe]), Some(-2));
        assert_eq!(format.decode(&[0x01]), None);

        let mut values = [0; 3];
        format.decode_set(&[0x00, 0x01, 0x80, 0x00, 0x7f, 0xff, 0xaa], &mut values).unwrap();
        assert_eq!(values, [1, -32768, 32767]);
    }

    #[test]
    fn little_endian_i32() {
        let format = SampleFormat::I32_LE;
        assert_eq!(format.decode(&[0x04, 0x03, 0x02, 0x01]), Some(0x01020304));
        assert_eq!(format.decode(&[0x00, 0x00, 0x80, 0xff]), Some(-8388608));

        let mut bytes = [0u8; 4];
        format.encode(-5, &mut bytes).unwrap();
        assert_eq!(bytes, [0xfb, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn encode_limits() {
        let mut bytes = [0u8; 2];
        assert_eq!(SampleFormat::I16_BE.encode(40000, &mut bytes), None);
        SampleFormat::I16_BE.encode(-300, &mut bytes).unwrap();
        assert_eq!(bytes, (-300i16).to_be_bytes());
        assert_eq!(SampleFormat::I32_LE.encode(1, &mut bytes), None);
    }

    #[test]
    fn hex_pages() {
        let mut page = [0u8; 4];
        parse_hex("00ff10Ab", &mut page).unwrap();
        assert_eq!(page, [0x00, 0xff, 0x10, 0xab]);
        assert_eq!(parse_hex("00ff10", &mut page), None);
        assert_eq!(parse_hex("00ff10zz", &mut page), None);
        // sign prefixes are not digits
        assert_eq!(parse_hex("+f00ff10", &mut page), None);
        assert_eq!(parse_hex("00-1ff10", &mut page), None);
        assert_eq!(parse_hex("00ff10é", &mut page), None);
    }
}
