use bytes::Bytes;
use bytes::BytesMut;

use crate::hpack::huffman;
use crate::hpack::static_table;
use crate::hpack::DynamicTable;
use crate::wire::DEFAULT_SETTINGS;

/// HPACK encoder with its dynamic table.
///
/// Encoding cannot fail: any field not present in the tables is emitted
/// as a literal with incremental indexing.
#[derive(Debug)]
pub struct Encoder {
    table: DynamicTable,
    use_huffman: bool,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {
            table: DynamicTable::new(DEFAULT_SETTINGS.header_table_size as usize),
            use_huffman: true,
        }
    }

    pub fn set_use_huffman(&mut self, use_huffman: bool) {
        self.use_huffman = use_huffman;
    }

    /// Encode a field list into a header block, preserving order.
    pub fn encode<'a, I>(&mut self, fields: I) -> Bytes
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut block = BytesMut::new();
        for (name, value) in fields {
            self.encode_field(name, value, &mut block);
        }
        block.freeze()
    }

    fn encode_field(&mut self, name: &str, value: &str, block: &mut BytesMut) {
        if let Some(index) = static_table::find(name, value).or_else(|| self.table.find(name, value))
        {
            encode_integer(block, index, 7, 0x80);
            return;
        }

        // literal with incremental indexing
        let name_index = static_table::find_name(name).or_else(|| self.table.find_name(name));
        match name_index {
            Some(index) => encode_integer(block, index, 6, 0x40),
            None => {
                block.extend_from_slice(&[0x40]);
                self.encode_string(name, block);
            }
        }
        self.encode_string(value, block);

        self.table.insert(name.to_owned(), value.to_owned());
    }

    fn encode_string(&self, s: &str, block: &mut BytesMut) {
        if self.use_huffman {
            let coded = huffman::encode(s.as_bytes());
            encode_integer(block, coded.len(), 7, 0x80);
            block.extend_from_slice(&coded);
        } else {
            encode_integer(block, s.len(), 7, 0x00);
            block.extend_from_slice(s.as_bytes());
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

/// Encode an HPACK integer with the given prefix size, section 5.1.
fn encode_integer(block: &mut BytesMut, value: usize, prefix_bits: u8, prefix: u8) {
    let max_first = (1usize << prefix_bits) - 1;

    if value < max_first {
        block.extend_from_slice(&[prefix | value as u8]);
        return;
    }

    block.extend_from_slice(&[prefix | max_first as u8]);
    let mut remaining = value - max_first;
    while remaining >= 128 {
        block.extend_from_slice(&[(remaining & 0x7f) as u8 | 0x80]);
        remaining >>= 7;
    }
    block.extend_from_slice(&[remaining as u8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::Decoder;

    fn round_trip(fields: &[(&str, &str)], use_huffman: bool) {
        let mut encoder = Encoder::new();
        encoder.set_use_huffman(use_huffman);
        let mut decoder = Decoder::new();

        let block = encoder.encode(fields.iter().copied());
        let decoded = decoder.decode(&block).unwrap();

        let expected: Vec<(String, String)> = fields
            .iter()
            .map(|&(n, v)| (n.to_owned(), v.to_owned()))
            .collect();
        assert_eq!(expected, decoded);
    }

    #[test]
    fn rfc7541_c_1_integers() {
        let mut block = BytesMut::new();
        encode_integer(&mut block, 10, 5, 0x00);
        assert_eq!(&[0x0a][..], &block[..]);

        block.clear();
        encode_integer(&mut block, 1337, 5, 0x00);
        assert_eq!(&[0x1f, 0x9a, 0x0a][..], &block[..]);

        block.clear();
        encode_integer(&mut block, 42, 8, 0x00);
        assert_eq!(&[0x2a][..], &block[..]);
    }

    #[test]
    fn static_exact_match_is_one_byte() {
        let mut encoder = Encoder::new();
        let block = encoder.encode(vec![(":method", "GET")]);
        assert_eq!(&[0x82][..], &block[..]);
    }

    #[test]
    fn request_round_trip() {
        round_trip(
            &[
                (":method", "GET"),
                (":scheme", "https"),
                (":authority", "www.example.com"),
                (":path", "/where?q=1"),
                ("accept", "text/html"),
            ],
            false,
        );
    }

    #[test]
    fn request_round_trip_huffman() {
        round_trip(
            &[
                (":method", "POST"),
                (":path", "/submit"),
                ("content-type", "application/json"),
                ("x-custom", "\u{00e9}\u{00e8}"),
            ],
            true,
        );
    }

    #[test]
    fn dynamic_table_reused_across_blocks() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();

        let first = encoder.encode(vec![("x-trace", "abc123")]);
        let second = encoder.encode(vec![("x-trace", "abc123")]);
        // second block is a single indexed reference
        assert_eq!(1, second.len());

        assert_eq!(
            vec![("x-trace".to_owned(), "abc123".to_owned())],
            decoder.decode(&first).unwrap()
        );
        assert_eq!(
            vec![("x-trace".to_owned(), "abc123".to_owned())],
            decoder.decode(&second).unwrap()
        );
    }

    #[test]
    fn repeated_set_cookie_fields_stay_separate() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();

        let block = encoder.encode(vec![("set-cookie", "a=1"), ("set-cookie", "b=2")]);
        let decoded = decoder.decode(&block).unwrap();

        assert_eq!(2, decoded.len());
        assert_eq!(("set-cookie".to_owned(), "a=1".to_owned()), decoded[0]);
        assert_eq!(("set-cookie".to_owned(), "b=2".to_owned()), decoded[1]);
    }
}
