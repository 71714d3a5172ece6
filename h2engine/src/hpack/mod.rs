//! HPACK header compression, RFC 7541.
//!
//! The connection engine owns one [`Decoder`] and one [`Encoder`]; each
//! carries its own dynamic table whose evolution is driven by the order of
//! header blocks on the wire.

pub(crate) mod huffman;
pub(crate) mod static_table;

mod decoder;
mod encoder;

pub use self::decoder::Decoder;
pub use self::decoder::DecoderError;
pub use self::encoder::Encoder;

/// Size of a table entry for accounting purposes, section 4.1.
fn entry_size(name: &str, value: &str) -> usize {
    name.len() + value.len() + 32
}

/// The dynamic table shared in shape between encoder and decoder.
/// Newest entries sit at the front; wire indices continue past the
/// static table.
#[derive(Debug)]
pub(crate) struct DynamicTable {
    entries: std::collections::VecDeque<(String, String)>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> DynamicTable {
        DynamicTable {
            entries: std::collections::VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict();
    }

    pub fn insert(&mut self, name: String, value: String) {
        let new_entry_size = entry_size(&name, &value);

        while self.size + new_entry_size > self.max_size {
            match self.entries.pop_back() {
                Some((n, v)) => self.size -= entry_size(&n, &v),
                None => break,
            }
        }

        // 4.4: an entry larger than the table empties it and is not added
        if new_entry_size <= self.max_size {
            self.entries.push_front((name, value));
            self.size += new_entry_size;
        }
    }

    /// Entry by index local to the dynamic table, starting at 1.
    pub fn get(&self, index: usize) -> Option<&(String, String)> {
        if index == 0 {
            return None;
        }
        self.entries.get(index - 1)
    }

    /// Wire index of an exact match.
    pub fn find(&self, name: &str, value: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, v)| n == name && v == value)
            .map(|i| static_table::STATIC_TABLE.len() + i + 1)
    }

    /// Wire index of the first entry with the given name.
    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| static_table::STATIC_TABLE.len() + i + 1)
    }

    fn evict(&mut self) {
        while self.size > self.max_size {
            match self.entries.pop_back() {
                Some((n, v)) => self.size -= entry_size(&n, &v),
                None => break,
            }
        }
    }
}
