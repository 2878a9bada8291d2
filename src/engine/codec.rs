//! TRIDENT - Binary Codec Helpers
//! Big-endian primitives and record decoding shared by the commit log,
//! SSTable writer/reader, and both file access strategies.

use std::io::{self, Read};

use crate::types::{DataItem, KeyValuePair};

pub fn read_u8(r: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

pub fn read_bytes(r: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Decode one `recordLength keyLength key value` record.
///
/// `recordLength` counts only the key and value bytes; the full on-disk
/// footprint is `8 + recordLength`.
pub fn read_record(r: &mut impl Read) -> io::Result<KeyValuePair> {
    let record_length = read_u32(r)? as usize;
    let key_length = read_u32(r)? as usize;

    if key_length > record_length {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("key length {key_length} exceeds record length {record_length}"),
        ));
    }

    let key = read_bytes(r, key_length)?;
    let value = read_bytes(r, record_length - key_length)?;

    Ok(KeyValuePair::new(DataItem::from(key), DataItem::from(value)))
}
