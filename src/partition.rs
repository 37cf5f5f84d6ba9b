use std::fs;
use std::path::Path;

use crate::error::{PdpError, Result};

/// Ordered blocks of a file; row `i` is block index `i` of a challenge.
pub type Matrix = Vec<Vec<u8>>;

/// How a file is cut into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Exactly `n` equally sized blocks.
    ExactCount(usize),
    /// Blocks of `sep` bytes, the last one zero-padded.
    FixedSize(usize),
}

/// Split `data` into a block matrix according to `policy`.
pub fn partition(data: &[u8], policy: Policy) -> Result<Matrix> {
    if data.is_empty() {
        return Err(PdpError::InvalidSize("empty file".into()));
    }
    match policy {
        Policy::ExactCount(n) => split_by_count(data, n),
        Policy::FixedSize(sep) => split_by_size(data, sep),
    }
}

/// Read the file at `path` and partition it.
pub fn partition_file(path: impl AsRef<Path>, policy: Policy) -> Result<Matrix> {
    let data = fs::read(path)?;
    partition(&data, policy)
}

fn split_by_count(data: &[u8], n: usize) -> Result<Matrix> {
    if n == 0 {
        return Err(PdpError::InvalidSize("block count is zero".into()));
    }
    let block_size = data.len() / n;
    if block_size == 0 {
        return Err(PdpError::InvalidSize(format!(
            "file of {} bytes is smaller than {} blocks",
            data.len(),
            n
        )));
    }
    if data.len() % n != 0 {
        return Err(PdpError::InvalidSize(format!(
            "file of {} bytes can't divide by {}",
            data.len(),
            n
        )));
    }
    Ok(data.chunks(block_size).map(<[u8]>::to_vec).collect())
}

fn split_by_size(data: &[u8], sep: usize) -> Result<Matrix> {
    if sep == 0 {
        return Err(PdpError::InvalidSize("block size is zero".into()));
    }
    // whole file is a single unpadded block
    if sep >= data.len() {
        return Ok(vec![data.to_vec()]);
    }
    Ok(data
        .chunks(sep)
        .map(|chunk| {
            let mut block = chunk.to_vec();
            block.resize(sep, 0);
            block
        })
        .collect())
}
