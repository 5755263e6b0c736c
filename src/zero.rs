use std::io;
use sha2::{ Digest, Sha256 };
use tempfile::NamedTempFile;


/// Size of the reference payload: 1 GiB.
pub const ZERO_LEN: u64 = 1_073_741_824;

/// SHA-256 of [`ZERO_LEN`] zero bytes.
pub const ZERO_SHA256: &str = "49bc20df15e412a64472421e13fe86ff1c5165e18b2afccf160d4dc19fe68a14";

/// SHA-256 of the empty byte sequence.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

static BLOCK: [u8; 64 * 1024] = [0; 64 * 1024];

/// Creates a temporary file of `size` zero bytes.
///
/// The length is set with `ftruncate`, so on most filesystems the file is
/// sparse. It is removed when the handle drops.
pub fn zero_file(size: u64) -> io::Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    file.as_file().set_len(size)?;
    tracing::debug!(path = %file.path().display(), size, "created zero file");
    Ok(file)
}

/// Hex SHA-256 of `size` zero bytes.
pub fn zero_digest(size: u64) -> String {
    match size {
        0 => EMPTY_SHA256.to_owned(),
        ZERO_LEN => ZERO_SHA256.to_owned(),
        _ => {
            let mut hasher = Sha256::new();
            let mut left = size;

            while left > 0 {
                let n = left.min(BLOCK.len() as u64) as usize;
                hasher.update(&BLOCK[..n]);
                left -= n as u64;
            }

            hex::encode(hasher.finalize())
        }
    }
}
