use crate::copy::Method;
use crate::zero::{ zero_digest, ZERO_LEN };


/// Parameters of one verified transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Length of the zero file, and the byte count both ends must agree on.
    pub size: u64,
    /// `Sendfile` lets the producer use the kernel path when the socket
    /// supports it; `Buffered` forces the read/write loop.
    pub method: Method,
    /// Hex SHA-256 the receiver must see. `None` means the digest of
    /// `size` zero bytes.
    pub expected_digest: Option<String>,
    /// Shrink the file to this length after creating it, so the producer
    /// runs short.
    pub truncate_to: Option<u64>
}

impl Default for Config {
    fn default() -> Config {
        Config {
            size: ZERO_LEN,
            method: Method::Sendfile,
            expected_digest: None,
            truncate_to: None
        }
    }
}

impl Config {
    pub fn with_size(size: u64) -> Config {
        Config { size, ..Config::default() }
    }

    pub fn method(mut self, method: Method) -> Config {
        self.method = method;
        self
    }

    pub fn expected_digest(mut self, digest: impl Into<String>) -> Config {
        self.expected_digest = Some(digest.into());
        self
    }

    pub fn truncate_to(mut self, len: u64) -> Config {
        self.truncate_to = Some(len);
        self
    }

    pub(crate) fn digest_oracle(&self) -> String {
        match self.expected_digest {
            Some(ref digest) => digest.to_ascii_lowercase(),
            None => zero_digest(self.size)
        }
    }
}
