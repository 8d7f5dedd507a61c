/// Pluggable stream decryption applied under any text source
///
/// A [`Cipher`] is resolved once when the connection is built; every opened
/// file then gets its own [`CryptoFilter`] instance, so key schedules never
/// leak between streams.
mod xor;

pub use xor::XorCipher;

use std::collections::HashMap;
use std::io::Read;

use tracing::debug;

use crate::types::QueryError;

/// Byte-at-a-time keystream transform
pub trait CryptoFilter {
    fn decrypt(&mut self, byte: u8) -> u8;

    /// Rewind the key schedule to its initial position
    fn reset(&mut self);

    fn decrypt_in_place(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte = self.decrypt(*byte);
        }
    }
}

pub type CipherFactory = fn(&[String]) -> Result<Box<dyn CryptoFilter>, QueryError>;

/// A resolved cipher name plus parameters, able to create fresh filters
#[derive(Clone)]
pub struct Cipher {
    name: String,
    parameters: Vec<String>,
    factory: CipherFactory,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

impl Cipher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_filter(&self) -> Result<Box<dyn CryptoFilter>, QueryError> {
        (self.factory)(&self.parameters)
    }
}

pub struct CipherRegistry {
    factories: HashMap<String, CipherFactory>,
}

impl Default for CipherRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("XORCipher", XorCipher::from_parameters);
        registry
    }
}

impl CipherRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, factory: CipherFactory) {
        self.factories.insert(name.to_lowercase(), factory);
    }

    /// Look up `name` and check that it accepts `parameters`
    pub fn resolve(&self, name: &str, parameters: &[String]) -> Result<Cipher, QueryError> {
        let factory = *self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| QueryError::UnknownCipher(name.to_string()))?;
        factory(parameters)
            .map_err(|e| QueryError::UnknownCipher(format!("{name} ({e})")))?;
        debug!(cipher = name, "resolved cipher");
        Ok(Cipher {
            name: name.to_string(),
            parameters: parameters.to_vec(),
            factory,
        })
    }
}

/// Reader that decrypts everything read through it
pub struct DecryptingReader<R> {
    inner: R,
    filter: Box<dyn CryptoFilter>,
}

impl<R: Read> DecryptingReader<R> {
    pub fn new(inner: R, filter: Box<dyn CryptoFilter>) -> Self {
        Self { inner, filter }
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.filter.decrypt_in_place(&mut buf[..n]);
        Ok(n)
    }
}
