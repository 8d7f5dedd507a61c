use super::CryptoFilter;
use crate::types::QueryError;

/// Repeating-key XOR over the bytes of a seed string
#[derive(Debug, Clone)]
pub struct XorCipher {
    key: Vec<u8>,
    counter: usize,
}

impl XorCipher {
    pub fn new(seed: &str) -> Result<Self, QueryError> {
        if seed.is_empty() {
            return Err(QueryError::InvalidConfiguration(
                "XOR cipher seed must not be empty".to_string(),
            ));
        }
        Ok(Self {
            key: seed.as_bytes().to_vec(),
            counter: 0,
        })
    }

    /// Factory for the cipher registry: exactly one parameter, the seed
    pub fn from_parameters(parameters: &[String]) -> Result<Box<dyn CryptoFilter>, QueryError> {
        match parameters {
            [seed] => Ok(Box::new(Self::new(seed)?)),
            _ => Err(QueryError::InvalidConfiguration(format!(
                "XOR cipher takes one seed parameter, got {}",
                parameters.len()
            ))),
        }
    }
}

impl CryptoFilter for XorCipher {
    fn decrypt(&mut self, byte: u8) -> u8 {
        let out = byte ^ self.key[self.counter];
        self.counter = (self.counter + 1) % self.key.len();
        out
    }

    fn reset(&mut self) {
        self.counter = 0;
    }
}
