//! Reference wrapper implementations.
//!
//! Only `identity` and `xor` are implemented; richer wrappers (zlib, gzip,
//! AES-CBC) are implementation bodies outside this workspace's scope. The
//! XOR wrapper is the migration pipe's keyed wrapper.

use wayfarer_core::CoreError;

use crate::traits::Wrapper;

/// No-op wrapper: passes bytes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityWrapper;

impl Wrapper for IdentityWrapper {
    fn wrap(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(data.to_vec())
    }

    fn unwrap(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(data.to_vec())
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Keyed XOR wrapper. Symmetric: the same key both wraps and unwraps.
/// Not confidentiality-grade — used here as the default reference cipher
/// for tests and the migration pipe.
#[derive(Debug, Clone)]
pub struct XorWrapper {
    key: Vec<u8>,
}

impl XorWrapper {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CoreError::Malformed("xor wrapper: empty key"));
        }
        Ok(XorWrapper { key })
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ self.key[i % self.key.len()])
            .collect()
    }
}

impl Wrapper for XorWrapper {
    fn wrap(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(self.apply(data))
    }

    fn unwrap(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(self.apply(data))
    }

    fn name(&self) -> &'static str {
        "xor"
    }
}

/// Construct a known wrapper by configuration name.
pub fn wrapper_by_name(name: &str, key: Option<&str>) -> Result<Box<dyn Wrapper>, CoreError> {
    match name {
        "identity" | "" => Ok(Box::new(IdentityWrapper)),
        "xor" => {
            let key = key.ok_or(CoreError::Malformed("xor wrapper requires a key"))?;
            Ok(Box::new(XorWrapper::new(key.as_bytes().to_vec())?))
        }
        other => Err(CoreError::Malformed(match other {
            "zlib" | "gzip" | "aes-cbc" | "cbk" => {
                "wrapper named but not implemented by this workspace"
            }
            _ => "unknown wrapper name",
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_roundtrip() {
        let w = IdentityWrapper;
        let data = b"hello world";
        assert_eq!(w.unwrap(&w.wrap(data).unwrap()).unwrap(), data);
    }

    #[test]
    fn xor_roundtrip() {
        let w = XorWrapper::new("key").unwrap();
        let data = b"some packet bytes of arbitrary length here";
        let wrapped = w.wrap(data).unwrap();
        assert_ne!(wrapped, data);
        assert_eq!(w.unwrap(&wrapped).unwrap(), data);
    }

    #[test]
    fn xor_rejects_empty_key() {
        assert!(XorWrapper::new(Vec::new()).is_err());
    }

    #[test]
    fn by_name_unknown_is_malformed() {
        assert!(wrapper_by_name("rot13", None).is_err());
    }
}
