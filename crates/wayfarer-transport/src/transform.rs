//! Reference transform implementation.

use wayfarer_core::CoreError;

use crate::traits::Transform;

/// No-op transform: the default when a Profile names no reshaping layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneTransform;

impl Transform for NoneTransform {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(data.to_vec())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

pub fn transform_by_name(name: &str) -> Result<Box<dyn Transform>, CoreError> {
    match name {
        "none" | "" => Ok(Box::new(NoneTransform)),
        _ => Err(CoreError::Malformed(
            "transform named but not implemented by this workspace",
        )),
    }
}
