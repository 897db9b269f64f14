use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid studio model: {message}")]
    Format { message: String },

    #[error("read of {len} bytes at offset {offset} exceeds buffer of {buffer_len} bytes")]
    BufferRange {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("unsupported studio model feature: {feature}")]
    Unsupported { feature: UnsupportedFeature },
}

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(feature: UnsupportedFeature) -> Self {
        Self::Unsupported { feature }
    }
}

/// Parts of the format that are recognised but deliberately not decoded.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum UnsupportedFeature {
    #[error("sequence group {group} lives in an external file")]
    ExternalSequenceGroup { group: u32 },

    #[error("textures live in an external file")]
    ExternalTextures,

    #[error("secondary animation blend {blend}")]
    SecondaryBlend { blend: u32 },
}
