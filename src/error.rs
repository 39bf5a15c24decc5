use thiserror::Error;

pub type Result<T> = std::result::Result<T, BvhError>;

#[derive(Error, Debug)]
pub enum BvhError {
    /// Every consecutive index triple is one triangle.
    #[error("Index count {len} is not a multiple of 3")]
    IndexCountNotMultipleOfThree { len: usize },

    #[error("Triangle {triangle} references vertex {index}, but only {vertex_count} vertices exist")]
    IndexOutOfBounds {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("Invalid BVH configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported scene version {found:?}, expected {expected:?}")]
    UnsupportedConfigVersion { found: String, expected: String },

    #[error("Scene description is missing {0}")]
    MissingField(String),

    #[error("Transform of object {0:?} is not invertible")]
    SingularTransform(String),

    #[error("Buffer offset {offset} is not a multiple of the record stride {stride}")]
    Misaligned { offset: usize, stride: usize },

    #[error("Output buffer holds {available} bytes, {needed} are required")]
    BufferTooSmall { needed: usize, available: usize },

    /// Offsets and counts are stored as 32-bit values in the GPU records.
    #[error("{count} {what} exceed the limit of {max}")]
    TooLarge {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// Failure while building one object of a scene.
    #[error("Object {name:?}: {source}")]
    InObject {
        name: String,
        #[source]
        source: Box<BvhError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Obj(#[from] tobj::LoadError),

    #[error(transparent)]
    Encode(#[from] bincode::Error),
}

/// Narrows a count or offset for a GPU record, failing instead of truncating.
pub(crate) fn checked_u32(count: usize, what: &'static str) -> Result<u32> {
    u32::try_from(count).map_err(|_| BvhError::TooLarge {
        what,
        count,
        max: u32::MAX as usize,
    })
}
