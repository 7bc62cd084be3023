use thiserror::Error;

/// Reasons why a segmentation or pose estimation cycle produced no usable object.
///
/// None of these are fatal: the public pipeline entry points log them and return empty results. They are
/// exposed for callers that want to know why a cycle came back empty (see
/// [try_segment_cloud](crate::pipeline::SceneSegmentation::try_segment_cloud))
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("point cloud is empty after stage '{stage}'")]
    EmptyCloud { stage: &'static str },

    #[error("no plane found after {iterations} iterations")]
    NoPlaneFound { iterations: usize },

    #[error("no cluster passed the size and geometry constraints")]
    NoClusters,

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("got {normals} normals for {points} points")]
    NormalCountMismatch { points: usize, normals: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transform from '{source_frame}' to '{target_frame}' not available")]
    TransformUnavailable {
        source_frame: String,
        target_frame: String,
    },
}

pub type SegmentationResult<T> = Result<T, SegmentationError>;
