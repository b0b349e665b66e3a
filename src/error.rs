//! Error type shared by the table and its adapters.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableError {
    /// A bucket index outside `0..bucket_count`.
    InvalidBucket { bucket: usize, bucket_count: usize },
    /// A past-the-end or stale cursor was handed to an erasing operation.
    InvalidPosition,
    /// Max load factor must be finite and strictly positive.
    InvalidLoadFactor(f32),
    /// The bucket index of the requested size could not be allocated.
    AllocationFailure { buckets: usize },
    /// Keyed access (`at`) on a key that is not stored.
    KeyNotFound,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::InvalidBucket {
                bucket,
                bucket_count,
            } => write!(
                f,
                "bucket {bucket} out of range for a table with {bucket_count} buckets"
            ),
            TableError::InvalidPosition => f.write_str("cursor does not refer to a live element"),
            TableError::InvalidLoadFactor(ml) => write!(f, "invalid max load factor {ml}"),
            TableError::AllocationFailure { buckets } => {
                write!(f, "failed to allocate a bucket index of {buckets} buckets")
            }
            TableError::KeyNotFound => f.write_str("key not present in table"),
        }
    }
}

impl std::error::Error for TableError {}
