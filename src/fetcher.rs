use crate::cache::BlobSink;
use crate::config::DEFAULT_ROTATIONS;
use crate::error::FetchError;
use crate::remote::RemoteSource;
use tracing::{info, warn};

/// The current log followed by its numbered rotations, gap-free.
///
/// Index 0 is the base file, index `i` is `<base>.i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationSet {
    blobs: Vec<String>,
}

impl RotationSet {
    /// Build a set from already-contiguous blobs, e.g. read back from cache.
    pub fn from_blobs<I, B>(blobs: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self {
            blobs: blobs.into_iter().map(|b| decode(b.as_ref())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.blobs.iter().map(String::as_str)
    }

    fn push(&mut self, data: &[u8]) {
        self.blobs.push(decode(data));
    }
}

// Logs are not guaranteed to be valid UTF-8; bad bytes must not sink a file.
fn decode(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Walks `path`, `path.1`, `path.2`, ... on a remote source.
pub struct RotationFetcher<S> {
    source: S,
    max_rotations: usize,
}

impl<S: RemoteSource> RotationFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            max_rotations: DEFAULT_ROTATIONS,
        }
    }

    /// Bound the length of the returned set, base file included. A bound of
    /// zero makes [`fetch`](Self::fetch) fail with [`FetchError::ZeroBound`].
    pub fn with_max_rotations(mut self, max_rotations: usize) -> Self {
        self.max_rotations = max_rotations;
        self
    }

    /// Fetch the base log and as many contiguous rotations as exist.
    ///
    /// Every blob fetched is handed to `sink` before the next index is tried,
    /// and cached rotations beyond the end of the walk are removed. Any
    /// failure on the base log is fatal and leaves `sink` untouched. For a
    /// rotation, an empty payload, an absent file or a failed read ends the
    /// walk with what has been gathered.
    pub fn fetch<K: BlobSink>(
        &mut self,
        base_path: &str,
        sink: &mut K,
    ) -> Result<RotationSet, FetchError> {
        if self.max_rotations == 0 {
            return Err(FetchError::ZeroBound);
        }
        let mut set = RotationSet::default();

        let base = self
            .source
            .read(base_path)
            .map_err(|source| FetchError::RemoteUnavailable {
                path: base_path.to_string(),
                source,
            })?;
        info!(path = base_path, bytes = base.len(), "fetched current log");
        sink.store(0, &base)
            .map_err(|source| FetchError::Cache { index: 0, source })?;
        set.push(&base);

        for index in 1..self.max_rotations {
            let path = format!("{base_path}.{index}");
            let data = match self.source.read(&path) {
                Ok(data) => data,
                Err(source) if source.is_absent() => {
                    info!(index, "no further rotations");
                    break;
                }
                Err(source) => {
                    let err = FetchError::RotationFetchFailed { index, source };
                    warn!(error = %err, "stopping rotation walk");
                    break;
                }
            };
            if data.is_empty() {
                info!(index, "no further rotations");
                break;
            }
            info!(path = %path, bytes = data.len(), "fetched rotation");
            sink.store(index, &data)
                .map_err(|source| FetchError::Cache { index, source })?;
            set.push(&data);
        }

        sink.truncate(set.len()).map_err(|source| FetchError::Cache {
            index: set.len(),
            source,
        })?;

        Ok(set)
    }
}
