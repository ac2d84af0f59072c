use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use parking_lot::Mutex;
use synthetic_stream::{SyntheticStream, Whence};

/// A seekable byte source the responder can serve.
///
/// Methods take `&self` so a source can be cloned into a streaming response body.
/// Implementations that share a cursor between clones see each other's seeks.
pub trait ContentSource: Clone + Send + Sync + 'static {
    fn seek(&self, pos: SeekFrom) -> io::Result<u64>;

    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A [`SyntheticStream`] shared between requests.
///
/// Only individual `seek` and `read` calls are serialized. Two requests served at
/// the same time interleave their calls against the one cursor and can read each
/// other's positions; use one client at a time.
#[derive(Debug, Clone)]
pub struct SharedStream(Arc<Mutex<SyntheticStream>>);

impl SharedStream {
    pub fn new(stream: SyntheticStream) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }

    /// Current cursor of the shared stream.
    pub fn position(&self) -> u64 {
        self.0.lock().position()
    }

    pub fn total_size(&self) -> u64 {
        self.0.lock().total_size()
    }

    /// A new, unshared stream with the same layout, positioned at 0.
    pub fn fresh(&self) -> Self {
        let mut copy = self.0.lock().clone();
        copy.seek(0, Whence::Start);
        Self::new(copy)
    }

    /// Runs `f` with exclusive access to the underlying stream.
    pub fn with_stream<R>(&self, f: impl FnOnce(&mut SyntheticStream) -> R) -> R {
        f(&mut self.0.lock())
    }
}

impl ContentSource for SharedStream {
    fn seek(&self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(&mut *self.0.lock(), pos)
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut *self.0.lock(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_cursor() {
        let shared = SharedStream::new(SyntheticStream::new(16, 8, 64).unwrap());
        let other = shared.clone();

        ContentSource::seek(&shared, SeekFrom::Start(100)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(ContentSource::read(&other, &mut buf).unwrap(), 4);
        assert_eq!(buf, [6; 4]);
        assert_eq!(shared.position(), 104);
    }

    #[test]
    fn test_fresh_is_independent() {
        let shared = SharedStream::new(SyntheticStream::new(16, 8, 64).unwrap());
        shared.with_stream(|s| s.seek(50, Whence::Start));

        let fresh = shared.fresh();
        assert_eq!(fresh.position(), 0);
        assert_eq!(fresh.total_size(), 192);

        ContentSource::seek(&fresh, SeekFrom::End(0)).unwrap();
        assert_eq!(shared.position(), 50);
    }
}
