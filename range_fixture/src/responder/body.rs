//! Lazily streamed response bodies.

use std::cmp::min;
use std::io::{self, SeekFrom};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, future, stream};
use uuid::Uuid;

use super::range::HttpRange;
use crate::content::ContentSource;

/// Largest chunk read from the content per body frame.
const COPY_CHUNK_SIZE: u64 = 32 * 1024;

/// Streams `len` bytes of `content`, seeking to `seek_to` first when given.
///
/// Ends with an `UnexpectedEof` error if the content runs out early.
pub(crate) fn section<C: ContentSource>(
    content: C,
    seek_to: Option<u64>,
    len: u64,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream::unfold((content, seek_to, len), |(content, seek_to, remaining)| async move {
        if let Some(pos) = seek_to {
            if let Err(e) = content.seek(SeekFrom::Start(pos)) {
                return Some((Err(e), (content, None, 0)));
            }
        }
        if remaining == 0 {
            return None;
        }

        let mut buf = BytesMut::zeroed(min(remaining, COPY_CHUNK_SIZE) as usize);
        match content.read(&mut buf) {
            Ok(0) => {
                let e = io::Error::new(io::ErrorKind::UnexpectedEof, format!("content ended {remaining} bytes early"));
                Some((Err(e), (content, None, 0)))
            },
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf.freeze()), (content, None, remaining - n as u64)))
            },
            Err(e) => Some((Err(e), (content, None, 0))),
        }
    })
}

/// A `multipart/byteranges` body over several ranges of one resource.
#[derive(Debug)]
pub(crate) struct Multipart {
    boundary: String,
    parts: Vec<(Bytes, HttpRange)>,
    closing: Bytes,
}

impl Multipart {
    pub fn new(ranges: &[HttpRange], content_type: &str, size: u64) -> Self {
        let boundary = Uuid::new_v4().simple().to_string();

        let parts = ranges
            .iter()
            .enumerate()
            .map(|(i, range)| {
                let lead = if i == 0 { "" } else { "\r\n" };
                let header = format!(
                    "{lead}--{boundary}\r\nContent-Range: {}\r\nContent-Type: {content_type}\r\n\r\n",
                    range.content_range(size)
                );
                (Bytes::from(header), *range)
            })
            .collect::<Vec<_>>();

        let lead = if parts.is_empty() { "" } else { "\r\n" };
        let closing = Bytes::from(format!("{lead}--{boundary}--\r\n"));

        Self {
            boundary,
            parts,
            closing,
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Exact encoded length of the body.
    pub fn len(&self) -> u64 {
        let parts: u64 = self.parts.iter().map(|(header, range)| header.len() as u64 + range.length).sum();
        parts + self.closing.len() as u64
    }

    /// Streams the parts in order. Each part seeks the content when it is reached.
    pub fn into_stream<C: ContentSource>(self, content: C) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let closing = self.closing;
        stream::iter(self.parts)
            .flat_map(move |(header, range)| {
                stream::once(future::ready(Ok(header))).chain(section(content.clone(), Some(range.start), range.length))
            })
            .chain(stream::once(future::ready(Ok(closing))))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use synthetic_stream::SyntheticStream;

    use super::*;
    use crate::content::SharedStream;

    fn shared() -> SharedStream {
        SharedStream::new(SyntheticStream::new(16, 8, 64).unwrap())
    }

    async fn collect(s: impl Stream<Item = io::Result<Bytes>>) -> io::Result<Vec<u8>> {
        s.try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
    }

    #[tokio::test]
    async fn test_section_reads_from_cursor() {
        let content = shared();
        ContentSource::seek(&content, SeekFrom::Start(120)).unwrap();

        let data = collect(section(content.clone(), None, 16)).await.unwrap();
        assert_eq!(&data[..8], &[7; 8]);
        assert_eq!(&data[8..], &[0; 8]);
        assert_eq!(content.position(), 136);
    }

    #[tokio::test]
    async fn test_section_seeks_first() {
        let content = shared();
        let data = collect(section(content.clone(), Some(32), 4)).await.unwrap();
        assert_eq!(data, vec![2; 4]);
    }

    #[tokio::test]
    async fn test_section_chunks_large_content() {
        let content = SharedStream::new(SyntheticStream::new(1024, 100, 0).unwrap());
        let chunks = section(content, Some(0), 102_400).collect::<Vec<_>>().await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].as_ref().unwrap().len(), 32 * 1024);
        assert_eq!(chunks[3].as_ref().unwrap().len(), 4 * 1024);
    }

    #[tokio::test]
    async fn test_section_short_content_errors() {
        let err = collect(section(shared(), Some(190), 8)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_multipart_layout() {
        let ranges = [HttpRange { start: 16, length: 2 }, HttpRange { start: 100, length: 3 }];
        let multipart = Multipart::new(&ranges, "application/octet-stream", 192);
        let boundary = multipart.boundary.clone();
        let len = multipart.len();

        let body = collect(multipart.into_stream(shared())).await.unwrap();
        assert_eq!(body.len() as u64, len);

        let mut expected = Vec::new();
        expected.extend_from_slice(
            format!("--{boundary}\r\nContent-Range: bytes 16-17/192\r\nContent-Type: application/octet-stream\r\n\r\n")
                .as_bytes(),
        );
        expected.extend_from_slice(&[1, 1]);
        expected.extend_from_slice(
            format!(
                "\r\n--{boundary}\r\nContent-Range: bytes 100-102/192\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        expected.extend_from_slice(&[6, 6, 6]);
        expected.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        assert_eq!(body, expected);
    }
}
