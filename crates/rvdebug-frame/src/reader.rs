use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use rvdebug_transport::DebugStream;
use tracing::{trace, warn};

use crate::codec::{decode_frame, Frame};
use crate::error::{FrameError, ReadPhase, Result};
use crate::layout::{FrameLayout, MAGIC};

/// One read call with serial timeout semantics.
///
/// `Ok(0)` means "no data within the per-read timeout". Socket timeouts
/// (`WouldBlock`/`TimedOut`) are folded into the same case.
fn read_some<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match src.read(buf) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(0)
            }
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Consume bytes one at a time until the sentinel is seen.
///
/// On success the stream is positioned just past the sentinel and the number
/// of discarded bytes is returned. Zero-byte reads are retried until
/// `deadline`. Bytes are consumed irreversibly: a stray `0xD0` left over from
/// a truncated frame is indistinguishable from a real frame start.
pub fn sync_to_magic<R: Read>(src: &mut R, deadline: Instant) -> Result<usize> {
    let start = Instant::now();
    let mut discarded = 0usize;
    let mut byte = [0u8; 1];

    while Instant::now() < deadline {
        if read_some(src, &mut byte)? == 0 {
            continue;
        }
        if byte[0] == MAGIC {
            if discarded > 0 {
                warn!(discarded, "skipped bytes before frame sentinel");
            }
            return Ok(discarded);
        }
        discarded += 1;
    }

    Err(FrameError::Timeout {
        phase: ReadPhase::Sync { discarded },
        waited: start.elapsed(),
    })
}

/// Accumulate exactly `n` bytes.
///
/// Fails with a timeout as soon as one read returns nothing; never returns a
/// short buffer.
pub fn read_exact<R: Read>(src: &mut R, n: usize) -> Result<Bytes> {
    let start = Instant::now();
    let mut buf = BytesMut::zeroed(n);
    let mut filled = 0usize;

    while filled < n {
        let read = read_some(src, &mut buf[filled..])?;
        if read == 0 {
            return Err(FrameError::Timeout {
                phase: ReadPhase::Accumulate {
                    received: filled,
                    expected: n,
                },
                waited: start.elapsed(),
            });
        }
        filled += read;
        trace!(read, filled, expected = n, "frame chunk");
    }

    Ok(buf.freeze())
}

/// Reads complete frames from any `Read` stream.
///
/// Handles synchronization and partial reads internally; callers always get
/// a fully decoded frame or an error.
pub struct FrameReader<T> {
    inner: T,
    layout: FrameLayout,
}

impl<T: Read> FrameReader<T> {
    /// Create a frame reader with the default layout.
    pub fn new(inner: T) -> Self {
        Self::with_layout(inner, FrameLayout::default())
    }

    /// Create a frame reader for an explicit layout.
    pub fn with_layout(inner: T, layout: FrameLayout) -> Self {
        Self { inner, layout }
    }

    /// Wait up to `timeout` for the sentinel, then read the rest of the frame
    /// and return the raw bytes (sentinel included).
    pub fn read_raw_frame(&mut self, timeout: Duration) -> Result<Bytes> {
        self.layout.validate()?;
        let deadline = Instant::now() + timeout;
        sync_to_magic(&mut self.inner, deadline)?;

        let len = self.layout.frame_len();
        let body = read_exact(&mut self.inner, len - 1)?;

        let mut frame = BytesMut::with_capacity(len);
        frame.put_u8(MAGIC);
        frame.extend_from_slice(&body);
        Ok(frame.freeze())
    }

    /// Wait up to `timeout` for the next frame and decode it.
    pub fn read_frame(&mut self, timeout: Duration) -> Result<Frame> {
        let raw = self.read_raw_frame(timeout)?;
        decode_frame(&raw, &self.layout)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame layout.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }
}

impl FrameReader<DebugStream> {
    /// Create a frame reader for `DebugStream` and apply the per-read timeout.
    pub fn with_read_timeout(
        inner: DebugStream,
        layout: FrameLayout,
        read_timeout: Duration,
    ) -> Result<Self> {
        inner.set_read_timeout(read_timeout)?;
        Ok(Self::with_layout(inner, layout))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::codec::{encode_frame, DumpFlags, DumpType, PipelineWords, Snapshot};
    use crate::layout::{ProtocolVariant, PIPE_WORDS, REG_COUNT};

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn sample_frame(layout: FrameLayout) -> Frame {
        let mut registers = [0u32; REG_COUNT];
        registers[2] = 0x0000_1000;
        registers[10] = 0xFFFF_FFF6;
        let snapshot = Snapshot {
            dump_type: DumpType::Manual,
            flags: DumpFlags::from_bits(DumpFlags::PIPE_EMPTY),
            pad: 0,
            pc: 0x40,
            registers,
            memory: vec![0x11; layout.mem_dump_bytes].into(),
        };
        match layout.variant {
            ProtocolVariant::Basic => Frame::Basic(snapshot),
            ProtocolVariant::WithPipeline => Frame::WithPipeline {
                snapshot,
                pipeline: PipelineWords([7; PIPE_WORDS]),
            },
        }
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn sync_positions_after_sentinel() {
        let mut src = Cursor::new(vec![0x01, 0x02, 0xD0, 0x99]);
        let discarded = sync_to_magic(&mut src, far_deadline()).unwrap();

        assert_eq!(discarded, 2);
        assert_eq!(src.position(), 3);
        let mut rest = Vec::new();
        src.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0x99]);
    }

    #[test]
    fn sync_times_out_on_zero_bytes() {
        let mut src = std::io::repeat(0x00);
        let deadline = Instant::now() + Duration::from_millis(20);
        let err = sync_to_magic(&mut src, deadline).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Timeout {
                phase: ReadPhase::Sync { .. },
                ..
            }
        ));
    }

    #[test]
    fn sync_retries_idle_reads_until_deadline() {
        let mut src = Cursor::new(Vec::<u8>::new());
        let deadline = Instant::now() + Duration::from_millis(20);
        let err = sync_to_magic(&mut src, deadline).unwrap_err();
        match err {
            FrameError::Timeout { phase, waited } => {
                assert_eq!(phase, ReadPhase::Sync { discarded: 0 });
                assert!(waited >= Duration::from_millis(15));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sync_with_past_deadline_reads_nothing() {
        let mut src = Cursor::new(vec![MAGIC]);
        let err = sync_to_magic(&mut src, Instant::now()).unwrap_err();
        assert!(matches!(err, FrameError::Timeout { .. }));
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn sync_survives_idle_gaps() {
        let mut src = ScriptedReader::new(vec![
            Step::Idle,
            Step::Data(vec![0x00]),
            Step::Idle,
            Step::Data(vec![MAGIC]),
        ]);
        assert_eq!(sync_to_magic(&mut src, far_deadline()).unwrap(), 1);
    }

    #[test]
    fn read_exact_accumulates_across_reads() {
        let mut src = ScriptedReader::new(vec![
            Step::Data(vec![1, 2]),
            Step::Data(vec![3]),
            Step::Data(vec![4, 5, 6]),
        ]);
        let buf = read_exact(&mut src, 5).unwrap();
        assert_eq!(buf.as_ref(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn read_exact_fails_on_first_idle_read() {
        let mut src = ScriptedReader::new(vec![
            Step::Data(vec![1, 2, 3]),
            Step::Idle,
            Step::Data(vec![4]),
        ]);
        let err = read_exact(&mut src, 4).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Timeout {
                phase: ReadPhase::Accumulate {
                    received: 3,
                    expected: 4
                },
                ..
            }
        ));
    }

    #[test]
    fn read_exact_zero_is_empty() {
        let mut src = Cursor::new(Vec::<u8>::new());
        assert!(read_exact(&mut src, 0).unwrap().is_empty());
    }

    #[test]
    fn read_exact_treats_would_block_as_idle() {
        let mut src = ScriptedReader::new(vec![Step::Data(vec![9]), Step::WouldBlock]);
        assert!(matches!(
            read_exact(&mut src, 2),
            Err(FrameError::Timeout { .. })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut src = ScriptedReader::new(vec![Step::Interrupted, Step::Data(vec![0xAA, 0xBB])]);
        assert_eq!(read_exact(&mut src, 2).unwrap().as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn hard_io_error_propagates() {
        let mut src = ScriptedReader::new(vec![Step::Broken]);
        let err = read_exact(&mut src, 1).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn read_frame_after_noise() {
        let layout = FrameLayout::default();
        let frame = sample_frame(layout);
        let mut bytes = vec![0x00, 0x13, 0x37];
        bytes.extend(wire(&frame));

        let mut reader = FrameReader::with_layout(Cursor::new(bytes), layout);
        let decoded = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn read_frame_byte_by_byte() {
        let layout = FrameLayout::new(ProtocolVariant::Basic, 8);
        let frame = sample_frame(layout);
        let steps = wire(&frame).into_iter().map(|b| Step::Data(vec![b])).collect();

        let mut reader = FrameReader::with_layout(ScriptedReader::new(steps), layout);
        assert_eq!(reader.read_frame(Duration::from_secs(1)).unwrap(), frame);
    }

    #[test]
    fn read_raw_frame_restores_sentinel() {
        let layout = FrameLayout::default();
        let frame = sample_frame(layout);
        let bytes = wire(&frame);

        let mut reader = FrameReader::with_layout(Cursor::new(bytes.clone()), layout);
        let raw = reader.read_raw_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(raw.as_ref(), bytes.as_slice());
    }

    #[test]
    fn oversized_layout_fails_before_reading() {
        let layout = FrameLayout::new(ProtocolVariant::WithPipeline, usize::MAX);
        let mut src = Cursor::new(vec![MAGIC; 16]);
        let mut reader = FrameReader::with_layout(&mut src, layout);
        let err = reader.read_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FrameError::LayoutTooLarge { .. }));
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn truncated_frame_times_out() {
        let layout = FrameLayout::default();
        let mut bytes = wire(&sample_frame(layout));
        bytes.truncate(100);

        let mut reader = FrameReader::with_layout(Cursor::new(bytes), layout);
        let err = reader.read_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Timeout {
                phase: ReadPhase::Accumulate {
                    received: 99,
                    expected: 291
                },
                ..
            }
        ));
    }

    #[test]
    fn false_sentinel_misaligns_frame() {
        // A stray sentinel ahead of the real frame is taken as the frame start.
        let layout = FrameLayout::new(ProtocolVariant::Basic, 4);
        let frame = sample_frame(layout);
        let mut bytes = vec![MAGIC, 0x01];
        bytes.extend(wire(&frame));

        let mut reader = FrameReader::with_layout(Cursor::new(bytes), layout);
        let decoded = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_ne!(decoded, frame);
    }

    #[test]
    fn reads_frames_over_socket_pair() {
        let layout = FrameLayout::default();
        let frame = sample_frame(layout);
        let (host, mut target) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = FrameReader::with_read_timeout(
            DebugStream::from_unix(host),
            layout,
            Duration::from_millis(200),
        )
        .unwrap();

        let bytes = wire(&frame);
        let target_thread = std::thread::spawn(move || {
            let (head, tail) = bytes.split_at(50);
            target.write_all(&[0x00]).unwrap();
            target.write_all(head).unwrap();
            std::thread::sleep(Duration::from_millis(10));
            target.write_all(tail).unwrap();
            target
        });

        let decoded = reader.read_frame(Duration::from_secs(2)).unwrap();
        assert_eq!(decoded, frame);
        let _target = target_thread.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(*reader.layout(), FrameLayout::default());
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    enum Step {
        Data(Vec<u8>),
        Idle,
        Interrupted,
        WouldBlock,
        Broken,
    }

    /// Replays a fixed script of read outcomes; idle once exhausted.
    struct ScriptedReader {
        steps: std::collections::VecDeque<Step>,
    }

    impl ScriptedReader {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.steps.pop_front() {
                None | Some(Step::Idle) => Ok(0),
                Some(Step::Interrupted) => Err(std::io::Error::from(ErrorKind::Interrupted)),
                Some(Step::WouldBlock) => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                Some(Step::Broken) => Err(std::io::Error::from(ErrorKind::BrokenPipe)),
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(Step::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }
}
