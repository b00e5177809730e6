//! Link-side half of the pipeline

use reflex_protocol::{FrameDecoder, Segment};

use crate::exchange::{FrameError, FrameWriter};

/// Producer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProducerStats {
    /// Frames published to the exchange
    pub published: u32,
    /// Frames consumed and dropped for exceeding the slot size
    pub oversized: u32,
}

/// What one `feed` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedReport {
    /// Frames published during this call
    pub published: u32,
    /// Most recent frame rejected during this call
    pub rejected: Option<FrameError>,
}

/// Decodes the inbound stream straight into exchange slots
pub struct FrameProducer<'a, const N: usize> {
    decoder: FrameDecoder,
    writer: FrameWriter<'a, N>,
    discarding: bool,
    stats: ProducerStats,
}

impl<'a, const N: usize> FrameProducer<'a, N> {
    pub fn new(writer: FrameWriter<'a, N>) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            writer,
            discarding: false,
            stats: ProducerStats::default(),
        }
    }

    /// Consume one read from the link
    ///
    /// Never waits on the consumer. A frame split across reads resumes on
    /// the next call.
    pub fn feed(&mut self, mut input: &[u8]) -> FeedReport {
        let mut report = FeedReport::default();
        while let Some(segment) = self.decoder.decode(&mut input) {
            match segment {
                Segment::Start { len } => match self.writer.begin_frame(len) {
                    Ok(()) => self.discarding = false,
                    Err(err) => {
                        self.discarding = true;
                        self.stats.oversized += 1;
                        report.rejected = Some(err);
                    }
                },
                Segment::Data(chunk) => {
                    if !self.discarding {
                        self.writer.extend(chunk);
                    }
                }
                Segment::End => {
                    if !self.discarding && self.writer.publish() {
                        self.stats.published += 1;
                        report.published += 1;
                    }
                    self.discarding = false;
                }
            }
        }
        report
    }

    /// True while a frame is partially received
    pub fn in_frame(&self) -> bool {
        self.decoder.in_frame()
    }

    /// Counters since startup
    pub fn stats(&self) -> ProducerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::exchange::FrameExchange;
    use reflex_protocol::{encode_header, HEADER_LEN};
    use std::vec::Vec;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::from(encode_header(payload.len() as u32));
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_frame_across_reads() {
        let mut exchange = FrameExchange::<32>::new();
        let (writer, mut reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);

        let stream = framed(b"hello world");
        for byte in stream.chunks(3) {
            assert!(reader.pickup().is_none());
            producer.feed(byte);
        }
        assert!(!producer.in_frame());
        assert_eq!(reader.pickup().unwrap().bytes(), b"hello world");
        assert_eq!(producer.stats().published, 1);
    }

    #[test]
    fn test_back_to_back_frames_coalesce() {
        let mut exchange = FrameExchange::<32>::new();
        let (writer, mut reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);

        let mut stream = framed(b"old");
        stream.extend(framed(b"new"));
        let report = producer.feed(&stream);

        assert_eq!(report.published, 2);
        assert_eq!(reader.pickup().unwrap().bytes(), b"new");
        assert!(reader.pickup().is_none());
    }

    #[test]
    fn test_stalled_frame_keeps_last_complete() {
        let mut exchange = FrameExchange::<32>::new();
        let (writer, mut reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);

        producer.feed(&framed(b"one"));
        let held = reader.pickup().unwrap();
        producer.feed(&framed(b"two"));

        let three = framed(b"three");
        producer.feed(&three[..HEADER_LEN + 2]);
        assert!(producer.in_frame());

        drop(held);
        assert_eq!(reader.pickup().unwrap().bytes(), b"two");

        // The stalled frame still lands once the rest arrives
        producer.feed(&three[HEADER_LEN + 2..]);
        assert_eq!(reader.pickup().unwrap().bytes(), b"three");
    }

    #[test]
    fn test_oversized_frame_skipped() {
        let mut exchange = FrameExchange::<8>::new();
        let (writer, mut reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);

        let mut stream = framed(&[1; 20]);
        stream.extend(framed(b"fits"));
        let report = producer.feed(&stream);

        assert_eq!(report.published, 1);
        assert_eq!(
            report.rejected,
            Some(FrameError::Oversized {
                len: 20,
                capacity: 8
            })
        );
        assert_eq!(producer.stats().oversized, 1);
        assert_eq!(reader.pickup().unwrap().bytes(), b"fits");
    }

    #[test]
    fn test_zero_length_frame_rings_immediately() {
        let mut exchange = FrameExchange::<8>::new();
        let (writer, mut reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);

        assert_eq!(producer.feed(&encode_header(0)).published, 1);
        assert!(reader.doorbell());
        assert!(reader.pickup().unwrap().bytes().is_empty());
    }
}
