//! Stream sinks.
//!
//! The protocol family is sniffed from the URL once, and the sink kind is
//! chosen once from that family and the host capabilities. After that the
//! engine and the validator only deal with a [`StreamSink`].

use crate::error::Result;
use bridge_traits::{
    AdaptiveDemuxer, ElementRole, MediaBackend, MediaCapabilities, MediaElement, MediaEventSender,
    SourceHint,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamProtocol {
    /// Manifest-based segmented stream (HLS).
    Adaptive,
    /// Direct resource.
    Progressive,
}

impl StreamProtocol {
    pub fn detect(url: &str) -> Self {
        if url.to_ascii_lowercase().contains("m3u8") {
            StreamProtocol::Adaptive
        } else {
            StreamProtocol::Progressive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Host demuxer attached in front of the element.
    Demuxed,
    /// Manifest URL assigned to an element that plays it natively.
    NativeAdaptive,
    Progressive,
}

impl SinkKind {
    pub fn select(protocol: StreamProtocol, capabilities: MediaCapabilities) -> Self {
        match protocol {
            StreamProtocol::Adaptive if capabilities.adaptive_demuxer => SinkKind::Demuxed,
            StreamProtocol::Adaptive if capabilities.native_adaptive => SinkKind::NativeAdaptive,
            _ => SinkKind::Progressive,
        }
    }

    pub fn for_url(url: &str, capabilities: MediaCapabilities) -> Self {
        Self::select(StreamProtocol::detect(url), capabilities)
    }

    pub fn is_adaptive(self) -> bool {
        !matches!(self, SinkKind::Progressive)
    }

    /// The one fallback left after this kind failed.
    pub fn downgrade(self) -> Option<SinkKind> {
        match self {
            SinkKind::Demuxed | SinkKind::NativeAdaptive => Some(SinkKind::Progressive),
            SinkKind::Progressive => None,
        }
    }
}

/// A stream opened on an element.
pub enum StreamSink {
    Demuxed { demuxer: Box<dyn AdaptiveDemuxer> },
    NativeAdaptive,
    Progressive,
}

impl StreamSink {
    /// Open `url` on `element`. A demuxer reports on `events`, the same
    /// channel the element uses.
    pub fn open(
        kind: SinkKind,
        backend: &dyn MediaBackend,
        role: ElementRole,
        element: &Arc<dyn MediaElement>,
        url: &str,
        events: MediaEventSender,
    ) -> Result<Self> {
        match kind {
            SinkKind::Demuxed => {
                let demuxer = backend.create_demuxer(role, events)?;
                demuxer.load_source(url);
                demuxer.attach(Arc::clone(element));
                Ok(StreamSink::Demuxed { demuxer })
            }
            SinkKind::NativeAdaptive => {
                element.set_source(url, SourceHint::NativeAdaptive);
                element.load();
                Ok(StreamSink::NativeAdaptive)
            }
            SinkKind::Progressive => {
                element.set_source(url, SourceHint::Progressive);
                element.load();
                Ok(StreamSink::Progressive)
            }
        }
    }

    pub fn kind(&self) -> SinkKind {
        match self {
            StreamSink::Demuxed { .. } => SinkKind::Demuxed,
            StreamSink::NativeAdaptive => SinkKind::NativeAdaptive,
            StreamSink::Progressive => SinkKind::Progressive,
        }
    }

    /// Release the demuxer, if any. Safe to call repeatedly.
    pub fn close(&self) {
        if let StreamSink::Demuxed { demuxer } = self {
            demuxer.detach();
            demuxer.destroy();
        }
    }
}

impl std::fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamSink").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::media_event_channel;
    use bridge_traits::testing::FakeMediaBackend;

    #[test]
    fn test_protocol_detection() {
        assert_eq!(
            StreamProtocol::detect("https://cdn.example/live/index.m3u8"),
            StreamProtocol::Adaptive
        );
        assert_eq!(
            StreamProtocol::detect("https://cdn.example/playlist.M3U8?token=1"),
            StreamProtocol::Adaptive
        );
        assert_eq!(
            StreamProtocol::detect("http://ice.example:8000/stream.mp3"),
            StreamProtocol::Progressive
        );
    }

    #[test]
    fn test_selection_prefers_demuxer() {
        let both = MediaCapabilities {
            adaptive_demuxer: true,
            native_adaptive: true,
        };
        assert_eq!(SinkKind::select(StreamProtocol::Adaptive, both), SinkKind::Demuxed);
        assert_eq!(
            SinkKind::select(
                StreamProtocol::Adaptive,
                MediaCapabilities::with_native_adaptive()
            ),
            SinkKind::NativeAdaptive
        );
        assert_eq!(
            SinkKind::select(
                StreamProtocol::Adaptive,
                MediaCapabilities::progressive_only()
            ),
            SinkKind::Progressive
        );
        assert_eq!(
            SinkKind::select(StreamProtocol::Progressive, both),
            SinkKind::Progressive
        );
    }

    #[test]
    fn test_single_downgrade_step() {
        assert_eq!(SinkKind::Demuxed.downgrade(), Some(SinkKind::Progressive));
        assert_eq!(SinkKind::NativeAdaptive.downgrade(), Some(SinkKind::Progressive));
        assert_eq!(SinkKind::Progressive.downgrade(), None);
    }

    #[tokio::test]
    async fn test_demuxed_sink_closes_its_demuxer() {
        let backend = FakeMediaBackend::new(MediaCapabilities::with_demuxer());
        let (tx, _rx) = media_event_channel();
        let element = backend
            .create_element(ElementRole::Playback, tx.clone())
            .unwrap();

        let sink = StreamSink::open(
            SinkKind::Demuxed,
            &backend,
            ElementRole::Playback,
            &element,
            "http://cdn/live.m3u8",
            tx,
        )
        .unwrap();
        assert_eq!(sink.kind(), SinkKind::Demuxed);
        assert_eq!(backend.live_demuxers(), 1);
        assert_eq!(
            backend.playback_opens(),
            vec![("http://cdn/live.m3u8".to_string(), SourceHint::Attached)]
        );

        sink.close();
        sink.close();
        assert_eq!(backend.live_demuxers(), 0);
    }
}
