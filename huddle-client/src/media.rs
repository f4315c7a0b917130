use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use huddle_core::MemberName;

use crate::error::CaptureError;

/// Opus frame that decodes to silence (DTX).
pub const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Duration of one outbound audio frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// One encoded audio frame from the capture device.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub data: Bytes,
    pub duration: Duration,
}

/// Source of encoded outbound audio.
///
/// `open` starts the device and returns the frame stream. Opening is the
/// permission boundary: a denied microphone must fail here, before any
/// call signaling goes out.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn open(&self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;
}

/// Consumes inbound audio from remote peers. One sink serves the whole
/// call; frames are tagged with the sending member.
pub trait AudioSink: Send + Sync {
    fn on_frame(&self, from: &MemberName, frame: &[u8]);
}

/// Sink that drops everything, for headless use.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl AudioSink for DiscardSink {
    fn on_frame(&self, _from: &MemberName, _frame: &[u8]) {}
}

/// Capture source that produces Opus DTX silence at the frame rate.
/// Stands in for a real microphone on headless hosts and in tests.
#[derive(Debug, Default)]
pub struct SilenceCapture;

#[async_trait]
impl AudioCapture for SilenceCapture {
    async fn open(&self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME_DURATION);
            loop {
                ticker.tick().await;
                let frame = AudioFrame {
                    data: Bytes::from_static(&OPUS_SILENCE_FRAME),
                    duration: FRAME_DURATION,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// The local outbound audio stream, shared by every link in a call.
///
/// Holds the single Opus track that each peer connection attaches, plus
/// the mute flag. Muting swaps captured frames for DTX silence in the
/// pump; the track itself stays attached, so no renegotiation happens.
pub struct LocalMedia {
    track: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl LocalMedia {
    /// Open the capture device and start pumping its frames into the
    /// outbound track. Fails without side effects if capture is denied.
    pub async fn open(capture: &dyn AudioCapture) -> Result<Arc<Self>, CaptureError> {
        let frames = capture.open().await?;
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            "huddle-mic".to_owned(),
        ));
        let enabled = Arc::new(AtomicBool::new(true));
        let pump = tokio::spawn(pump_frames(
            Arc::clone(&track),
            Arc::clone(&enabled),
            frames,
        ));
        Ok(Arc::new(Self {
            track,
            enabled,
            pump,
        }))
    }

    /// The track to attach to a peer connection.
    pub fn track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Drop for LocalMedia {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_frames(
    track: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
    mut frames: mpsc::Receiver<AudioFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let data = if enabled.load(Ordering::Relaxed) {
            frame.data
        } else {
            Bytes::from_static(&OPUS_SILENCE_FRAME)
        };
        let sample = Sample {
            data,
            duration: frame.duration,
            ..Default::default()
        };
        if track.write_sample(&sample).await.is_err() {
            break;
        }
    }
    debug!("Outbound audio pump stopped");
}
