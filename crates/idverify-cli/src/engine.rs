use idverify_core::{AnalyzerError, Detection, FaceAnalyzer, Frame};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Analyze {
        label: String,
        frame: Frame,
        reply: oneshot::Sender<Result<Option<Detection>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request analysis of one frame: at most one detection comes back.
    pub async fn analyze(&self, label: &str, frame: Frame) -> Result<Option<Detection>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                label: label.to_string(),
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Move the analyzer onto a dedicated OS thread and return a handle to it.
///
/// ONNX sessions need `&mut` access, so every request is served in arrival
/// order by the one thread that owns them.
pub fn spawn_engine<A>(mut analyzer: A) -> Result<EngineHandle, EngineError>
where
    A: FaceAnalyzer + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("idverify-engine".into())
        .spawn(move || {
            tracing::debug!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { label, frame, reply } => {
                        tracing::debug!(image = %label, width = frame.width(), height = frame.height(), "analyzing");
                        let result = analyzer.analyze(&frame).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::debug!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use idverify_core::detector::DetectorError;
    use idverify_core::{BoundingBox, FaceDescriptor};
    use image::{Rgb, RgbImage};

    /// Stand-in analyzer: a black frame has no face, a one-pixel-wide frame
    /// fails, anything else yields a face described by its mean brightness.
    pub(crate) struct BrightnessAnalyzer;

    impl FaceAnalyzer for BrightnessAnalyzer {
        fn analyze(&mut self, frame: &Frame) -> Result<Option<Detection>, AnalyzerError> {
            if frame.width() == 1 {
                return Err(DetectorError::InferenceFailed("frame too narrow".into()).into());
            }
            let samples = frame.pixels.as_raw();
            if samples.iter().all(|&p| p == 0) {
                return Ok(None);
            }
            let mean = samples.iter().map(|&p| p as f32).sum::<f32>() / samples.len() as f32;
            Ok(Some(Detection {
                face: BoundingBox {
                    x: 1.0,
                    y: 1.0,
                    width: (frame.width() - 1) as f32,
                    height: (frame.height() - 1) as f32,
                    confidence: 0.99,
                    landmarks: None,
                },
                descriptor: FaceDescriptor::new(vec![mean / 255.0, 0.0]),
            }))
        }
    }

    fn frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(RgbImage::from_pixel(width, height, Rgb([value; 3])))
    }

    #[tokio::test]
    async fn test_engine_returns_detection() {
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();
        let detection = engine.analyze("ID Card", frame(4, 4, 255)).await.unwrap().unwrap();
        assert_eq!(detection.descriptor.values, vec![1.0, 0.0]);
        assert_eq!(detection.face.width, 3.0);
    }

    #[tokio::test]
    async fn test_engine_no_face() {
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();
        assert!(engine.analyze("Selfie", frame(4, 4, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_engine_propagates_analyzer_error() {
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();
        let err = engine.analyze("Selfie", frame(1, 4, 90)).await.unwrap_err();
        assert!(matches!(err, EngineError::Analyzer(_)));
    }

    #[tokio::test]
    async fn test_engine_serves_concurrent_requests() {
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();
        let (a, b) = tokio::join!(
            engine.analyze("ID Card", frame(4, 4, 51)),
            engine.analyze("Selfie", frame(4, 4, 102)),
        );
        assert!((a.unwrap().unwrap().descriptor.values[0] - 0.2).abs() < 1e-6);
        assert!((b.unwrap().unwrap().descriptor.values[0] - 0.4).abs() < 1e-6);
    }
}
