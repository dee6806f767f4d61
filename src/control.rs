//! Control loop: frames in, detections and operator keys, motion out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use crate::detect::{Detection, Detector, Target};
use crate::ingest::FrameSource;
use crate::input::{InputRouter, KeyEvent};
use crate::kinematics::Kinematics;
use crate::sequence::{
    harvest_sequence, ActuatorSink, HarvestSettings, SequenceHandle, Sequencer,
};

#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub target: Target,
    pub confidence: f32,
    /// Flip frames horizontally before detection.
    pub mirror: bool,
    /// Run the full detection list every this many frames. Model targets
    /// only; color targets never load the model.
    pub detect_all_every: u64,
    /// Pause between frames; zero runs as fast as the source delivers.
    pub frame_interval: Duration,
    pub harvest: HarvestSettings,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            target: Target::cup(),
            confidence: 0.25,
            mirror: true,
            detect_all_every: 5,
            frame_interval: Duration::ZERO,
            harvest: HarvestSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    SourceEnded,
    CameraLost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub grabs_started: u64,
    pub exit: ExitReason,
}

enum Tick {
    Continue,
    Exit(ExitReason),
}

pub struct ControlLoop<F, S> {
    frames: F,
    detector: Detector,
    router: InputRouter,
    sink: Arc<Mutex<S>>,
    kinematics: Box<dyn Kinematics>,
    sequencer: Sequencer,
    settings: LoopSettings,
    in_flight: Option<SequenceHandle>,
    frame_count: u64,
    grabs_started: u64,
    last_target: Option<Detection>,
    last_all: Vec<Detection>,
}

impl<F, S> ControlLoop<F, S>
where
    F: FrameSource,
    S: ActuatorSink + 'static,
{
    pub fn new(
        frames: F,
        detector: Detector,
        router: InputRouter,
        sink: Arc<Mutex<S>>,
        kinematics: Box<dyn Kinematics>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            frames,
            detector,
            router,
            sink,
            kinematics,
            sequencer: Sequencer::new(),
            settings,
            in_flight: None,
            frame_count: 0,
            grabs_started: 0,
            last_target: None,
            last_all: Vec::new(),
        }
    }

    pub fn with_sequencer(mut self, sequencer: Sequencer) -> Self {
        self.sequencer = sequencer;
        self
    }

    /// Target found in the most recent frame.
    pub fn last_target(&self) -> Option<&Detection> {
        self.last_target.as_ref()
    }

    /// Most recent full detection list.
    pub fn last_detections(&self) -> &[Detection] {
        &self.last_all
    }

    /// Run until quit or until the source ends. A model that cannot be
    /// loaded is returned as an error; a running sequence is always waited
    /// for before returning.
    pub fn run(mut self) -> Result<LoopSummary> {
        let exit = loop {
            match self.tick() {
                Ok(Tick::Continue) => {}
                Ok(Tick::Exit(reason)) => break reason,
                Err(err) => {
                    self.finish_in_flight();
                    return Err(err);
                }
            }
            if !self.settings.frame_interval.is_zero() {
                std::thread::sleep(self.settings.frame_interval);
            }
        };
        self.finish_in_flight();
        log::info!(
            "control loop stopped after {} frames ({:?})",
            self.frame_count,
            exit
        );
        Ok(LoopSummary {
            frames: self.frame_count,
            grabs_started: self.grabs_started,
            exit,
        })
    }

    fn tick(&mut self) -> Result<Tick> {
        let frame = match self.frames.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source ended");
                return Ok(Tick::Exit(ExitReason::SourceEnded));
            }
            Err(err) => {
                log::error!("camera lost: {:#}", err);
                return Ok(Tick::Exit(ExitReason::CameraLost));
            }
        };
        let frame = if self.settings.mirror {
            frame.mirrored()
        } else {
            frame
        };

        let (target, _diagnostic) =
            self.detector
                .detect_best(&frame, &self.settings.target, self.settings.confidence)?;
        self.last_target = target;

        let model_mode = matches!(self.settings.target, Target::Label(_));
        if model_mode && self.frame_count % self.settings.detect_all_every.max(1) == 0 {
            let (all, _annotated) = self.detector.detect_all(&frame, self.settings.confidence)?;
            log::debug!("frame {}: {} objects", self.frame_count, all.len());
            self.last_all = all;
        }
        self.frame_count += 1;

        if self.in_flight.as_ref().is_some_and(SequenceHandle::is_finished) {
            self.finish_in_flight();
        }

        match self.router.poll() {
            Some(key) if key.is_quit() => Ok(Tick::Exit(ExitReason::Quit)),
            Some(key) if key.is_grab() => {
                self.grab();
                Ok(Tick::Continue)
            }
            Some(KeyEvent::Char(c)) => {
                log::debug!("ignoring key '{}'", c);
                Ok(Tick::Continue)
            }
            _ => Ok(Tick::Continue),
        }
    }

    fn grab(&mut self) {
        let Some(target) = self.last_target.clone() else {
            log::info!(
                "no target detected ({}); position it in front of the camera",
                self.settings.target
            );
            return;
        };
        if self.sequencer.is_running() {
            log::warn!("grab ignored: a sequence is still running");
            return;
        }
        let sequence =
            match harvest_sequence(self.kinematics.as_ref(), &target, &self.settings.harvest) {
                Ok(sequence) => sequence,
                Err(err) => {
                    log::error!("cannot plan harvest: {:#}", err);
                    return;
                }
            };
        match self.sequencer.run(sequence, self.sink.clone()) {
            Ok(handle) => {
                self.grabs_started += 1;
                self.in_flight = Some(handle);
            }
            Err(err) => log::warn!("{}", err),
        }
    }

    fn finish_in_flight(&mut self) {
        let Some(handle) = self.in_flight.take() else {
            return;
        };
        if !handle.is_finished() {
            log::info!("waiting for sequence '{}' to finish", handle.name());
        }
        match handle.join() {
            Ok(report) if report.all_sent() => {
                log::info!("sequence finished: {} steps sent", report.sent)
            }
            Ok(report) => log::warn!(
                "sequence finished with undelivered steps: {:?}",
                report.failed
            ),
            Err(err) => log::error!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{LazyModel, RawBox, ScriptedBackend};
    use crate::frame::Frame;
    use crate::ingest::{FileConfig, FileSource};
    use crate::input::{ChannelFocus, Mailbox, RawKey};
    use crate::kinematics::PlanarArm;
    use crate::sequence::Sleeper;
    use crate::transport::{MemoryConnector, Transport, TransportSettings};
    use anyhow::anyhow;
    use std::sync::mpsc::Sender;

    fn stub_source(frames: u64) -> FileSource {
        FileSource::new(FileConfig {
            path: "stub://table".into(),
            max_frames: Some(frames),
            repeat: false,
        })
        .unwrap()
    }

    fn transport(connector: &MemoryConnector) -> Arc<Mutex<Transport>> {
        let settings = TransportSettings {
            port: Some("/dev/ttyUSB0".into()),
            settle_delay: Duration::ZERO,
            ..TransportSettings::default()
        };
        Arc::new(Mutex::new(Transport::new(settings, Box::new(connector.clone()))))
    }

    fn no_sleep() -> Sequencer {
        let sleeper: Sleeper = Arc::new(|_: Duration| {});
        Sequencer::with_sleeper(sleeper)
    }

    fn build<F: FrameSource>(
        frames: F,
        model: LazyModel,
        target: Target,
        connector: &MemoryConnector,
    ) -> (ControlLoop<F, Transport>, Sender<RawKey>) {
        let (keys, focus) = ChannelFocus::channel();
        let router = InputRouter::new(Mailbox::new(), Box::new(focus));
        let settings = LoopSettings {
            target,
            ..LoopSettings::default()
        };
        let control = ControlLoop::new(
            frames,
            Detector::new(Arc::new(model)),
            router,
            transport(connector),
            Box::new(PlanarArm::default()),
            settings,
        )
        .with_sequencer(no_sleep());
        (control, keys)
    }

    #[test]
    fn grab_runs_harvest_and_waits_before_exit() {
        let connector = MemoryConnector::new();
        let (control, keys) = build(
            stub_source(3),
            LazyModel::unavailable("color mode only"),
            Target::color("black"),
            &connector,
        );
        keys.send(RawKey::Char('G')).unwrap();

        let summary = control.run().unwrap();
        assert_eq!(summary.exit, ExitReason::SourceEnded);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.grabs_started, 1);

        let written = connector.written();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|line| line.starts_with("{\"op\":\"servos\"")));
        assert_eq!(connector.device().opens, 1);
    }

    #[test]
    fn quit_key_stops_the_loop() {
        let connector = MemoryConnector::new();
        let (control, keys) = build(
            stub_source(100),
            LazyModel::unavailable("color mode only"),
            Target::color("black"),
            &connector,
        );
        keys.send(RawKey::Escape).unwrap();

        let summary = control.run().unwrap();
        assert_eq!(summary.exit, ExitReason::Quit);
        assert_eq!(summary.frames, 1);
        assert!(connector.written().is_empty());
    }

    #[test]
    fn grab_without_target_sends_nothing() {
        let connector = MemoryConnector::new();
        let (control, keys) = build(
            stub_source(2),
            LazyModel::ready(ScriptedBackend::empty()),
            Target::cup(),
            &connector,
        );
        keys.send(RawKey::Space).unwrap();

        let summary = control.run().unwrap();
        assert_eq!(summary.grabs_started, 0);
        assert!(connector.written().is_empty());
    }

    #[test]
    fn model_target_drives_harvest_and_full_list() {
        let connector = MemoryConnector::new();
        let boxes = vec![
            RawBox {
                class_id: 41,
                confidence: 0.7,
                x1: 300.0,
                y1: 200.0,
                x2: 340.0,
                y2: 260.0,
            },
            RawBox {
                class_id: 39,
                confidence: 0.9,
                x1: 10.0,
                y1: 10.0,
                x2: 50.0,
                y2: 90.0,
            },
        ];
        let (mut control, keys) = build(
            stub_source(1),
            LazyModel::ready(ScriptedBackend::new(boxes)),
            Target::cup(),
            &connector,
        );
        keys.send(RawKey::Char('g')).unwrap();

        assert!(matches!(control.tick().unwrap(), Tick::Continue));
        assert_eq!(control.last_target().unwrap().label, "cup");
        assert_eq!(control.last_detections().len(), 2);

        let summary = control.run().unwrap();
        assert_eq!(summary.grabs_started, 1);
        assert_eq!(connector.written().len(), 5);
    }

    #[test]
    fn camera_loss_ends_the_loop() {
        struct Broken;
        impl FrameSource for Broken {
            fn next_frame(&mut self) -> Result<Option<Frame>> {
                Err(anyhow!("device unplugged"))
            }
        }
        let connector = MemoryConnector::new();
        let (control, _keys) = build(
            Broken,
            LazyModel::unavailable("unused"),
            Target::color("black"),
            &connector,
        );
        assert_eq!(control.run().unwrap().exit, ExitReason::CameraLost);
    }

    #[test]
    fn failed_inference_keeps_the_loop_running() {
        struct Flaky;
        impl crate::detect::ObjectDetector for Flaky {
            fn name(&self) -> &'static str {
                "flaky"
            }
            fn detect(
                &mut self,
                _frame: &Frame,
                _confidence: f32,
            ) -> Result<Option<crate::detect::ModelOutput>> {
                Err(anyhow!("ONNX inference failed"))
            }
        }
        let connector = MemoryConnector::new();
        let (control, keys) = build(
            stub_source(3),
            LazyModel::ready(Flaky),
            Target::cup(),
            &connector,
        );
        keys.send(RawKey::Char('g')).unwrap();

        let summary = control.run().unwrap();
        assert_eq!(summary.exit, ExitReason::SourceEnded);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.grabs_started, 0);
        assert!(connector.written().is_empty());
    }

    #[test]
    fn model_load_failure_is_fatal() {
        let connector = MemoryConnector::new();
        let (control, _keys) = build(
            stub_source(1),
            LazyModel::unavailable("weights missing"),
            Target::cup(),
            &connector,
        );
        assert!(control.run().is_err());
    }
}
