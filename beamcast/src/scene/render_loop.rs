use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::{
    scene::SceneSnapshot,
    sensors::{RenderConfig, RenderFrame, camera::Camera},
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ViewerId(u64);

/// Drives one render worker per viewer without ever blocking the caller.
/// The external display layer pushes snapshots in via [`RenderLoop::pump`]
/// and polls finished frames out via [`RenderLoop::query`].
#[derive(Debug, Default)]
pub struct RenderLoop {
    workers: DashMap<ViewerId, ViewerWorker>,
    next_id: AtomicU64,
}

impl RenderLoop {
    pub fn add_viewer(&self, camera: Camera, config: RenderConfig) -> ViewerId {
        let id = ViewerId(self.next_id.fetch_add(1, Ordering::SeqCst));

        self.workers.insert(
            id,
            ViewerWorker {
                camera: Arc::new(RwLock::new(camera)),
                config,
                worker: RwLock::new(None),
                last_frame: RwLock::new(None),
            },
        );

        id
    }

    pub fn contains_viewer(&self, id: ViewerId) -> bool {
        self.workers.contains_key(&id)
    }

    /// Shared handle to the viewer's camera, for moving and turning it
    /// between frames.
    pub fn camera(&self, id: ViewerId) -> Option<Arc<RwLock<Camera>>> {
        Some(Arc::clone(&self.workers.get(&id)?.camera))
    }

    /// Promotes a finished frame if one arrived, then schedules the next
    /// pass of this viewer against `snapshot`. Returns false for an unknown
    /// viewer.
    pub fn pump(&self, id: ViewerId, snapshot: &SceneSnapshot) -> bool {
        if let Some(worker) = self.workers.get(&id) {
            worker.pump(snapshot);

            true
        } else {
            false
        }
    }

    /// Latest completed frame for this viewer, if any pass has finished yet.
    pub fn query(&self, id: ViewerId) -> Option<RenderFrame> {
        self.workers.get(&id)?.last_frame.read().clone()
    }
}

#[derive(Debug)]
struct ViewerWorker {
    camera: Arc<RwLock<Camera>>,
    config: RenderConfig,
    worker: RwLock<Option<flume::Receiver<RenderFrame>>>,
    last_frame: RwLock<Option<RenderFrame>>,
}

impl ViewerWorker {
    fn pump(&self, snapshot: &SceneSnapshot) {
        if let Some(rcv) = &*self.worker.read() {
            match rcv.try_recv() {
                // The pass is still running; let it finish.
                Err(flume::TryRecvError::Empty) => return,
                Ok(frame) => {
                    self.last_frame.write().replace(frame);
                }
                Err(flume::TryRecvError::Disconnected) => {}
            }
        }

        // The pose is read once here; moving the camera mid-pass cannot
        // affect a pass already in flight.
        let camera = *self.camera.read();
        let config = self.config.clone();
        let snapshot = snapshot.clone();
        let (snd, rcv) = flume::bounded(1);

        rayon::spawn(move || match camera.render_snapshot(&snapshot, &config) {
            Ok(frame) => {
                let _ = snd.send(frame);
            }
            Err(e) => log::warn!("Render worker failed: {e}"),
        });

        self.worker.write().replace(rcv);
    }
}
