//! One mounted hourglass: asset loading, the per-frame tick, and teardown.
//!
//! The host calls [`Visual::frame`] once per display frame. Assets load on a
//! helper thread so the first frames return immediately; a shared `disposed`
//! flag stops a torn-down visual from ever starting once its assets arrive.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
};

use rand::{rngs::StdRng, SeedableRng};

use super::{
    assets::{AssetError, Assets},
    config::HourglassConfig,
    mask,
    sand_simulator::Simulator,
    surface::Surface,
    vec::Vec2,
};

#[derive(Clone, Debug)]
pub enum AssetSource {
    /// Directory holding `frame.png`, `mask.png` and optionally `overlay.png`.
    Dir(PathBuf),
    /// The built-in glass, drawn at surface size.
    Procedural,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualState {
    Loading,
    Running,
    /// Reduced motion: one frame was drawn and nothing else happens.
    Static,
    Failed,
    Disposed,
}

struct Scene {
    simulator: Simulator,
    assets: Assets,
}

enum Stage {
    Loading(Receiver<Result<Assets, AssetError>>),
    Running(Box<Scene>),
    Static(Box<Scene>),
    Failed,
    Disposed,
}

pub struct Visual {
    stage: Stage,
    disposed: Arc<AtomicBool>,
    config: HourglassConfig,
    reduced_motion: bool,
    seed: Option<u64>,
    surface_size: Vec2<u32>,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

impl Visual {
    /// Starts loading assets for a surface of `surface_size` pixels.
    /// `reduced_motion` is read once here. With `seed` set, the sand is
    /// reproducible.
    pub fn mount(
        surface_size: Vec2<u32>,
        source: AssetSource,
        config: HourglassConfig,
        reduced_motion: bool,
        seed: Option<u64>,
    ) -> Self {
        let disposed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&disposed);

        let spawned = thread::Builder::new()
            .name("hourglass-assets".into())
            .spawn(move || {
                let loaded = match source {
                    AssetSource::Dir(dir) => Assets::load_dir(&dir),
                    AssetSource::Procedural => Ok(Assets::procedural(surface_size)),
                };
                if flag.load(Ordering::Acquire) {
                    log::debug!("hourglass disposed while loading, dropping assets");
                    return;
                }
                let _ = tx.send(loaded);
            });

        let stage = match spawned {
            Ok(_) => Stage::Loading(rx),
            Err(e) => {
                log::error!("could not start hourglass asset loader: {}", e);
                Stage::Failed
            }
        };

        Self {
            stage,
            disposed,
            config,
            reduced_motion,
            seed,
            surface_size,
        }
    }

    pub fn state(&self) -> VisualState {
        match self.stage {
            Stage::Loading(_) => VisualState::Loading,
            Stage::Running(_) => VisualState::Running,
            Stage::Static(_) => VisualState::Static,
            Stage::Failed => VisualState::Failed,
            Stage::Disposed => VisualState::Disposed,
        }
    }

    pub fn simulator(&self) -> Option<&Simulator> {
        match &self.stage {
            Stage::Running(scene) | Stage::Static(scene) => Some(&scene.simulator),
            _ => None,
        }
    }

    /// Starts a new draining cycle from a full top chamber.
    pub fn reseed(&mut self) {
        if let Stage::Running(scene) = &mut self.stage {
            scene.simulator.restart();
        }
    }

    /// The per-frame callback.
    pub fn frame<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        let polled = match &self.stage {
            Stage::Loading(rx) => Some(rx.try_recv()),
            _ => None,
        };
        let loaded = match polled {
            Some(Ok(result)) => Some(result),
            Some(Err(TryRecvError::Empty)) => return,
            Some(Err(TryRecvError::Disconnected)) => {
                log::error!("hourglass asset loader went away");
                self.stage = Stage::Failed;
                return;
            }
            None => None,
        };

        match loaded {
            Some(Ok(assets)) => self.start(assets, surface),
            Some(Err(e)) => {
                log::error!("hourglass assets error: {}", e);
                self.stage = Stage::Failed;
            }
            None => {
                if let Stage::Running(scene) = &mut self.stage {
                    Self::tick(scene, surface);
                }
            }
        }
    }

    fn start<S: Surface + ?Sized>(&mut self, assets: Assets, surface: &mut S) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let scale = self.config.pixel_scale.max(1);
        let grid = Vec2::new(self.surface_size.x / scale, self.surface_size.y / scale).as_usize();
        let allowed = mask::allowed_from_image(&assets.mask, grid, self.config.mask_threshold);
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut simulator = Simulator::new(grid, allowed, self.config.clone(), rng);
        simulator.seed_top();
        log::info!(
            "hourglass started on a {}x{} grid with {} grains",
            grid.x,
            grid.y,
            simulator.target_top_count()
        );

        let mut scene = Box::new(Scene { simulator, assets });
        if self.reduced_motion {
            scene.simulator.seed_static();
            if let Err(e) = scene.simulator.render(&scene.assets, surface) {
                log::error!("hourglass still frame failed: {}", e);
            }
            self.stage = Stage::Static(scene);
        } else {
            Self::tick(&mut scene, surface);
            self.stage = Stage::Running(scene);
        }
    }

    fn tick<S: Surface + ?Sized>(scene: &mut Scene, surface: &mut S) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            scene.simulator.step();
            scene.simulator.render(&scene.assets, surface)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("hourglass tick {} failed: {}", scene.simulator.tick(), e),
            Err(payload) => log::error!(
                "hourglass tick {} panicked: {}",
                scene.simulator.tick(),
                panic_message(payload.as_ref())
            ),
        }
    }

    /// Tears the visual down. Assets still in flight are discarded.
    pub fn dispose(&mut self) {
        self.disposed.store(true, Ordering::Release);
        self.stage = Stage::Disposed;
    }
}

impl Drop for Visual {
    fn drop(&mut self) {
        self.disposed.store(true, Ordering::Release);
    }
}
