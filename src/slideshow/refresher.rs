//! The image refresh loop.

use crate::error::{PotatoError, Result};
use crate::events::{FrameEvent, StatusEmitter};
use crate::scheduler::{IntervalScheduler, ScheduleControl, ScheduleHandle};
use crate::slideshow::RemoteSettings;
use crate::slideshow::share::{ShareClient, join_share_path, normalize_dir};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Datelike, NaiveDate};
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const SETTINGS_FILE: &str = "settings.json";
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// One image ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    /// File name inside the chosen directory.
    pub file_name: String,
    /// Directory it was read from (share-relative).
    pub directory: String,
    /// `data:image/<ext>;base64,...`.
    pub data_url: String,
    /// Settings in effect for this image.
    pub settings: RemoteSettings,
}

/// Lower-cased extension of an image file name, if it is one we show.
pub fn image_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// `MM-DD` and `MM` folders for `date` under `dir`, most specific first.
pub fn dated_dirs(dir: &str, date: NaiveDate) -> [String; 2] {
    let month = join_share_path(dir, &format!("{:02}", date.month()));
    let day = format!("{month}-{:02}", date.day());
    [day, month]
}

#[derive(Debug, Default)]
struct RefreshState {
    current_file: Option<String>,
    settings: Option<RemoteSettings>,
    published_settings: Option<RemoteSettings>,
}

/// Loads a random image from the share on a repeating timer.
pub struct ImageRefresher {
    share: Arc<dyn ShareClient>,
    directory: String,
    emitter: StatusEmitter,
    default_period: Duration,
    today: fn() -> NaiveDate,
    state: Mutex<RefreshState>,
    schedule: Mutex<Option<ScheduleControl>>,
}

impl std::fmt::Debug for ImageRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRefresher")
            .field("directory", &self.directory)
            .field("default_period", &self.default_period)
            .finish_non_exhaustive()
    }
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl ImageRefresher {
    /// Refresher reading `directory` of `share`. `default_period` applies
    /// until `settings.json` names a refresh rate.
    pub fn new(
        share: Arc<dyn ShareClient>,
        directory: impl Into<String>,
        default_period: Duration,
        emitter: StatusEmitter,
    ) -> Self {
        Self {
            share,
            directory: directory.into(),
            emitter,
            default_period,
            today: local_today,
            state: Mutex::new(RefreshState::default()),
            schedule: Mutex::new(None),
        }
    }

    /// Replace the date source used to pick dated folders.
    pub fn with_date_source(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Settings from the most recent successful read.
    pub fn settings(&self) -> Option<RemoteSettings> {
        self.state().settings.clone()
    }

    /// File currently on screen.
    pub fn current_file(&self) -> Option<String> {
        self.state().current_file.clone()
    }

    /// Period the timer should run at given the latest settings.
    pub fn period(&self) -> Duration {
        self.state()
            .settings
            .as_ref()
            .and_then(RemoteSettings::refresh_period)
            .unwrap_or(self.default_period)
    }

    /// Re-read `settings.json`. Missing or unparsable settings keep the
    /// previous value, or the defaults on first read.
    async fn load_settings(&self) -> RemoteSettings {
        let path = join_share_path(&self.directory, SETTINGS_FILE);
        let parsed = match self.share.read_file(&path).await {
            Ok(bytes) => serde_json::from_slice::<RemoteSettings>(&bytes)
                .map_err(|e| warn!("cannot parse {path}: {e}"))
                .ok(),
            Err(e) => {
                debug!("no remote settings: {e}");
                None
            }
        };

        let mut state = self.state();
        let settings = parsed
            .or_else(|| state.settings.clone())
            .unwrap_or_default();
        state.settings = Some(settings.clone());
        settings
    }

    /// Directory to show today and the images in it.
    async fn list_images(&self) -> Result<(String, Vec<String>)> {
        let today = (self.today)();
        let mut dir = normalize_dir(&self.directory).to_owned();
        for candidate in dated_dirs(&self.directory, today) {
            if self.share.exists(&candidate).await? {
                dir = candidate;
                break;
            }
        }

        let files = self
            .share
            .read_dir(&dir)
            .await?
            .into_iter()
            .filter(|name| image_extension(name).is_some())
            .collect();
        Ok((dir, files))
    }

    /// Load the next image, avoiding the one on screen when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the share cannot be read or holds no images.
    pub async fn load_next(&self) -> Result<LoadedImage> {
        let settings = self.load_settings().await;
        let (dir, files) = self.list_images().await?;
        if files.is_empty() {
            let shown = if dir.is_empty() { "/" } else { dir.as_str() };
            return Err(PotatoError::Slideshow(format!("no images found in {shown}")));
        }

        let chosen = {
            let current = self.state().current_file.clone();
            let candidates: Vec<&String> = files
                .iter()
                .filter(|f| files.len() == 1 || Some(*f) != current.as_ref())
                .collect();
            let pool = if candidates.is_empty() {
                files.iter().collect()
            } else {
                candidates
            };
            pool.choose(&mut rand::thread_rng())
                .map(|f| (*f).clone())
                .ok_or_else(|| PotatoError::Slideshow("no image to choose".to_owned()))?
        };

        let bytes = self.share.read_file(&join_share_path(&dir, &chosen)).await?;
        let ext = image_extension(&chosen).unwrap_or_else(|| "jpeg".to_owned());
        let data_url = format!("data:image/{ext};base64,{}", STANDARD.encode(&bytes));

        self.state().current_file = Some(chosen.clone());
        Ok(LoadedImage {
            file_name: chosen,
            directory: dir,
            data_url,
            settings,
        })
    }

    /// One refresh: load, publish, and return the period to use next.
    pub async fn refresh(&self) -> Duration {
        match self.load_next().await {
            Ok(image) => {
                info!(file = %image.file_name, dir = %image.directory, "new image");
                let changed = {
                    let mut state = self.state();
                    if state.published_settings.as_ref() == Some(&image.settings) {
                        false
                    } else {
                        state.published_settings = Some(image.settings.clone());
                        true
                    }
                };
                if changed {
                    self.emitter
                        .emit(FrameEvent::RemoteSettingsUpdated(image.settings));
                }
                self.emitter.emit(FrameEvent::NewImage {
                    file_name: image.file_name,
                    data_url: image.data_url,
                });
            }
            Err(e) => {
                warn!("image refresh failed: {e}");
                self.emitter.emit(FrameEvent::SlideshowError {
                    message: e.to_string(),
                });
            }
        }
        self.period()
    }

    /// Refresh now and then on the share's refresh rate, re-arming the timer
    /// whenever that rate changes.
    pub fn start(self: &Arc<Self>) -> ScheduleHandle {
        let scheduler = IntervalScheduler::new("image-refresh", self.period());
        let control = scheduler.control();
        *self.schedule.lock().unwrap_or_else(|e| e.into_inner()) = Some(control.clone());

        let refresher = Arc::clone(self);
        scheduler.run(move || {
            let refresher = Arc::clone(&refresher);
            let control = control.clone();
            async move {
                let period = refresher.refresh().await;
                control.set_period(period);
            }
        })
    }

    /// Show the next image now without moving the timer.
    pub async fn next(&self) {
        let control = self
            .schedule
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match control {
            Some(control) if !control.is_disposed() => control.trigger_now(),
            _ => {
                self.refresh().await;
            }
        }
    }
}
