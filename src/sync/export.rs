//! Export of a study batch to a device.
//!
//! # Sequence
//!
//! 1. Open the backend's writer. A failure here aborts before the host is
//!    touched.
//! 2. Rename duplicate ids so the batch is keyed uniquely.
//! 3. Select the items for the offline period and sort them by interval.
//! 4. Write the batch header and device configuration.
//! 5. Per item: encode stats, render both sides, rewrite media references
//!    to their staged paths, find inverse items, write.
//! 6. Close the writer, then stage images (to 80 %) and sounds (to 100 %).
//!
//! Cancellation is honoured between items. A cancelled export closes the
//! writer with the items written so far and skips media staging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use crate::assets::filename::staged_name;
use crate::assets::{self, MediaKind, MediaTags, Stage, Transfer};
use crate::backend::{DeviceBackend, MediaLayout};
use crate::error::{Error, Result};
use crate::host::{HostStore, SETTING_EXTRA_FACTOR, SETTING_GRADE_0_ITEMS, SETTING_UPLOAD_LOGS};
use crate::model::StudyItem;
use crate::render::{HOOK_IMAGE, HOOK_SOUND, Renderer, Side};
use crate::sync::codec::encode;
use crate::sync::reconcile::eliminate_duplicate_ids;
use crate::sync::select::{SelectionParams, items_for_days};
use crate::sync::session::SyncSession;
use crate::sync::types::{ExportEntry, ExportStats};

/// Percentage reached once every item is written.
const ITEMS_DONE: u32 = 50;
/// Percentage reached once images are staged.
const IMAGES_DONE: u32 = 80;
/// Percentage reached once sounds are staged.
const SOUNDS_DONE: u32 = 100;

/// Parameters of one export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Offline days to cover.
    pub num_days: u32,
    /// Acquisition budget multiplier; `None` uses the host setting.
    pub extra_factor: Option<f64>,
    /// Directory relative media paths are resolved against.
    pub media_root: PathBuf,
}

impl ExportOptions {
    #[must_use]
    pub fn new(num_days: u32) -> Self {
        Self {
            num_days,
            extra_factor: None,
            media_root: PathBuf::from("."),
        }
    }
}

/// Exporter for one device backend.
pub struct Exporter<'a, S: HostStore + ?Sized> {
    store: &'a mut S,
    backend: &'a dyn DeviceBackend,
    renderer: &'a Renderer,
}

impl<'a, S: HostStore + ?Sized> Exporter<'a, S> {
    #[must_use]
    pub fn new(store: &'a mut S, backend: &'a dyn DeviceBackend, renderer: &'a Renderer) -> Self {
        Self {
            store,
            backend,
            renderer,
        }
    }

    /// Export with a thread-local random source for candidate shuffling.
    ///
    /// # Errors
    ///
    /// See [`Self::export_with_rng`].
    pub fn export(&mut self, session: &mut SyncSession<'_>, options: &ExportOptions) -> Result<ExportStats> {
        self.export_with_rng(session, options, &mut rand::rng())
    }

    /// Export the batch for `options.num_days` into the session's sync path.
    ///
    /// # Errors
    ///
    /// Returns an error if the host store fails, a host setting is invalid,
    /// or the backend fails ([`Error::Interface`]).
    pub fn export_with_rng<R: Rng + ?Sized>(
        &mut self,
        session: &mut SyncSession<'_>,
        options: &ExportOptions,
        rng: &mut R,
    ) -> Result<ExportStats> {
        let backend_name = self.backend.description();
        let interface = |e| Error::interface(backend_name, e);

        let mut writer = self.backend.start_export(session.sync_path()).map_err(interface)?;

        let renames = eliminate_duplicate_ids(&mut *self.store)?;

        let params = self.selection_params(options)?;
        let mut items = self.store.items()?;
        let selection = items_for_days(&mut items, &params, rng);
        let batch = selection.items;
        info!(
            items = batch.len(),
            retention = selection.retention,
            acquisition = selection.acquisition,
            num_days = options.num_days,
            "Selected export batch"
        );

        let mut stats = ExportStats {
            retention: selection.retention,
            acquisition: selection.acquisition,
            renamed_ids: renames.len(),
            ..ExportStats::default()
        };

        session.set_start_time(params.time_of_start);
        writer
            .open(params.time_of_start, options.num_days, batch.len())
            .map_err(interface)?;
        writer.write_config(&self.device_config(&params)?).map_err(interface)?;

        let layout = self.backend.media_layout();
        let tags = MediaTags::new()?;

        for (serial, item) in batch.iter().enumerate() {
            if session.is_cancelled() {
                info!(written = serial, "Export cancelled");
                stats.cancelled = true;
                break;
            }

            let entry = self.entry(session, &tags, &layout, &batch, serial, item);
            writer.write(session, &entry).map_err(interface)?;
            stats.items += 1;
            session.set_progress_between(0, ITEMS_DONE, serial + 1, batch.len());
        }

        writer.close(session).map_err(interface)?;

        if stats.cancelled {
            return Ok(stats);
        }
        session.set_progress(ITEMS_DONE);

        self.stage_media(session, &layout, &options.media_root, &mut stats)?;
        session.set_progress(SOUNDS_DONE);
        Ok(stats)
    }

    fn selection_params(&self, options: &ExportOptions) -> Result<SelectionParams> {
        let budget = self.store.setting_int(SETTING_GRADE_0_ITEMS)?;
        let grade_0_items_at_once = u32::try_from(budget).map_err(|_| {
            Error::Config(format!("{SETTING_GRADE_0_ITEMS} must be a non-negative integer, got {budget}"))
        })?;
        let extra_factor = match options.extra_factor {
            Some(extra) => extra,
            None => self.store.setting_f64_or(SETTING_EXTRA_FACTOR, 1.0)?,
        };
        if !(extra_factor.is_finite() && extra_factor >= 0.0) {
            return Err(Error::InvalidArgument(format!(
                "extra factor must be a non-negative number, got {extra_factor}"
            )));
        }

        Ok(SelectionParams {
            num_days: options.num_days,
            grade_0_items_at_once,
            extra_factor,
            now: chrono::Utc::now().timestamp(),
            time_of_start: self.store.time_of_start()?,
        })
    }

    fn device_config(&self, params: &SelectionParams) -> Result<BTreeMap<String, String>> {
        let logging = self.store.setting_int(SETTING_UPLOAD_LOGS)?;
        Ok(BTreeMap::from([
            (
                SETTING_GRADE_0_ITEMS.to_string(),
                params.grade_0_items_at_once.to_string(),
            ),
            ("logging".to_string(), logging.to_string()),
        ]))
    }

    /// Build the entry for `item`, recording its media in the session.
    fn entry(
        &self,
        session: &mut SyncSession<'_>,
        tags: &MediaTags,
        layout: &MediaLayout,
        batch: &[StudyItem],
        serial: usize,
        item: &StudyItem,
    ) -> ExportEntry {
        let question = stage_refs(session, tags, layout, &self.renderer.render(item, Side::Question));
        let answer = stage_refs(session, tags, layout, &self.renderer.render(item, Side::Answer));

        let inverse_ids = batch
            .iter()
            .filter(|other| item.is_inverse_of(other))
            .map(|other| other.id.clone())
            .collect();

        ExportEntry {
            id: item.id.clone(),
            serial,
            stats: encode(&item.state),
            question,
            answer,
            category: item.category.clone(),
            inverse_ids,
        }
    }

    fn stage_media(
        &self,
        session: &mut SyncSession<'_>,
        layout: &MediaLayout,
        media_root: &Path,
        stats: &mut ExportStats,
    ) -> Result<()> {
        let backend_name = self.backend.description();

        let images = session.images().sources().to_vec();
        let image_stage = Stage {
            subdir: &layout.image_dir,
            transfer: Transfer::ConvertImage(&layout.image_policy),
            ceiling: IMAGES_DONE,
        };
        let collected = assets::collect(session, &image_stage, &images, media_root, &mut |path| {
            self.renderer.run_file_hooks(HOOK_IMAGE, path);
        })
        .map_err(|e| Error::interface(backend_name, e))?;
        debug!(?collected, "Staged images");
        stats.images = collected.staged;
        stats.removed_media = collected.removed;

        let sounds = session.sounds().sources().to_vec();
        let sound_stage = Stage {
            subdir: &layout.sound_dir,
            transfer: Transfer::Copy(assets::copy_file),
            ceiling: SOUNDS_DONE,
        };
        let collected = assets::collect(session, &sound_stage, &sounds, media_root, &mut |path| {
            self.renderer.run_file_hooks(HOOK_SOUND, path);
        })
        .map_err(|e| Error::interface(backend_name, e))?;
        debug!(?collected, "Staged sounds");
        stats.sounds = collected.staged;
        stats.removed_media += collected.removed;

        Ok(())
    }
}

/// Rewrite media references in `text` to staged paths, recording each
/// source in the session.
fn stage_refs(session: &mut SyncSession<'_>, tags: &MediaTags, layout: &MediaLayout, text: &str) -> String {
    let text = tags.rewrite(MediaKind::Image, text, |src| {
        let name = staged_name(src, layout.image_policy.to_ext.as_deref());
        session.images_mut().add(src, &name);
        format!("{}/{name}", layout.image_dir)
    });
    tags.rewrite(MediaKind::Sound, &text, |src| {
        let name = staged_name(src, None);
        session.sounds_mut().add(src, &name);
        format!("{}/{name}", layout.sound_dir)
    })
}
