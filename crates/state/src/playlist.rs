use std::sync::Mutex;

use crate::change::{ChangeGuard, ChangeType, Signal};
use crate::content::{Content, ContentId};
use crate::film::Film;
use crate::time::{DcpTime, DcpTimePeriod};

/// Notification that one property of one content item is changing.
#[derive(Clone, Debug)]
pub struct ContentChange {
    pub id: ContentId,
    pub property: u32,
    pub change: ChangeType,
    /// Part of a rapid series (e.g. a drag); consumers should coalesce.
    pub frequent: bool,
}

/// Ordered list of content items making up the programme.
///
/// Mutation goes through methods here so that structure changes and property
/// changes are announced on `changed` / `content_changed` with matched
/// Pending/Done pairs.
pub struct Playlist {
    content: Mutex<Vec<Content>>,
    pub changed: Signal<ChangeType>,
    pub content_changed: Signal<ContentChange>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Playlist {
    pub fn new() -> Self {
        Self {
            content: Mutex::new(Vec::new()),
            changed: Signal::new(),
            content_changed: Signal::new(),
        }
    }

    /// Snapshot of the current content, in playlist order.
    pub fn content(&self) -> Vec<Content> {
        self.content.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.content.lock().unwrap().is_empty()
    }

    pub fn add(&self, c: Content) {
        let guard = ChangeGuard::new(|t| self.changed.emit(&t));
        self.content.lock().unwrap().push(c);
        guard.done();
    }

    pub fn remove(&self, id: ContentId) {
        let guard = ChangeGuard::new(|t| self.changed.emit(&t));
        let removed = {
            let mut content = self.content.lock().unwrap();
            let before = content.len();
            content.retain(|c| c.id != id);
            content.len() != before
        };
        if removed {
            guard.done();
        }
        // An unknown id drops the guard, cancelling the change.
    }

    /// Apply `f` to the item with the given id, announcing the change as
    /// `property` around the mutation.  Returns false if the id is unknown.
    pub fn update<F>(&self, id: ContentId, property: u32, frequent: bool, f: F) -> bool
    where
        F: FnOnce(&mut Content),
    {
        {
            let content = self.content.lock().unwrap();
            if !content.iter().any(|c| c.id == id) {
                return false;
            }
        }

        let guard = ChangeGuard::new(|change| {
            self.content_changed.emit(&ContentChange {
                id,
                property,
                change,
                frequent,
            });
        });

        {
            let mut content = self.content.lock().unwrap();
            if let Some(c) = content.iter_mut().find(|c| c.id == id) {
                f(c);
            }
        }

        guard.done();
        true
    }

    pub fn set_position(&self, id: ContentId, position: DcpTime, frequent: bool) -> bool {
        self.update(id, crate::content::property::POSITION, frequent, |c| {
            c.position = position;
        })
    }

    pub fn set_trim_start(
        &self,
        id: ContentId,
        trim: crate::time::ContentTime,
        frequent: bool,
    ) -> bool {
        self.update(id, crate::content::property::TRIM_START, frequent, |c| {
            c.trim_start = trim;
        })
    }

    pub fn set_trim_end(
        &self,
        id: ContentId,
        trim: crate::time::ContentTime,
        frequent: bool,
    ) -> bool {
        self.update(id, crate::content::property::TRIM_END, frequent, |c| {
            c.trim_end = trim;
        })
    }

    /// Items whose timeline extent overlaps `period`, filtered by `pred`.
    pub fn overlapping<F>(&self, film: &Film, period: DcpTimePeriod, pred: F) -> Vec<Content>
    where
        F: Fn(&Content) -> bool,
    {
        self.content
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                pred(c)
                    && DcpTimePeriod::new(c.position, c.end(film))
                        .overlap(period)
                        .is_some()
            })
            .cloned()
            .collect()
    }

    /// End of the last content, rounded up to a whole video frame.
    pub fn length(&self, film: &Film) -> DcpTime {
        self.content
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.end(film))
            .max()
            .unwrap_or(DcpTime::ZERO)
            .ceil_to_frame(f64::from(film.video_frame_rate))
    }
}
