use chrono::{DateTime, Utc};

/// The most recent full fetch of one remote collection.
///
/// Never patched in place: a successful fetch replaces `items` wholesale, a
/// failed one records the message and leaves the previous items alone.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    items: Vec<T>,
    loading: bool,
    error: Option<String>,
    fetched_at: Option<DateTime<Utc>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            fetched_at: None,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub(crate) fn begin(&mut self) {
        self.loading = true;
    }

    pub(crate) fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.loading = false;
        self.error = None;
        self.fetched_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Ends a fetch whose response was discarded.
    pub(crate) fn abandon(&mut self) {
        self.loading = false;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
