//! Destination effects and the per-run effect log.

use std::fmt;

use crate::change::Revision;

/// What happened at the destination for one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// A new destination object (commit, review, directory) was created.
    Created,
    /// An existing destination object was updated.
    Updated,
    /// Nothing was written.
    Noop,
    /// The change failed.
    Error,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectKind::Created => write!(f, "CREATED"),
            EffectKind::Updated => write!(f, "UPDATED"),
            EffectKind::Noop => write!(f, "NOOP"),
            EffectKind::Error => write!(f, "ERROR"),
        }
    }
}

/// Reference to the object a destination wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRef {
    /// Destination-side id (commit hash, Change-Id, directory path).
    pub id: String,
    /// `commit`, `review` or `directory`.
    pub kind: String,
    pub url: Option<String>,
}

impl DestinationRef {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for DestinationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{}", url),
            None => write!(f, "{} {}", self.kind, self.id),
        }
    }
}

/// Outcome of applying one change to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationEffect {
    pub kind: EffectKind,
    pub summary: String,
    pub origin_revision: Revision,
    pub destination_ref: Option<DestinationRef>,
    /// Name of the transformation step that failed, for `Error` effects
    /// caused by a transformation.
    pub failed_step: Option<String>,
}

impl DestinationEffect {
    pub fn new(kind: EffectKind, origin_revision: Revision, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            origin_revision,
            destination_ref: None,
            failed_step: None,
        }
    }

    pub fn created(origin_revision: Revision, summary: impl Into<String>, dest: DestinationRef) -> Self {
        Self::new(EffectKind::Created, origin_revision, summary).with_ref(dest)
    }

    pub fn updated(origin_revision: Revision, summary: impl Into<String>, dest: DestinationRef) -> Self {
        Self::new(EffectKind::Updated, origin_revision, summary).with_ref(dest)
    }

    pub fn noop(origin_revision: Revision, summary: impl Into<String>) -> Self {
        Self::new(EffectKind::Noop, origin_revision, summary)
    }

    pub fn error(origin_revision: Revision, summary: impl Into<String>) -> Self {
        Self::new(EffectKind::Error, origin_revision, summary)
    }

    pub fn with_ref(mut self, dest: DestinationRef) -> Self {
        self.destination_ref = Some(dest);
        self
    }

    pub fn with_failed_step(mut self, step: Option<&str>) -> Self {
        self.failed_step = step.map(str::to_string);
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == EffectKind::Error
    }
}

/// Per-kind totals over an effect list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectCounts {
    pub created: usize,
    pub updated: usize,
    pub noop: usize,
    pub error: usize,
}

impl EffectCounts {
    pub fn of(effects: &[DestinationEffect]) -> Self {
        let mut counts = Self::default();
        for effect in effects {
            match effect.kind {
                EffectKind::Created => counts.created += 1,
                EffectKind::Updated => counts.updated += 1,
                EffectKind::Noop => counts.noop += 1,
                EffectKind::Error => counts.error += 1,
            }
        }
        counts
    }
}

/// Append-only record of every effect produced during a run, in commit order.
#[derive(Debug, Default)]
pub struct EffectLog {
    effects: Vec<DestinationEffect>,
}

impl EffectLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, effects: impl IntoIterator<Item = DestinationEffect>) {
        self.effects.extend(effects);
    }

    pub fn as_slice(&self) -> &[DestinationEffect] {
        &self.effects
    }

    /// Effects recorded since `start`, used to report one change's effects.
    pub fn since(&self, start: usize) -> &[DestinationEffect] {
        &self.effects[start.min(self.effects.len())..]
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn counts(&self) -> EffectCounts {
        EffectCounts::of(&self.effects)
    }

    pub fn into_vec(self) -> Vec<DestinationEffect> {
        self.effects
    }
}
