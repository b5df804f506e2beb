//! The in-memory preference record for one player.
//!
//! A [`PlayerRecord`] is created on first contact with a player, mutated by
//! user-facing commands, flushed to the backend on save, and discarded when
//! the player's session ends. The backend row remains until overwritten.
//!
//! # Dirty state
//!
//! The record carries an explicit clean/dirty state:
//! - mutators transition clean → dirty, and only when the value actually
//!   changes
//! - dirty → clean happens only inside this crate, after a save has been
//!   confirmed by the backend or after persisted state has been decoded
//!   into the record
//!
//! Consumers can observe the state through [`PlayerRecord::is_dirty`] but
//! cannot clear it themselves.

use std::collections::BTreeSet;

use uuid::Uuid;

/// How a player toggles the feature on.
///
/// Stored by its stable uppercase identifier; unknown identifiers in
/// persisted data decode to the configured default mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivationMode {
    /// Never activated.
    None,
    /// The player's client mod decides.
    Client,
    /// Active while the player is sneaking.
    #[default]
    Sneak,
    /// Active while the player is standing (not sneaking).
    Stand,
    /// Always active.
    Always,
}

impl ActivationMode {
    /// The stable string identifier used in persisted data.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Client => "CLIENT",
            Self::Sneak => "SNEAK",
            Self::Stand => "STAND",
            Self::Always => "ALWAYS",
        }
    }

    /// Parse a stable identifier, case-insensitively.
    ///
    /// Returns `None` for identifiers outside the known enumeration.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::None, Self::Client, Self::Sneak, Self::Stand, Self::Always]
            .into_iter()
            .find(|mode| mode.id().eq_ignore_ascii_case(id))
    }
}

/// The in-memory preference state for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    player_id: Uuid,
    pub(crate) activation_mode: ActivationMode,
    pub(crate) disabled_categories: BTreeSet<String>,
    pub(crate) pattern_id: Option<String>,
    dirty: bool,
}

impl PlayerRecord {
    /// Create a clean record with default values.
    #[must_use]
    pub fn new(player_id: Uuid) -> Self {
        Self::with_activation_mode(player_id, ActivationMode::default())
    }

    /// Create a clean record with the given activation mode.
    ///
    /// Use this when the system default mode differs from
    /// [`ActivationMode::default`].
    #[must_use]
    pub const fn with_activation_mode(player_id: Uuid, mode: ActivationMode) -> Self {
        Self {
            player_id,
            activation_mode: mode,
            disabled_categories: BTreeSet::new(),
            pattern_id: None,
            dirty: false,
        }
    }

    /// The stable unique identifier of the player this record belongs to.
    #[must_use]
    pub const fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// The player's activation mode.
    #[must_use]
    pub const fn activation_mode(&self) -> ActivationMode {
        self.activation_mode
    }

    /// Set the activation mode, marking the record dirty on change.
    pub fn set_activation_mode(&mut self, mode: ActivationMode) {
        if self.activation_mode != mode {
            self.activation_mode = mode;
            self.dirty = true;
        }
    }

    /// Category identifiers the player has turned off, in sorted order.
    ///
    /// An empty set is valid and means "nothing disabled".
    #[must_use]
    pub const fn disabled_categories(&self) -> &BTreeSet<String> {
        &self.disabled_categories
    }

    /// Whether the given category is disabled for this player.
    #[must_use]
    pub fn is_category_disabled(&self, category_id: &str) -> bool {
        self.disabled_categories.contains(category_id)
    }

    /// Disable a category. Returns true if it was not already disabled.
    pub fn disable_category(&mut self, category_id: impl Into<String>) -> bool {
        let inserted = self.disabled_categories.insert(category_id.into());
        self.dirty |= inserted;
        inserted
    }

    /// Re-enable a category. Returns true if it was disabled.
    pub fn enable_category(&mut self, category_id: &str) -> bool {
        let removed = self.disabled_categories.remove(category_id);
        self.dirty |= removed;
        removed
    }

    /// Re-enable every category.
    pub fn enable_all_categories(&mut self) {
        if !self.disabled_categories.is_empty() {
            self.disabled_categories.clear();
            self.dirty = true;
        }
    }

    /// The selected behavior pattern, or `None` for the system default.
    #[must_use]
    pub fn pattern_id(&self) -> Option<&str> {
        self.pattern_id.as_deref()
    }

    /// Select a behavior pattern (`None` reverts to the system default),
    /// marking the record dirty on change.
    pub fn set_pattern(&mut self, pattern_id: Option<String>) {
        if self.pattern_id != pattern_id {
            self.pattern_id = pattern_id;
            self.dirty = true;
        }
    }

    /// Whether the record has unsaved in-memory changes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag.
    ///
    /// Crate-internal: called by the engine after a confirmed save, and by
    /// the codec after decoding persisted state into the record.
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
