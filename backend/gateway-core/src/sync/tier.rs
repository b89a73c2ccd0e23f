//! Three-tier buffers and the precedence rule.

use models::Keyed;

/// Which buffer a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Live,
    Polled,
    Builtin,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Live => "live",
            Tier::Polled => "polled",
            Tier::Builtin => "builtin",
        }
    }
}

/// Live if connected and live is non-empty; else polled if non-empty;
/// else builtin. Evaluated on every read, never cached.
pub fn select_tier(connected: bool, live_len: usize, polled_len: usize) -> Tier {
    if connected && live_len > 0 {
        Tier::Live
    } else if polled_len > 0 {
        Tier::Polled
    } else {
        Tier::Builtin
    }
}

/// The three buffers for one domain. Switching tiers never clears any of
/// them.
#[derive(Debug, Clone, Default)]
pub struct TieredBuffer<T> {
    pub live: Vec<T>,
    pub polled: Vec<T>,
    builtin: Vec<T>,
}

impl<T: Clone + Keyed> TieredBuffer<T> {
    pub fn with_builtin(builtin: Vec<T>) -> Self {
        Self {
            live: Vec::new(),
            polled: Vec::new(),
            builtin,
        }
    }

    pub fn builtin(&self) -> &[T] {
        &self.builtin
    }

    pub fn active_tier(&self, connected: bool) -> Tier {
        select_tier(connected, self.live.len(), self.polled.len())
    }

    pub fn view(&self, connected: bool) -> &[T] {
        match self.active_tier(connected) {
            Tier::Live => &self.live,
            Tier::Polled => &self.polled,
            Tier::Builtin => &self.builtin,
        }
    }

    pub fn find(&self, connected: bool, key: &str) -> Option<T> {
        self.view(connected).iter().find(|r| r.key() == key).cloned()
    }

    /// What a local edit applies to: the polled tier, or builtin while
    /// nothing has been polled yet.
    pub fn edit_base(&self) -> &[T] {
        if self.polled.is_empty() {
            &self.builtin
        } else {
            &self.polled
        }
    }

    /// Seed the polled tier from builtin when it is empty, so a local edit
    /// has a base to apply to.
    pub fn polled_mut_seeded(&mut self) -> &mut Vec<T> {
        if self.polled.is_empty() {
            self.polled = self.builtin.clone();
        }
        &mut self.polled
    }
}
