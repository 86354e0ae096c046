use zmesh_core::values::ValueId;

/// One polled value: how often it is due and where the round-robin stands.
#[derive(Debug, Clone)]
struct PollEntry {
    value_id: ValueId,
    /// 0 = never, N = every Nth pass of the poll pump
    intensity: u8,
    passes: u32,
}

/// The round-robin poll list. The poll pump advances one entry per tick;
/// the tick period is the configured interval divided by the list length,
/// which spreads requests out instead of bursting them.
#[derive(Debug, Default)]
pub struct PollList {
    entries: Vec<PollEntry>,
    cursor: usize,
}

impl PollList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self, value_id: ValueId, intensity: u8) -> bool {
        if intensity == 0 {
            return false;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.value_id == value_id) {
            entry.intensity = intensity;
            return false;
        }
        self.entries.push(PollEntry {
            value_id,
            intensity,
            passes: 0,
        });
        true
    }

    pub fn disable(&mut self, value_id: &ValueId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.value_id != *value_id);
        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, value_id: &ValueId) -> bool {
        self.entries.iter().any(|e| e.value_id == *value_id)
    }

    /// Advances the round-robin by one entry. Returns the value due this
    /// tick, or None when the entry's intensity skips this pass.
    pub fn tick(&mut self) -> Option<ValueId> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor %= self.entries.len();
        let entry = &mut self.entries[self.cursor];
        self.cursor += 1;

        entry.passes = entry.passes.wrapping_add(1);
        if entry.passes % entry.intensity as u32 == 0 {
            Some(entry.value_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use zmesh_core::prelude::*;

    fn value_id(index: u8) -> ValueId {
        ValueId {
            home_id: HomeId(1),
            node_id: NodeId(7),
            genre: ValueGenre::User,
            command_class_id: CommandClassId::SWITCH_BINARY,
            instance: 1,
            index,
            ty: ValueType::Bool,
        }
    }

    #[test]
    fn round_robin_with_intensity() {
        let mut list = PollList::new();
        assert!(list.enable(value_id(0), 1));
        assert!(list.enable(value_id(1), 2));

        // Pass 1: entry 0 fires, entry 1 skips
        assert_eq!(list.tick(), Some(value_id(0)));
        assert_eq!(list.tick(), None);
        // Pass 2: both fire
        assert_eq!(list.tick(), Some(value_id(0)));
        assert_eq!(list.tick(), Some(value_id(1)));
    }

    #[test]
    fn enable_twice_updates_intensity() {
        let mut list = PollList::new();
        assert!(list.enable(value_id(0), 1));
        assert!(!list.enable(value_id(0), 3));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn zero_intensity_is_rejected() {
        let mut list = PollList::new();
        assert!(!list.enable(value_id(0), 0));
        assert!(list.is_empty());
    }
}
