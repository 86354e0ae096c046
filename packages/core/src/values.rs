use crate::definitions::{CommandClassId, HomeId, NodeId};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Classifies a value for consumers: protocol basics, user-facing state,
/// device configuration, or system-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueGenre {
    Basic,
    User,
    Config,
    System,
}

impl ValueGenre {
    pub fn label(&self) -> &'static str {
        match self {
            ValueGenre::Basic => "basic",
            ValueGenre::User => "user",
            ValueGenre::Config => "config",
            ValueGenre::System => "system",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "basic" => Some(ValueGenre::Basic),
            "user" => Some(ValueGenre::User),
            "config" => Some(ValueGenre::Config),
            "system" => Some(ValueGenre::System),
            _ => None,
        }
    }
}

/// The scalar shape of a value's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Bool,
    Byte,
    Short,
    Int,
    Decimal,
    List,
    String,
    Button,
    Raw,
}

impl ValueType {
    pub fn label(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Byte => "byte",
            ValueType::Short => "short",
            ValueType::Int => "int",
            ValueType::Decimal => "decimal",
            ValueType::List => "list",
            ValueType::String => "string",
            ValueType::Button => "button",
            ValueType::Raw => "raw",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "bool" => Some(ValueType::Bool),
            "byte" => Some(ValueType::Byte),
            "short" => Some(ValueType::Short),
            "int" => Some(ValueType::Int),
            "decimal" => Some(ValueType::Decimal),
            "list" => Some(ValueType::List),
            "string" => Some(ValueType::String),
            "button" => Some(ValueType::Button),
            "raw" => Some(ValueType::Raw),
            _ => None,
        }
    }
}

/// Globally unique locator for a value within the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId {
    pub home_id: HomeId,
    pub node_id: NodeId,
    pub genre: ValueGenre,
    pub command_class_id: CommandClassId,
    pub instance: u8,
    pub index: u8,
    pub ty: ValueType,
}

impl Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/0x{:02x}/{}/{}/{}",
            self.home_id,
            self.node_id,
            self.genre.label(),
            self.command_class_id.0,
            self.instance,
            self.index,
            self.ty.label()
        )
    }
}

/// One selectable entry of a list value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueListItem {
    pub label: String,
    pub value: i32,
}

/// Typed payload of a value. The variant must match the `ValueType` in the
/// owning `ValueId`; the store enforces this on writes.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueContents {
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    /// Decimal values keep the device's precision, so they are carried as
    /// their string rendering rather than a float.
    Decimal(String),
    List {
        selection: i32,
        items: Vec<ValueListItem>,
    },
    String(String),
    /// Write-only trigger; the payload is the pressed state.
    Button(bool),
    Raw(Vec<u8>),
}

impl ValueContents {
    pub fn ty(&self) -> ValueType {
        match self {
            ValueContents::Bool(_) => ValueType::Bool,
            ValueContents::Byte(_) => ValueType::Byte,
            ValueContents::Short(_) => ValueType::Short,
            ValueContents::Int(_) => ValueType::Int,
            ValueContents::Decimal(_) => ValueType::Decimal,
            ValueContents::List { .. } => ValueType::List,
            ValueContents::String(_) => ValueType::String,
            ValueContents::Button(_) => ValueType::Button,
            ValueContents::Raw(_) => ValueType::Raw,
        }
    }
}

/// What a report did to a value, from the consumer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueUpdate {
    Changed,
    Refreshed,
}

/// A typed leaf value published to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    id: ValueId,
    pub label: String,
    pub units: String,
    pub read_only: bool,
    pub write_only: bool,
    pub poll_intensity: u8,
    is_set: bool,
    contents: ValueContents,
    /// Shadow of the previous contents while an optimistic local write is
    /// awaiting remote confirmation. A report matching the shadow is a stale
    /// echo and must not be surfaced as a change.
    checking_change: Option<ValueContents>,
    /// Attributes read from the config document that this build does not
    /// recognize; written back verbatim on save.
    pub extra: BTreeMap<String, String>,
}

impl Value {
    pub fn new(id: ValueId, label: impl Into<String>, initial: ValueContents) -> Self {
        debug_assert_eq!(id.ty, initial.ty());
        Self {
            id,
            label: label.into(),
            units: String::new(),
            read_only: false,
            write_only: false,
            poll_intensity: 0,
            is_set: false,
            contents: initial,
            checking_change: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn id(&self) -> ValueId {
        self.id
    }

    pub fn is_set(&self) -> bool {
        self.is_set
    }

    pub fn contents(&self) -> &ValueContents {
        &self.contents
    }

    /// Optimistic local update on behalf of the consumer. The previous
    /// contents become the checking-change shadow so a stale report echoing
    /// them does not masquerade as a remote change.
    pub fn set_local(&mut self, new: ValueContents) -> bool {
        if new.ty() != self.id.ty {
            return false;
        }
        if self.is_set {
            self.checking_change = Some(self.contents.clone());
        }
        self.contents = new;
        self.is_set = true;
        true
    }

    /// Applies a report received from the device.
    pub fn update_from_report(&mut self, new: ValueContents) -> ValueUpdate {
        if new.ty() != self.id.ty {
            // Malformed report; leave the value untouched
            return ValueUpdate::Refreshed;
        }

        if let Some(shadow) = self.checking_change.take() {
            if shadow == new && self.contents != new {
                // The device echoed the pre-write state; keep the optimistic
                // local value and wait for the real confirmation.
                self.checking_change = Some(shadow);
                return ValueUpdate::Refreshed;
            }
        }

        let changed = !self.is_set || self.contents != new;
        self.contents = new;
        self.is_set = true;
        if changed {
            ValueUpdate::Changed
        } else {
            ValueUpdate::Refreshed
        }
    }
}

/// All values of one node, keyed by ValueId. Owned by the Node; deleted with
/// it.
#[derive(Debug, Default, Clone)]
pub struct ValueStore {
    values: BTreeMap<ValueId, Value>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value if its id is not present yet. Returns whether the value
    /// was added, so callers can emit ValueAdded exactly once.
    pub fn add(&mut self, value: Value) -> bool {
        use std::collections::btree_map::Entry;
        match self.values.entry(value.id()) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, id: &ValueId) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn get_mut(&mut self, id: &ValueId) -> Option<&mut Value> {
        self.values.get_mut(id)
    }

    pub fn remove(&mut self, id: &ValueId) -> Option<Value> {
        self.values.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.values.keys().copied()
    }

    /// Removes every value belonging to the given command class, returning
    /// their ids so ValueRemoved can be emitted.
    pub fn remove_class(&mut self, cc: CommandClassId) -> Vec<ValueId> {
        let ids: Vec<ValueId> = self
            .values
            .keys()
            .filter(|id| id.command_class_id == cc)
            .copied()
            .collect();
        for id in &ids {
            self.values.remove(id);
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_id(index: u8) -> ValueId {
        ValueId {
            home_id: HomeId(0x01020304),
            node_id: NodeId(7),
            genre: ValueGenre::User,
            command_class_id: CommandClassId::SWITCH_BINARY,
            instance: 1,
            index,
            ty: ValueType::Bool,
        }
    }

    #[test]
    fn first_report_changes() {
        let mut value = Value::new(test_id(0), "Switch", ValueContents::Bool(false));
        assert!(!value.is_set());
        assert_eq!(
            value.update_from_report(ValueContents::Bool(false)),
            ValueUpdate::Changed
        );
        assert!(value.is_set());
        assert_eq!(
            value.update_from_report(ValueContents::Bool(false)),
            ValueUpdate::Refreshed
        );
        assert_eq!(
            value.update_from_report(ValueContents::Bool(true)),
            ValueUpdate::Changed
        );
    }

    #[test]
    fn stale_echo_is_debounced() {
        let mut value = Value::new(test_id(0), "Switch", ValueContents::Bool(false));
        value.update_from_report(ValueContents::Bool(false));

        // The consumer flips the switch locally...
        assert!(value.set_local(ValueContents::Bool(true)));
        assert_eq!(value.contents(), &ValueContents::Bool(true));

        // ...a report still carrying the old state must not be a "change"
        assert_eq!(
            value.update_from_report(ValueContents::Bool(false)),
            ValueUpdate::Refreshed
        );
        assert_eq!(value.contents(), &ValueContents::Bool(true));

        // The real confirmation clears the shadow
        assert_eq!(
            value.update_from_report(ValueContents::Bool(true)),
            ValueUpdate::Refreshed
        );
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut value = Value::new(test_id(0), "Switch", ValueContents::Bool(false));
        assert!(!value.set_local(ValueContents::Byte(1)));
    }

    #[test]
    fn store_add_is_idempotent() {
        let mut store = ValueStore::new();
        assert!(store.add(Value::new(test_id(0), "Switch", ValueContents::Bool(false))));
        assert!(!store.add(Value::new(test_id(0), "Switch", ValueContents::Bool(true))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_class_returns_ids() {
        let mut store = ValueStore::new();
        store.add(Value::new(test_id(0), "Switch", ValueContents::Bool(false)));
        store.add(Value::new(test_id(1), "Other", ValueContents::Bool(false)));
        let removed = store.remove_class(CommandClassId::SWITCH_BINARY);
        assert_eq!(removed.len(), 2);
        assert!(store.is_empty());
    }
}
