pub use crate::definitions::*;
pub use crate::group::Group;
pub use crate::notification::Notification;
pub use crate::values::{
    Value, ValueContents, ValueGenre, ValueId, ValueListItem, ValueStore, ValueType, ValueUpdate,
};
