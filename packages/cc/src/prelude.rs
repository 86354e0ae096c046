pub use crate::classes::*;
pub use crate::commandclass::{
    cc_get_msg, cc_msg, request_flags, CcContext, CcError, CcEvent, CcOutbox, CcResult, CcState,
    CommandClass, CC,
};
