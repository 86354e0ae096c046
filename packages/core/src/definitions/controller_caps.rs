/// Capability flags from the `GetSerialApiInitData` response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InitCaps(pub u8);

impl InitCaps {
    pub fn is_slave_api(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn has_timer_support(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn is_secondary(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn is_suc(&self) -> bool {
        self.0 & 0x08 != 0
    }
}

/// Capability flags from the `GetControllerCapabilities` response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControllerCaps(pub u8);

impl ControllerCaps {
    pub fn is_secondary(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn on_other_network(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn has_sis(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn is_real_primary(&self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn is_suc(&self) -> bool {
        self.0 & 0x10 != 0
    }
}
