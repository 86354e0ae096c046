/// Cursor through the interrogation pipeline of a node.
///
/// Stages are strictly ordered; a node's stage only ever advances, except
/// through an explicit refresh which resets it to the first stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryStage {
    /// Listening/routing/baud/version/security plus the device class bytes
    ProtocolInfo,
    /// The supported command class list from the node itself
    NodeInfo,
    /// Manufacturer and product ids
    ManufacturerSpecific,
    /// Per-command-class protocol versions
    Versions,
    /// Per-command-class instance counts
    Instances,
    /// One-shot static data (supported modes, scale tables, metadata)
    Static,
    /// Current values
    Dynamic,
    /// Per-session volatile state (wake-up interval re-binding)
    Session,
    /// Association groups
    Associations,
    /// Node name and location
    Naming,
    /// Interrogation finished
    Complete,
}

impl QueryStage {
    pub const FIRST: QueryStage = QueryStage::ProtocolInfo;

    pub fn next(&self) -> QueryStage {
        use QueryStage::*;
        match self {
            ProtocolInfo => NodeInfo,
            NodeInfo => ManufacturerSpecific,
            ManufacturerSpecific => Versions,
            Versions => Instances,
            Instances => Static,
            Static => Dynamic,
            Dynamic => Session,
            Session => Associations,
            Associations => Naming,
            Naming => Complete,
            Complete => Complete,
        }
    }

    pub fn label(&self) -> &'static str {
        use QueryStage::*;
        match self {
            ProtocolInfo => "ProtocolInfo",
            NodeInfo => "NodeInfo",
            ManufacturerSpecific => "ManufacturerSpecific",
            Versions => "Versions",
            Instances => "Instances",
            Static => "Static",
            Dynamic => "Dynamic",
            Session => "Session",
            Associations => "Associations",
            Naming => "Naming",
            Complete => "Complete",
        }
    }

    pub fn from_label(label: &str) -> Option<QueryStage> {
        use QueryStage::*;
        let stage = match label {
            "ProtocolInfo" => ProtocolInfo,
            "NodeInfo" => NodeInfo,
            "ManufacturerSpecific" => ManufacturerSpecific,
            "Versions" => Versions,
            "Instances" => Instances,
            "Static" => Static,
            "Dynamic" => Dynamic,
            "Session" => Session,
            "Associations" => Associations,
            "Naming" => Naming,
            "Complete" => Complete,
            _ => return None,
        };
        Some(stage)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        let mut stage = QueryStage::FIRST;
        let mut seen = vec![stage];
        while stage != QueryStage::Complete {
            let next = stage.next();
            assert!(next > stage);
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 11);
    }

    #[test]
    fn labels_round_trip() {
        let mut stage = QueryStage::FIRST;
        loop {
            assert_eq!(QueryStage::from_label(stage.label()), Some(stage));
            if stage == QueryStage::Complete {
                break;
            }
            stage = stage.next();
        }
    }
}
