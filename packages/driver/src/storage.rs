use crate::error::{Error, Result};
use crate::node::Node;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use xmltree::{Element, XMLNode};
use zmesh_cc::prelude::{CommandClass, CC};
use zmesh_core::prelude::*;

/// Controller-level state persisted in the root element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverInfo {
    pub home_id: HomeId,
    pub controller_node_id: NodeId,
    pub library_version: String,
    pub init_caps: InitCaps,
    pub controller_caps: ControllerCaps,
    pub poll_interval_ms: u64,
    /// Unrecognized root attributes, written back on save
    pub extra: BTreeMap<String, String>,
}

/// A command class as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedClass {
    pub id: CommandClassId,
    pub version: u8,
    pub instances: u8,
    pub values: Vec<Value>,
    pub extra: BTreeMap<String, String>,
}

/// A node as read back from disk.
#[derive(Debug, Clone)]
pub struct SavedNode {
    pub id: NodeId,
    pub name: String,
    pub location: String,
    pub basic: u8,
    pub generic: u8,
    pub specific: u8,
    pub device_label: String,
    pub listening: bool,
    pub routing: bool,
    pub max_baud: u32,
    pub protocol_version: u8,
    pub security: u8,
    pub manufacturer_id: String,
    pub product_type: String,
    pub product_id: String,
    pub query_stage: QueryStage,
    pub classes: Vec<SavedClass>,
    pub groups: Vec<Group>,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SavedNetwork {
    pub info: DriverInfo,
    pub nodes: Vec<SavedNode>,
}

/// One XML document per controller, named by HomeId.
pub fn config_path(dir: &Path, home_id: HomeId) -> PathBuf {
    dir.join(format!("zmesh_{}.xml", home_id.as_file_stem()))
}

fn storage_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Storage(e.to_string())
}

fn set(attrs: &mut HashMap<String, String>, key: &str, value: impl ToString) {
    attrs.insert(key.to_string(), value.to_string());
}

/// Splits one known attribute out of the raw map.
fn take(attrs: &mut HashMap<String, String>, key: &str) -> Option<String> {
    attrs.remove(key)
}

fn take_parsed<T: std::str::FromStr>(attrs: &mut HashMap<String, String>, key: &str) -> Option<T> {
    take(attrs, key).and_then(|s| s.parse().ok())
}

fn take_bool(attrs: &mut HashMap<String, String>, key: &str) -> bool {
    take(attrs, key).map(|s| s == "true").unwrap_or(false)
}

fn remainder(attrs: HashMap<String, String>) -> BTreeMap<String, String> {
    attrs.into_iter().collect()
}

fn child_elements(element: &Element, name: &str) -> Vec<Element> {
    element
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Element(child) if child.name == name => Some(child.clone()),
            _ => None,
        })
        .collect()
}

// ---- values ----

fn render_contents(contents: &ValueContents) -> String {
    match contents {
        ValueContents::Bool(b) => b.to_string(),
        ValueContents::Byte(v) => v.to_string(),
        ValueContents::Short(v) => v.to_string(),
        ValueContents::Int(v) => v.to_string(),
        ValueContents::Decimal(s) => s.clone(),
        ValueContents::List { selection, .. } => selection.to_string(),
        ValueContents::String(s) => s.clone(),
        ValueContents::Button(b) => b.to_string(),
        ValueContents::Raw(bytes) => {
            bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
        }
    }
}

fn parse_contents(ty: ValueType, raw: &str, items: Vec<ValueListItem>) -> Option<ValueContents> {
    let contents = match ty {
        ValueType::Bool => ValueContents::Bool(raw == "true"),
        ValueType::Byte => ValueContents::Byte(raw.parse().ok()?),
        ValueType::Short => ValueContents::Short(raw.parse().ok()?),
        ValueType::Int => ValueContents::Int(raw.parse().ok()?),
        ValueType::Decimal => ValueContents::Decimal(raw.to_string()),
        ValueType::List => ValueContents::List {
            selection: raw.parse().ok()?,
            items,
        },
        ValueType::String => ValueContents::String(raw.to_string()),
        ValueType::Button => ValueContents::Button(raw == "true"),
        ValueType::Raw => {
            let bytes = (0..raw.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(raw.get(i..i + 2)?, 16).ok())
                .collect::<Option<Vec<u8>>>()?;
            ValueContents::Raw(bytes)
        }
    };
    Some(contents)
}

fn value_element(value: &Value) -> Element {
    let mut element = Element::new("Value");
    element.attributes = value.extra.clone().into_iter().collect();
    let attrs = &mut element.attributes;
    let id = value.id();
    set(attrs, "genre", id.genre.label());
    set(attrs, "instance", id.instance);
    set(attrs, "index", id.index);
    set(attrs, "type", id.ty.label());
    set(attrs, "label", &value.label);
    set(attrs, "units", &value.units);
    set(attrs, "read_only", value.read_only);
    set(attrs, "write_only", value.write_only);
    set(attrs, "poll_intensity", value.poll_intensity);
    set(attrs, "is_set", value.is_set());
    set(attrs, "value", render_contents(value.contents()));

    if let ValueContents::List { items, .. } = value.contents() {
        for item in items {
            let mut child = Element::new("Item");
            set(&mut child.attributes, "label", &item.label);
            set(&mut child.attributes, "value", item.value);
            element.children.push(XMLNode::Element(child));
        }
    }
    element
}

fn parse_value(
    element: &Element,
    home_id: HomeId,
    node_id: NodeId,
    cc: CommandClassId,
) -> Option<Value> {
    let mut attrs = element.attributes.clone();
    let genre = ValueGenre::from_label(&take(&mut attrs, "genre")?)?;
    let instance = take_parsed(&mut attrs, "instance")?;
    let index = take_parsed(&mut attrs, "index")?;
    let ty = ValueType::from_label(&take(&mut attrs, "type")?)?;
    let label = take(&mut attrs, "label").unwrap_or_default();
    let units = take(&mut attrs, "units").unwrap_or_default();
    let read_only = take_bool(&mut attrs, "read_only");
    let write_only = take_bool(&mut attrs, "write_only");
    let poll_intensity = take_parsed(&mut attrs, "poll_intensity").unwrap_or(0);
    let is_set = take_bool(&mut attrs, "is_set");
    let raw = take(&mut attrs, "value").unwrap_or_default();

    let items: Vec<ValueListItem> = child_elements(element, "Item")
        .iter()
        .filter_map(|item| {
            Some(ValueListItem {
                label: item.attributes.get("label")?.clone(),
                value: item.attributes.get("value")?.parse().ok()?,
            })
        })
        .collect();

    let contents = parse_contents(ty, &raw, items)?;
    let id = ValueId {
        home_id,
        node_id,
        genre,
        command_class_id: cc,
        instance,
        index,
        ty,
    };
    let mut value = Value::new(id, label, contents.clone());
    value.units = units;
    value.read_only = read_only;
    value.write_only = write_only;
    value.poll_intensity = poll_intensity;
    value.extra = remainder(attrs);
    if is_set {
        value.update_from_report(contents);
    }
    Some(value)
}

// ---- groups ----

fn group_element(group: &Group) -> Element {
    let mut element = Element::new("Group");
    element.attributes = group.extra.clone().into_iter().collect();
    let attrs = &mut element.attributes;
    set(attrs, "index", group.index);
    set(attrs, "label", &group.label);
    set(attrs, "max_associations", group.max_associations);
    let nodes = group
        .associations()
        .iter()
        .map(|n| n.0.to_string())
        .collect::<Vec<_>>()
        .join(",");
    set(attrs, "nodes", nodes);
    element
}

fn parse_group(element: &Element) -> Option<Group> {
    let mut attrs = element.attributes.clone();
    let index = take_parsed(&mut attrs, "index")?;
    let max_associations = take_parsed(&mut attrs, "max_associations").unwrap_or(0);
    let mut group = Group::new(index, max_associations);
    if let Some(label) = take(&mut attrs, "label") {
        group.label = label;
    }
    if let Some(nodes) = take(&mut attrs, "nodes") {
        let members = nodes
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .map(NodeId)
            .collect();
        group.set_associations(members);
    }
    group.extra = remainder(attrs);
    Some(group)
}

// ---- nodes ----

fn node_element(node: &Node) -> Element {
    let mut element = Element::new("Node");
    element.attributes = node.extra.clone().into_iter().collect();
    let attrs = &mut element.attributes;
    set(attrs, "id", node.id.0);
    set(attrs, "name", &node.name);
    set(attrs, "location", &node.location);
    set(attrs, "basic", node.basic);
    set(attrs, "generic", node.generic);
    set(attrs, "specific", node.specific);
    set(attrs, "type", &node.device_label);
    set(attrs, "listening", node.listening);
    set(attrs, "routing", node.routing);
    set(attrs, "max_baud", node.max_baud);
    set(attrs, "version", node.protocol_version);
    set(attrs, "security", node.security);
    set(attrs, "manufacturer_id", &node.manufacturer_id);
    set(attrs, "product_type", &node.product_type);
    set(attrs, "product_id", &node.product_id);
    set(attrs, "query_stage", node.query_stage().label());

    let mut classes = Element::new("CommandClasses");
    for (id, cc) in &node.classes {
        let mut class_element = Element::new("CommandClass");
        class_element.attributes = cc.state().extra.clone().into_iter().collect();
        let class_attrs = &mut class_element.attributes;
        set(class_attrs, "id", id.0);
        if let Some(name) = id.name() {
            set(class_attrs, "name", name);
        }
        set(class_attrs, "version", cc.version());
        set(class_attrs, "instances", cc.instance_count());

        for value in node.values.iter() {
            if value.id().command_class_id == *id {
                class_element
                    .children
                    .push(XMLNode::Element(value_element(value)));
            }
        }
        classes.children.push(XMLNode::Element(class_element));
    }
    element.children.push(XMLNode::Element(classes));

    let mut associations = Element::new("Associations");
    for group in node.groups.values() {
        associations
            .children
            .push(XMLNode::Element(group_element(group)));
    }
    element.children.push(XMLNode::Element(associations));

    element
}

fn parse_node(element: &Element, home_id: HomeId) -> Option<SavedNode> {
    let mut attrs = element.attributes.clone();
    let id = NodeId(take_parsed(&mut attrs, "id")?);

    let query_stage = take(&mut attrs, "query_stage")
        .and_then(|label| QueryStage::from_label(&label))
        .unwrap_or(QueryStage::FIRST);

    let mut classes = Vec::new();
    for classes_element in child_elements(element, "CommandClasses") {
        for class_element in child_elements(&classes_element, "CommandClass") {
            let mut class_attrs = class_element.attributes.clone();
            let Some(cc_id) = take_parsed::<u8>(&mut class_attrs, "id").map(CommandClassId) else {
                continue;
            };
            take(&mut class_attrs, "name");
            let version = take_parsed(&mut class_attrs, "version").unwrap_or(1);
            let instances = take_parsed(&mut class_attrs, "instances").unwrap_or(1);
            let values = child_elements(&class_element, "Value")
                .iter()
                .filter_map(|v| parse_value(v, home_id, id, cc_id))
                .collect();
            classes.push(SavedClass {
                id: cc_id,
                version,
                instances,
                values,
                extra: remainder(class_attrs),
            });
        }
    }

    let mut groups = Vec::new();
    for associations in child_elements(element, "Associations") {
        for group_element in child_elements(&associations, "Group") {
            if let Some(group) = parse_group(&group_element) {
                groups.push(group);
            }
        }
    }

    Some(SavedNode {
        id,
        name: take(&mut attrs, "name").unwrap_or_default(),
        location: take(&mut attrs, "location").unwrap_or_default(),
        basic: take_parsed(&mut attrs, "basic").unwrap_or(0),
        generic: take_parsed(&mut attrs, "generic").unwrap_or(0),
        specific: take_parsed(&mut attrs, "specific").unwrap_or(0),
        device_label: take(&mut attrs, "type").unwrap_or_default(),
        listening: take_bool(&mut attrs, "listening"),
        routing: take_bool(&mut attrs, "routing"),
        max_baud: take_parsed(&mut attrs, "max_baud").unwrap_or(9600),
        protocol_version: take_parsed(&mut attrs, "version").unwrap_or(0),
        security: take_parsed(&mut attrs, "security").unwrap_or(0),
        manufacturer_id: take(&mut attrs, "manufacturer_id").unwrap_or_default(),
        product_type: take(&mut attrs, "product_type").unwrap_or_default(),
        product_id: take(&mut attrs, "product_id").unwrap_or_default(),
        query_stage,
        classes,
        groups,
        extra: remainder(attrs),
    })
}

// ---- documents ----

/// Writes the network to `dir`, one document per HomeId. All attributes
/// written here are parsed by [`load_network`], and attributes this build
/// does not recognize are carried through untouched.
pub fn save_network(
    dir: &Path,
    info: &DriverInfo,
    nodes: &BTreeMap<NodeId, Node>,
) -> Result<PathBuf> {
    let mut root = Element::new("Driver");
    root.attributes = info.extra.clone().into_iter().collect();
    let attrs = &mut root.attributes;
    set(attrs, "home_id", format!("{}", info.home_id));
    set(attrs, "node_id", info.controller_node_id.0);
    set(attrs, "library_version", &info.library_version);
    set(attrs, "api_capabilities", info.init_caps.0);
    set(attrs, "controller_capabilities", info.controller_caps.0);
    set(attrs, "poll_interval", info.poll_interval_ms);

    for node in nodes.values() {
        root.children.push(XMLNode::Element(node_element(node)));
    }

    std::fs::create_dir_all(dir).map_err(storage_err)?;
    let path = config_path(dir, info.home_id);
    let file = File::create(&path).map_err(storage_err)?;
    root.write(file).map_err(storage_err)?;
    Ok(path)
}

/// Reads the document for `home_id`, or None when none has been written
/// yet.
pub fn load_network(dir: &Path, home_id: HomeId) -> Result<Option<SavedNetwork>> {
    let path = config_path(dir, home_id);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(storage_err(e)),
    };
    let root = Element::parse(file).map_err(storage_err)?;

    let mut attrs = root.attributes.clone();
    let parsed_home_id = take(&mut attrs, "home_id")
        .and_then(|raw| u32::from_str_radix(raw.trim_start_matches("0x"), 16).ok())
        .map(HomeId)
        .unwrap_or(home_id);

    let info = DriverInfo {
        home_id: parsed_home_id,
        controller_node_id: NodeId(take_parsed(&mut attrs, "node_id").unwrap_or(1)),
        library_version: take(&mut attrs, "library_version").unwrap_or_default(),
        init_caps: InitCaps(take_parsed(&mut attrs, "api_capabilities").unwrap_or(0)),
        controller_caps: ControllerCaps(
            take_parsed(&mut attrs, "controller_capabilities").unwrap_or(0),
        ),
        poll_interval_ms: take_parsed(&mut attrs, "poll_interval").unwrap_or(30_000),
        extra: remainder(attrs),
    };

    let nodes = child_elements(&root, "Node")
        .iter()
        .filter_map(|n| parse_node(n, info.home_id))
        .collect();

    Ok(Some(SavedNetwork { info, nodes }))
}

/// Rebuilds a runtime node from its saved form. Discovery reconciles with
/// these by ValueID equality: values that already exist are left alone,
/// anything else the device reports gets created as usual.
pub fn restore_node(saved: &SavedNode, home_id: HomeId) -> Node {
    let mut node = Node::new(home_id, saved.id);
    node.name = saved.name.clone();
    node.location = saved.location.clone();
    node.basic = saved.basic;
    node.generic = saved.generic;
    node.specific = saved.specific;
    node.device_label = saved.device_label.clone();
    node.listening = saved.listening;
    node.routing = saved.routing;
    node.max_baud = saved.max_baud;
    node.protocol_version = saved.protocol_version;
    node.security = saved.security;
    node.manufacturer_id = saved.manufacturer_id.clone();
    node.product_type = saved.product_type.clone();
    node.product_id = saved.product_id.clone();
    node.extra = saved.extra.clone();
    node.awake = saved.listening;

    if saved.generic != 0 {
        if let Some(info) = lookup_device_class(saved.generic, saved.specific) {
            node.basic_mapping = info.basic_mapping;
        }
        node.protocol_info_received = true;
    }

    for class in &saved.classes {
        if let Some(mut cc) = CC::with_id(class.id) {
            cc.set_version(class.version);
            cc.set_instance_count(class.instances);
            cc.state_mut().extra = class.extra.clone();
            node.classes.insert(class.id, cc);
        }
        for value in &class.values {
            node.values.add(value.clone());
        }
    }
    if !node.classes.is_empty() {
        node.node_info_received = true;
    }

    for group in &saved.groups {
        node.groups.insert(group.index, group.clone());
    }

    // Static knowledge survives restarts; current values are re-read
    let restored_stage = if saved.query_stage >= QueryStage::Dynamic {
        QueryStage::Dynamic
    } else {
        saved.query_stage
    };
    node.restore_stage(restored_stage);
    node
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::Node;
    use zmesh_cc::prelude::CcOutbox;

    fn sample_network() -> (DriverInfo, BTreeMap<NodeId, Node>) {
        let home_id = HomeId(0x01020304);
        let info = DriverInfo {
            home_id,
            controller_node_id: NodeId(1),
            library_version: "Static Controller".into(),
            init_caps: InitCaps(0x08),
            controller_caps: ControllerCaps(0x18),
            poll_interval_ms: 500,
            extra: BTreeMap::new(),
        };

        let mut node = Node::new(home_id, NodeId(7));
        let mut out = CcOutbox::default();
        node.apply_protocol_info(NodeId(1), &[0xd2, 0, 0, 0x04, 0x10, 0x01], &mut out);
        node.name = "Lamp".into();
        node.location = "Hall".into();
        node.manufacturer_id = "0086".into();
        node.groups.insert(1, {
            let mut group = Group::new(1, 5);
            group.add(NodeId(1));
            group
        });

        let mut nodes = BTreeMap::new();
        nodes.insert(node.id, node);
        (info, nodes)
    }

    #[test]
    fn save_load_round_trip() {
        let dir = std::env::temp_dir().join("zmesh-storage-test-roundtrip");
        let _ = std::fs::remove_dir_all(&dir);
        let (info, nodes) = sample_network();

        save_network(&dir, &info, &nodes).unwrap();
        let loaded = load_network(&dir, info.home_id).unwrap().unwrap();

        assert_eq!(loaded.info, info);
        assert_eq!(loaded.nodes.len(), 1);
        let saved = &loaded.nodes[0];
        assert_eq!(saved.id, NodeId(7));
        assert_eq!(saved.name, "Lamp");
        assert_eq!(saved.device_label, "Binary Power Switch");
        assert!(saved.listening);
        assert_eq!(saved.classes.len(), 2);
        assert_eq!(saved.groups.len(), 1);
        assert_eq!(saved.groups[0].associations(), &[NodeId(1)]);

        // Saving what was loaded produces the same document again
        let restored: BTreeMap<NodeId, Node> = loaded
            .nodes
            .iter()
            .map(|n| (n.id, restore_node(n, info.home_id)))
            .collect();
        save_network(&dir, &loaded.info, &restored).unwrap();
        let reloaded = load_network(&dir, info.home_id).unwrap().unwrap();
        assert_eq!(reloaded.info, info);
        assert_eq!(reloaded.nodes[0].name, "Lamp");
        assert_eq!(reloaded.nodes[0].classes.len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_attributes_survive() {
        let dir = std::env::temp_dir().join("zmesh-storage-test-unknown");
        let _ = std::fs::remove_dir_all(&dir);
        let (info, nodes) = sample_network();
        let path = save_network(&dir, &info, &nodes).unwrap();

        // A future version wrote an attribute this build does not know
        let mut text = std::fs::read_to_string(&path).unwrap();
        text = text.replacen("<Node ", "<Node future_flag=\"7\" ", 1);
        std::fs::write(&path, text).unwrap();

        let loaded = load_network(&dir, info.home_id).unwrap().unwrap();
        assert_eq!(
            loaded.nodes[0].extra.get("future_flag").map(String::as_str),
            Some("7")
        );

        // And it is written back on the next save
        let restored: BTreeMap<NodeId, Node> = loaded
            .nodes
            .iter()
            .map(|n| (n.id, restore_node(n, info.home_id)))
            .collect();
        save_network(&dir, &loaded.info, &restored).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("future_flag=\"7\""));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn restored_stage_never_exceeds_dynamic() {
        let (info, mut nodes) = sample_network();
        let node = nodes.get_mut(&NodeId(7)).unwrap();
        while node.query_stage() != QueryStage::Complete {
            node.advance_stage();
        }

        let dir = std::env::temp_dir().join("zmesh-storage-test-stage");
        let _ = std::fs::remove_dir_all(&dir);
        save_network(&dir, &info, &nodes).unwrap();
        let loaded = load_network(&dir, info.home_id).unwrap().unwrap();
        let restored = restore_node(&loaded.nodes[0], info.home_id);
        assert_eq!(restored.query_stage(), QueryStage::Dynamic);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
