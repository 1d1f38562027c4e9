//! In-process engine.
//!
//! Implements the natives in [`crate::natives::ALL`] against plain Rust
//! collections so the bridge can run without an engine attached. Entity and
//! player behavior is deliberately shallow: values written are values read.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::codec::{msgpack, CallFrame, Value, Vector3};
use crate::error::{BridgeError, InvocationError};
use crate::handle::Handle;
use crate::invoker::{HostNotification, NativeHost};
use crate::natives::NativeDef;

/// Status reported for natives called on an entity that does not exist.
pub const STATUS_NO_SUCH_ENTITY: i32 = 1;

#[derive(Debug, Clone, PartialEq)]
enum KvpValue {
    Int(i32),
    Float(f32),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Ped,
    Vehicle,
    Object,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub kind: EntityKind,
    pub coords: Vector3,
    pub heading: f32,
    pub health: i32,
    pub routing_bucket: i32,
    pub armour: i32,
    /// Vehicle the ped is sitting in.
    pub vehicle: Handle,
    pub last_vehicle: Handle,
    pub colours: (i32, i32),
    pub lights: (bool, bool),
    pub plate: String,
}

impl EntityState {
    fn new(kind: EntityKind, coords: Vector3) -> Self {
        Self {
            kind,
            coords,
            heading: 0.0,
            health: match kind {
                EntityKind::Ped => 200,
                EntityKind::Vehicle => 1000,
                EntityKind::Object => 0,
            },
            routing_bucket: 0,
            armour: 0,
            vehicle: Handle::NONE,
            last_vehicle: Handle::NONE,
            colours: (0, 0),
            lights: (false, false),
            plate: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub name: String,
    pub ped: Handle,
    pub routing_bucket: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvarEntry {
    pub value: String,
    pub replicated: bool,
    pub server_info: bool,
}

/// A `TRIGGER_CLIENT_EVENT_INTERNAL` call, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SentClientEvent {
    pub name: String,
    pub target: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub ped: Handle,
    pub native: &'static str,
    pub detail: String,
}

/// Sequential argument reader over a call frame.
struct Args<'f> {
    frame: &'f CallFrame,
    slot: usize,
}

impl<'f> Args<'f> {
    fn new(frame: &'f CallFrame) -> Self {
        Self { frame, slot: 0 }
    }

    fn int(&mut self) -> Result<i32, BridgeError> {
        let v = self.frame.arg_int(self.slot)?;
        self.slot += 1;
        Ok(v)
    }

    fn handle(&mut self) -> Result<Handle, BridgeError> {
        self.int().map(Handle)
    }

    fn float(&mut self) -> Result<f32, BridgeError> {
        let v = self.frame.arg_float(self.slot)?;
        self.slot += 1;
        Ok(v)
    }

    fn bool(&mut self) -> Result<bool, BridgeError> {
        let v = self.frame.arg_bool(self.slot)?;
        self.slot += 1;
        Ok(v)
    }

    fn vector3(&mut self) -> Result<Vector3, BridgeError> {
        let v = self.frame.arg_vector3(self.slot)?;
        self.slot += 3;
        Ok(v)
    }

    fn str(&mut self) -> Result<String, BridgeError> {
        let v = self.frame.arg_str(self.slot)?.to_owned();
        self.slot += 1;
        Ok(v)
    }

    /// Reads the payload and its length companion.
    fn bytes(&mut self) -> Result<Vec<u8>, BridgeError> {
        let v = self.frame.arg_bytes(self.slot)?.to_vec();
        let len = self.frame.arg_word(self.slot + 1)? as usize;
        if len != v.len() {
            return Err(crate::error::DecodeError::mismatch(
                format!("length companion {}", v.len()),
                len,
            )
            .into());
        }
        self.slot += 2;
        Ok(v)
    }
}

/// The in-memory engine.
#[derive(Debug, Default)]
pub struct MemoryHost {
    resource_name: String,
    resources: Vec<(String, String)>,
    kvp: HashMap<String, KvpValue>,
    convars: HashMap<String, ConvarEntry>,
    entities: BTreeMap<i32, EntityState>,
    players: BTreeMap<i32, PlayerState>,
    next_entity: i32,
    next_player: i32,
    state_bags: HashMap<(String, String), Vec<u8>>,
    sent_client_events: Vec<SentClientEvent>,
    tasks: Vec<TaskRecord>,
    dropped_players: Vec<(Handle, String)>,
    http_requests: Vec<Vec<u8>>,
    next_http_token: i32,
    notifications: VecDeque<HostNotification>,
    calls: usize,
}

impl MemoryHost {
    pub fn new(resource_name: impl Into<String>) -> Self {
        let resource_name = resource_name.into();
        Self {
            resources: vec![(resource_name.clone(), "started".to_string())],
            resource_name,
            next_entity: 1,
            next_player: 1,
            next_http_token: 1,
            ..Default::default()
        }
    }

    /// Seed convars without raising change notifications.
    pub fn with_convars<K, V>(mut self, convars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in convars {
            self.convars.insert(
                name.into(),
                ConvarEntry {
                    value: value.into(),
                    replicated: false,
                    server_info: false,
                },
            );
        }
        self
    }

    pub fn add_resource(&mut self, name: impl Into<String>, state: impl Into<String>) {
        self.resources.push((name.into(), state.into()));
    }

    fn spawn(&mut self, kind: EntityKind, coords: Vector3) -> Handle {
        let handle = Handle(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(handle.raw(), EntityState::new(kind, coords));
        handle
    }

    pub fn spawn_ped(&mut self, coords: Vector3) -> Handle {
        self.spawn(EntityKind::Ped, coords)
    }

    pub fn spawn_vehicle(&mut self, coords: Vector3) -> Handle {
        self.spawn(EntityKind::Vehicle, coords)
    }

    pub fn spawn_object(&mut self, coords: Vector3) -> Handle {
        self.spawn(EntityKind::Object, coords)
    }

    /// Connect a player with a freshly spawned ped. Returns the server id.
    pub fn add_player(&mut self, name: impl Into<String>) -> Handle {
        let ped = self.spawn_ped(Vector3::default());
        let id = Handle(self.next_player);
        self.next_player += 1;
        self.players.insert(
            id.raw(),
            PlayerState {
                name: name.into(),
                ped,
                routing_bucket: 0,
            },
        );
        id
    }

    /// Queue a client event as if `source` had sent it.
    pub fn queue_net_event(&mut self, name: impl Into<String>, source: Handle, args: &[Value]) {
        self.notifications.push_back(HostNotification::NetEvent {
            name: name.into(),
            source,
            payload: msgpack::pack(args),
        });
    }

    /// Queue a state-bag change as if another peer had written it.
    pub fn queue_state_bag_change(
        &mut self,
        bag: impl Into<String>,
        key: impl Into<String>,
        value: &Value,
        replicated: bool,
    ) {
        self.notifications.push_back(HostNotification::StateBagChanged {
            bag: bag.into(),
            key: key.into(),
            payload: msgpack::pack_one(value),
            replicated,
        });
    }

    /// Change a convar from the console side.
    pub fn queue_convar_change(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.write_convar(&name, value.into(), false, false);
    }

    fn write_convar(&mut self, name: &str, value: String, replicated: bool, server_info: bool) {
        let entry = self
            .convars
            .entry(name.to_string())
            .or_insert_with(|| ConvarEntry {
                value: String::new(),
                replicated: false,
                server_info: false,
            });
        entry.value = value;
        entry.replicated |= replicated;
        entry.server_info |= server_info;
        self.notifications.push_back(HostNotification::ConvarChanged {
            name: name.to_string(),
        });
    }

    pub fn kvp_int(&self, key: &str) -> Option<i32> {
        match self.kvp.get(key) {
            Some(KvpValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn convar(&self, name: &str) -> Option<&ConvarEntry> {
        self.convars.get(name)
    }

    pub fn entity(&self, handle: Handle) -> Option<&EntityState> {
        self.entities.get(&handle.raw())
    }

    pub fn player(&self, id: Handle) -> Option<&PlayerState> {
        self.players.get(&id.raw())
    }

    pub fn state_bag_value(&self, bag: &str, key: &str) -> Option<Value> {
        self.state_bags
            .get(&(bag.to_string(), key.to_string()))
            .and_then(|bytes| msgpack::unpack_one(bytes).ok())
    }

    pub fn sent_client_events(&self) -> &[SentClientEvent] {
        &self.sent_client_events
    }

    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn dropped_players(&self) -> &[(Handle, String)] {
        &self.dropped_players
    }

    pub fn http_requests(&self) -> &[Vec<u8>] {
        &self.http_requests
    }

    /// Natives executed so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn entity_mut(&mut self, def: &NativeDef, handle: Handle) -> Result<&mut EntityState, BridgeError> {
        self.entities.get_mut(&handle.raw()).ok_or_else(|| {
            tracing::debug!("[memory] {} on missing entity {handle}", def.name);
            InvocationError::Engine {
                native: def.name,
                status: STATUS_NO_SUCH_ENTITY,
            }
            .into()
        })
    }

    fn player_mut(&mut self, def: &NativeDef, id: Handle) -> Result<&mut PlayerState, BridgeError> {
        self.players.get_mut(&id.raw()).ok_or_else(|| {
            InvocationError::Engine {
                native: def.name,
                status: STATUS_NO_SUCH_ENTITY,
            }
            .into()
        })
    }

    fn bag_target(&self, bag: &str, prefix: &str) -> Handle {
        bag.strip_prefix(prefix)
            .and_then(|rest| rest.parse::<i32>().ok())
            .map(Handle)
            .unwrap_or(Handle::NONE)
    }
}

impl NativeHost for MemoryHost {
    fn call(&mut self, def: &NativeDef, frame: &mut CallFrame) -> Result<(), BridgeError> {
        self.calls += 1;
        tracing::trace!("[memory] {}", def.name);
        let mut a = Args::new(frame);

        match def.name {
            // -- kvp ----------------------------------------------------------
            "SET_RESOURCE_KVP_INT" => {
                let key = a.str()?;
                let value = a.int()?;
                self.kvp.insert(key, KvpValue::Int(value));
            }
            "SET_RESOURCE_KVP_FLOAT" => {
                let key = a.str()?;
                let value = a.float()?;
                self.kvp.insert(key, KvpValue::Float(value));
            }
            "SET_RESOURCE_KVP" => {
                let key = a.str()?;
                let value = a.str()?;
                self.kvp.insert(key, KvpValue::Str(value));
            }
            "GET_RESOURCE_KVP_INT" => {
                let key = a.str()?;
                let value = self.kvp_int(&key).unwrap_or(0);
                frame.push_result_int(value)?;
            }
            "GET_RESOURCE_KVP_FLOAT" => {
                let key = a.str()?;
                let value = match self.kvp.get(&key) {
                    Some(KvpValue::Float(v)) => *v,
                    _ => 0.0,
                };
                frame.push_result_float(value)?;
            }
            "GET_RESOURCE_KVP_STRING" => {
                let key = a.str()?;
                match self.kvp.get(&key) {
                    Some(KvpValue::Str(v)) => frame.push_result_str(v)?,
                    _ => frame.push_result_null_str()?,
                }
            }
            "DELETE_RESOURCE_KVP" => {
                let key = a.str()?;
                self.kvp.remove(&key);
            }

            // -- convar -------------------------------------------------------
            "GET_CONVAR" => {
                let name = a.str()?;
                let default = a.str()?;
                let value = self.convars.get(&name).map_or(default, |c| c.value.clone());
                frame.push_result_str(&value)?;
            }
            "GET_CONVAR_INT" => {
                let name = a.str()?;
                let default = a.int()?;
                let value = self
                    .convars
                    .get(&name)
                    .and_then(|c| c.value.trim().parse().ok())
                    .unwrap_or(default);
                frame.push_result_int(value)?;
            }
            "GET_CONVAR_FLOAT" => {
                let name = a.str()?;
                let default = a.float()?;
                let value = self
                    .convars
                    .get(&name)
                    .and_then(|c| c.value.trim().parse().ok())
                    .unwrap_or(default);
                frame.push_result_float(value)?;
            }
            "GET_CONVAR_BOOL" => {
                let name = a.str()?;
                let default = a.bool()?;
                let value = match self.convars.get(&name).map(|c| c.value.trim().to_ascii_lowercase()) {
                    Some(v) if v == "true" || v == "1" => true,
                    Some(v) if v == "false" || v == "0" => false,
                    _ => default,
                };
                frame.push_result_bool(value)?;
            }
            "SET_CONVAR" | "SET_CONVAR_REPLICATED" | "SET_CONVAR_SERVER_INFO" => {
                let name = a.str()?;
                let value = a.str()?;
                let replicated = def.name == "SET_CONVAR_REPLICATED";
                let server_info = def.name == "SET_CONVAR_SERVER_INFO";
                self.write_convar(&name, value, replicated, server_info);
            }

            // -- resource -----------------------------------------------------
            "GET_CURRENT_RESOURCE_NAME" => {
                frame.push_result_str(&self.resource_name)?;
            }
            "GET_RESOURCE_STATE" => {
                let name = a.str()?;
                let state = self
                    .resources
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map_or("missing", |(_, s)| s.as_str());
                frame.push_result_str(state)?;
            }
            "GET_NUM_RESOURCES" => {
                frame.push_result_int(self.resources.len() as i32)?;
            }
            "GET_RESOURCE_BY_FIND_INDEX" => {
                let index = a.int()?;
                match usize::try_from(index).ok().and_then(|i| self.resources.get(i)) {
                    Some((name, _)) => frame.push_result_str(name)?,
                    None => frame.push_result_null_str()?,
                }
            }

            // -- entity -------------------------------------------------------
            "DOES_ENTITY_EXIST" => {
                let entity = a.handle()?;
                frame.push_result_bool(self.entities.contains_key(&entity.raw()))?;
            }
            "GET_ENTITY_COORDS" => {
                let entity = a.handle()?;
                let coords = self.entity_mut(def, entity)?.coords;
                frame.push_result_vector3(coords)?;
            }
            "SET_ENTITY_COORDS" => {
                let entity = a.handle()?;
                let pos = a.vector3()?;
                // axis flags and clear_area have no meaning here
                for _ in 0..4 {
                    a.bool()?;
                }
                self.entity_mut(def, entity)?.coords = pos;
            }
            "GET_ENTITY_HEADING" => {
                let entity = a.handle()?;
                let heading = self.entity_mut(def, entity)?.heading;
                frame.push_result_float(heading)?;
            }
            "SET_ENTITY_HEADING" => {
                let entity = a.handle()?;
                let heading = a.float()?;
                self.entity_mut(def, entity)?.heading = heading.rem_euclid(360.0);
            }
            "GET_ENTITY_HEALTH" => {
                let entity = a.handle()?;
                let health = self.entity_mut(def, entity)?.health;
                frame.push_result_int(health)?;
            }
            "GET_ENTITY_ROUTING_BUCKET" => {
                let entity = a.handle()?;
                let bucket = self.entity_mut(def, entity)?.routing_bucket;
                frame.push_result_int(bucket)?;
            }
            "SET_ENTITY_ROUTING_BUCKET" => {
                let entity = a.handle()?;
                let bucket = a.int()?;
                self.entity_mut(def, entity)?.routing_bucket = bucket;
            }
            "DELETE_ENTITY" => {
                let entity = a.handle()?;
                self.entities.remove(&entity.raw());
            }

            // -- player -------------------------------------------------------
            "GET_NUM_PLAYER_INDICES" => {
                frame.push_result_int(self.players.len() as i32)?;
            }
            "GET_PLAYER_FROM_INDEX" => {
                let index = a.int()?;
                match usize::try_from(index).ok().and_then(|i| self.players.keys().nth(i)) {
                    Some(id) => frame.push_result_str(&id.to_string())?,
                    None => frame.push_result_null_str()?,
                }
            }
            "GET_PLAYER_PED" => {
                let player = a.handle()?;
                let ped = self.player(player).map_or(Handle::NONE, |p| p.ped);
                frame.push_result_int(ped.raw())?;
            }
            "GET_PLAYER_NAME" => {
                let player = a.handle()?;
                match self.player(player) {
                    Some(p) => frame.push_result_str(&p.name)?,
                    None => frame.push_result_null_str()?,
                }
            }
            "GET_PLAYER_ROUTING_BUCKET" => {
                let player = a.handle()?;
                let bucket = self.player_mut(def, player)?.routing_bucket;
                frame.push_result_int(bucket)?;
            }
            "SET_PLAYER_ROUTING_BUCKET" => {
                let player = a.handle()?;
                let bucket = a.int()?;
                let state = self.player_mut(def, player)?;
                state.routing_bucket = bucket;
                let ped = state.ped;
                if let Some(ped) = self.entities.get_mut(&ped.raw()) {
                    ped.routing_bucket = bucket;
                }
            }
            "DROP_PLAYER" => {
                let player = a.handle()?;
                let reason = a.str()?;
                if let Some(state) = self.players.remove(&player.raw()) {
                    self.entities.remove(&state.ped.raw());
                    tracing::debug!("[memory] dropped player {player} ({}): {reason}", state.name);
                    self.dropped_players.push((player, reason));
                }
            }

            // -- ped ----------------------------------------------------------
            "GET_PED_ARMOUR" => {
                let ped = a.handle()?;
                let armour = self.entity_mut(def, ped)?.armour;
                frame.push_result_int(armour)?;
            }
            "SET_PED_ARMOUR" => {
                let ped = a.handle()?;
                let amount = a.int()?;
                self.entity_mut(def, ped)?.armour = amount.clamp(0, 100);
            }
            "GET_VEHICLE_PED_IS_IN" => {
                let ped = a.handle()?;
                let last = a.bool()?;
                let state = self.entity_mut(def, ped)?;
                let vehicle = if last { state.last_vehicle } else { state.vehicle };
                frame.push_result_int(vehicle.raw())?;
            }

            // -- vehicle ------------------------------------------------------
            "GET_VEHICLE_COLOURS" => {
                let vehicle = a.handle()?;
                let (primary, secondary) = self.entity_mut(def, vehicle)?.colours;
                frame.push_result_int(primary)?;
                frame.push_result_int(secondary)?;
            }
            "SET_VEHICLE_COLOURS" => {
                let vehicle = a.handle()?;
                let primary = a.int()?;
                let secondary = a.int()?;
                self.entity_mut(def, vehicle)?.colours = (primary, secondary);
            }
            "GET_VEHICLE_LIGHTS_STATE" => {
                let vehicle = a.handle()?;
                let (on, high) = self.entity_mut(def, vehicle)?.lights;
                frame.push_result_bool(true)?;
                frame.push_result_bool(on)?;
                frame.push_result_bool(high)?;
            }
            "GET_VEHICLE_NUMBER_PLATE_TEXT" => {
                let vehicle = a.handle()?;
                match self.entities.get(&vehicle.raw()) {
                    Some(state) if state.kind == EntityKind::Vehicle => {
                        frame.push_result_str(&state.plate)?
                    }
                    _ => frame.push_result_null_str()?,
                }
            }
            "SET_VEHICLE_NUMBER_PLATE_TEXT" => {
                let vehicle = a.handle()?;
                let text = a.str()?;
                // plates hold eight characters
                self.entity_mut(def, vehicle)?.plate = text.chars().take(8).collect();
            }

            // -- task ---------------------------------------------------------
            "TASK_GO_STRAIGHT_TO_COORD" => {
                let ped = a.handle()?;
                let target = a.vector3()?;
                let speed = a.float()?;
                let timeout = a.int()?;
                let _heading = a.float()?;
                let _distance = a.float()?;
                self.entity_mut(def, ped)?;
                self.tasks.push(TaskRecord {
                    ped,
                    native: def.name,
                    detail: format!("{target} speed={speed} timeout={timeout}"),
                });
            }
            "CLEAR_PED_TASKS" => {
                let ped = a.handle()?;
                self.entity_mut(def, ped)?;
                self.tasks.push(TaskRecord {
                    ped,
                    native: def.name,
                    detail: String::new(),
                });
            }
            "TASK_WARP_PED_INTO_VEHICLE" => {
                let ped = a.handle()?;
                let vehicle = a.handle()?;
                let seat = a.int()?;
                self.entity_mut(def, vehicle)?;
                let state = self.entity_mut(def, ped)?;
                state.vehicle = vehicle;
                state.last_vehicle = vehicle;
                self.tasks.push(TaskRecord {
                    ped,
                    native: def.name,
                    detail: format!("vehicle={vehicle} seat={seat}"),
                });
            }

            // -- event --------------------------------------------------------
            "TRIGGER_CLIENT_EVENT_INTERNAL" => {
                let name = a.str()?;
                let target = a.str()?;
                let payload = a.bytes()?;
                let args = msgpack::unpack(&payload)?;
                self.sent_client_events.push(SentClientEvent { name, target, args });
            }

            // -- state bag ----------------------------------------------------
            "SET_STATE_BAG_VALUE" => {
                let bag = a.str()?;
                let key = a.str()?;
                let payload = a.bytes()?;
                let replicated = a.bool()?;
                self.state_bags
                    .insert((bag.clone(), key.clone()), payload.clone());
                self.notifications.push_back(HostNotification::StateBagChanged {
                    bag,
                    key,
                    payload,
                    replicated,
                });
            }
            "GET_ENTITY_FROM_STATE_BAG_NAME" => {
                let bag = a.str()?;
                let entity = self.bag_target(&bag, "entity:");
                let found = if self.entities.contains_key(&entity.raw()) {
                    entity
                } else {
                    Handle::NONE
                };
                frame.push_result_int(found.raw())?;
            }
            "GET_PLAYER_FROM_STATE_BAG_NAME" => {
                let bag = a.str()?;
                let player = self.bag_target(&bag, "player:");
                let found = if self.players.contains_key(&player.raw()) {
                    player
                } else {
                    Handle::NONE
                };
                frame.push_result_int(found.raw())?;
            }

            // -- http ---------------------------------------------------------
            "PERFORM_HTTP_REQUEST_INTERNAL" => {
                let request = a.bytes()?;
                self.http_requests.push(request);
                let token = self.next_http_token;
                self.next_http_token += 1;
                frame.push_result_int(token)?;
            }

            _ => return Err(InvocationError::Unsupported { native: def.name }.into()),
        }
        Ok(())
    }

    fn poll_notification(&mut self) -> Option<HostNotification> {
        self.notifications.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::Invoker;
    use crate::natives::{convar, entity, kvp, ped, player, resource, state_bag, task, vehicle};

    fn invoker() -> Invoker<MemoryHost> {
        Invoker::new(MemoryHost::new("memory-test").with_convars([("sv_hostname", "dev"), ("sv_maxclients", "48")]))
    }

    #[test]
    fn test_kvp_round_trip() {
        let mut inv = invoker();
        kvp::set_resource_kvp_int(&mut inv, "visits", 7).unwrap();
        assert_eq!(kvp::get_resource_kvp_int(&mut inv, "visits").unwrap(), 7);
        assert_eq!(kvp::get_resource_kvp_int(&mut inv, "never").unwrap(), 0);

        kvp::set_resource_kvp(&mut inv, "motd", "hello").unwrap();
        assert_eq!(
            kvp::get_resource_kvp_string(&mut inv, "motd").unwrap().as_deref(),
            Some("hello")
        );
        kvp::delete_resource_kvp(&mut inv, "motd").unwrap();
        assert_eq!(kvp::get_resource_kvp_string(&mut inv, "motd").unwrap(), None);
    }

    #[test]
    fn test_convar_defaults_and_parsing() {
        let mut inv = invoker();
        assert_eq!(convar::get_convar(&mut inv, "sv_hostname", "x").unwrap(), "dev");
        assert_eq!(convar::get_convar(&mut inv, "missing", "fallback").unwrap(), "fallback");
        assert_eq!(convar::get_convar_int(&mut inv, "sv_maxclients", 32).unwrap(), 48);
        assert_eq!(convar::get_convar_int(&mut inv, "sv_hostname", 5).unwrap(), 5);
        assert!(convar::get_convar_bool(&mut inv, "missing", true).unwrap());

        convar::set_convar_replicated(&mut inv, "game_mode", "race").unwrap();
        let entry = inv.host().convar("game_mode").unwrap();
        assert!(entry.replicated);
        assert_eq!(
            inv.poll_notification(),
            Some(HostNotification::ConvarChanged {
                name: "game_mode".into()
            })
        );
    }

    #[test]
    fn test_resource_natives() {
        let mut inv = invoker();
        inv.host_mut().add_resource("chat", "stopped");
        assert_eq!(resource::get_current_resource_name(&mut inv).unwrap(), "memory-test");
        assert_eq!(resource::get_resource_state(&mut inv, "chat").unwrap(), "stopped");
        assert_eq!(resource::get_resource_state(&mut inv, "nope").unwrap(), "missing");
        assert_eq!(resource::get_num_resources(&mut inv).unwrap(), 2);
        assert_eq!(
            resource::get_resource_by_find_index(&mut inv, 1).unwrap().as_deref(),
            Some("chat")
        );
        assert_eq!(resource::get_resource_by_find_index(&mut inv, 9).unwrap(), None);
    }

    #[test]
    fn test_entities_and_wrappers() {
        let mut inv = invoker();
        let car = crate::handle::Vehicle::new(inv.host_mut().spawn_vehicle(Vector3::new(1.0, 2.0, 3.0)));
        entity::set_entity_coords(&mut inv, car, Vector3::new(4.0, 5.0, 6.0), false, false, false, true).unwrap();
        assert_eq!(entity::get_entity_coords(&mut inv, car).unwrap(), Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(entity::get_entity_health(&mut inv, car).unwrap(), 1000);

        vehicle::set_vehicle_number_plate_text(&mut inv, car, "LONGPLATE99").unwrap();
        assert_eq!(
            vehicle::get_vehicle_number_plate_text(&mut inv, car).unwrap().as_deref(),
            Some("LONGPLAT")
        );
        assert_eq!(vehicle::get_vehicle_lights_state(&mut inv, car).unwrap(), (true, false, false));

        entity::delete_entity(&mut inv, car).unwrap();
        assert!(!entity::does_entity_exist(&mut inv, car).unwrap());
        let err = entity::get_entity_heading(&mut inv, car).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Invocation(InvocationError::Engine {
                status: STATUS_NO_SUCH_ENTITY,
                ..
            })
        ));
    }

    #[test]
    fn test_players_and_peds() {
        let mut inv = invoker();
        let id = inv.host_mut().add_player("alice");
        let car = inv.host_mut().spawn_vehicle(Vector3::default());

        // player sources are decimal strings
        let source = player::get_player_from_index(&mut inv, 0).unwrap().unwrap();
        assert_eq!(source, id.to_string());
        let alice = player::get_player_ped(&mut inv, source.as_str()).unwrap();
        assert!(alice.is_valid());

        task::task_warp_ped_into_vehicle(&mut inv, alice, car, -1).unwrap();
        assert_eq!(ped::get_vehicle_ped_is_in(&mut inv, alice, false).unwrap(), car);

        ped::set_ped_armour(&mut inv, alice, 150).unwrap();
        assert_eq!(ped::get_ped_armour(&mut inv, alice).unwrap(), 100);

        player::set_player_routing_bucket(&mut inv, id, 3).unwrap();
        assert_eq!(entity::get_entity_routing_bucket(&mut inv, alice).unwrap(), 3);

        player::drop_player(&mut inv, id, "bye").unwrap();
        assert_eq!(player::get_num_player_indices(&mut inv).unwrap(), 0);
        assert_eq!(inv.host().dropped_players(), &[(id, "bye".to_string())]);
    }

    #[test]
    fn test_state_bag_write_queues_notification() {
        let mut inv = invoker();
        let car = inv.host_mut().spawn_vehicle(Vector3::default());
        let payload = msgpack::pack_one(&Value::Int(3));
        state_bag::set_state_bag_value(&mut inv, "entity:1", "fuel", &payload, true).unwrap();
        assert_eq!(inv.host().state_bag_value("entity:1", "fuel"), Some(Value::Int(3)));
        assert!(matches!(
            inv.poll_notification(),
            Some(HostNotification::StateBagChanged { replicated: true, .. })
        ));
        assert_eq!(state_bag::get_entity_from_state_bag_name(&mut inv, "entity:1").unwrap(), car);
        assert_eq!(
            state_bag::get_player_from_state_bag_name(&mut inv, "player:9").unwrap(),
            Handle::NONE
        );
    }

    #[test]
    fn test_unsupported_native() {
        let mut table = crate::invoker::NativeTable::new();
        let def = NativeDef {
            id: crate::invoker::NativeId(0x1234),
            name: "SOMETHING_ELSE",
            namespace: "misc",
            method: "something_else",
            args: &[],
            ret: crate::codec::Shape::Void,
        };
        table.insert(def);
        let mut inv = Invoker::new(MemoryHost::new("x")).with_table(table);
        let err = inv.invoke(def.id, &[], def.ret).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Invocation(InvocationError::Unsupported { native: "SOMETHING_ELSE" })
        ));
        assert_eq!(inv.host().calls(), 1);
    }
}
