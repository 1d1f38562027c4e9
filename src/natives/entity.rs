//! Any world entity: peds, vehicles and objects alike.

natives! {
    namespace "entity";

    0x3AC90869 => DOES_ENTITY_EXIST: fn does_entity_exist(entity: handle) -> bool;
    0x1647F1CB => GET_ENTITY_COORDS: fn get_entity_coords(entity: handle) -> vec3;
    0xDF70B41B => SET_ENTITY_COORDS: fn set_entity_coords(
        entity: handle,
        pos: vec3,
        x_axis: bool,
        y_axis: bool,
        z_axis: bool,
        clear_area: bool,
    );
    0x972CC383 => GET_ENTITY_HEADING: fn get_entity_heading(entity: handle) -> float;
    0xE0FF064D => SET_ENTITY_HEADING: fn set_entity_heading(entity: handle, heading: float);
    0x8E3222B7 => GET_ENTITY_HEALTH: fn get_entity_health(entity: handle) -> int;
    0xED4B0486 => GET_ENTITY_ROUTING_BUCKET: fn get_entity_routing_bucket(entity: handle) -> int;
    0x635E5289 => SET_ENTITY_ROUTING_BUCKET: fn set_entity_routing_bucket(entity: handle, bucket: int);
    0xDAFCB3EC => DELETE_ENTITY: fn delete_entity(entity: handle);
}
