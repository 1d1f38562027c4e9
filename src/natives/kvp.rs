//! Resource key/value store.

natives! {
    namespace "kvp";

    0x06A2B1E8 => SET_RESOURCE_KVP_INT: fn set_resource_kvp_int(key: str, value: int);
    0x557B586A => GET_RESOURCE_KVP_INT: fn get_resource_kvp_int(key: str) -> int;
    0x9ADD2938 => SET_RESOURCE_KVP_FLOAT: fn set_resource_kvp_float(key: str, value: float);
    0x35BDCEEA => GET_RESOURCE_KVP_FLOAT: fn get_resource_kvp_float(key: str) -> float;
    0x21C7A35B => SET_RESOURCE_KVP: fn set_resource_kvp(key: str, value: str);
    /// `None` when the key was never written.
    0x5240DA5A => GET_RESOURCE_KVP_STRING: fn get_resource_kvp_string(key: str) -> opt_string;
    0x7389B5DF => DELETE_RESOURCE_KVP: fn delete_resource_kvp(key: str);
}
