natives! {
    namespace "resource";

    0xE5E9EBBB => GET_CURRENT_RESOURCE_NAME: fn get_current_resource_name() -> string;
    /// `missing`, `stopped`, `starting` or `started`.
    0x04152C90 => GET_RESOURCE_STATE: fn get_resource_state(name: str) -> string;
    0x0863F27B => GET_NUM_RESOURCES: fn get_num_resources() -> int;
    0x387246B7 => GET_RESOURCE_BY_FIND_INDEX: fn get_resource_by_find_index(index: int) -> opt_string;
}
