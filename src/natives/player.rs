//! Connected players, addressed by server id.

natives! {
    namespace "player";

    0x63D13184 => GET_NUM_PLAYER_INDICES: fn get_num_player_indices() -> int;
    /// Server id of the `index`th player, as a decimal string.
    0xC8A9CE08 => GET_PLAYER_FROM_INDEX: fn get_player_from_index(index: int) -> opt_string;
    0x6E31E993 => GET_PLAYER_PED: fn get_player_ped(player: handle) -> handle;
    0x406B4B20 => GET_PLAYER_NAME: fn get_player_name(player: handle) -> opt_string;
    0x52441C34 => GET_PLAYER_ROUTING_BUCKET: fn get_player_routing_bucket(player: handle) -> int;
    0x6504EB38 => SET_PLAYER_ROUTING_BUCKET: fn set_player_routing_bucket(player: handle, bucket: int);
    0xBA0613E1 => DROP_PLAYER: fn drop_player(player: handle, reason: str);
}
