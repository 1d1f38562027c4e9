natives! {
    namespace "state_bag";

    /// `value` is a MessagePack-encoded single value.
    0x8D50E33A => SET_STATE_BAG_VALUE: fn set_state_bag_value(bag: str, key: str, value: bytes, replicated: bool);
    0x4BDF1867 => GET_ENTITY_FROM_STATE_BAG_NAME: fn get_entity_from_state_bag_name(bag: str) -> handle;
    0xA56135E0 => GET_PLAYER_FROM_STATE_BAG_NAME: fn get_player_from_state_bag_name(bag: str) -> handle;
}
