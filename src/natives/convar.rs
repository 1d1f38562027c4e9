natives! {
    namespace "convar";

    0x6CCD2564 => GET_CONVAR: fn get_convar(name: str, default: str) -> string;
    0x935C0AB2 => GET_CONVAR_INT: fn get_convar_int(name: str, default: int) -> int;
    0x009E666D => GET_CONVAR_FLOAT: fn get_convar_float(name: str, default: float) -> float;
    0x7E8EBFE5 => GET_CONVAR_BOOL: fn get_convar_bool(name: str, default: bool) -> bool;
    0x341B16D2 => SET_CONVAR: fn set_convar(name: str, value: str);
    /// Also sent to clients.
    0xF292858C => SET_CONVAR_REPLICATED: fn set_convar_replicated(name: str, value: str);
    /// Also published in the server info.
    0x9338D547 => SET_CONVAR_SERVER_INFO: fn set_convar_server_info(name: str, value: str);
}
